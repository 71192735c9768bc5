#![allow(non_snake_case)]

use rabex::objects::pptr::{PPtr, TypedPPtr};
use rabex::objects::{ClassId, ClassIdType};
use serde_derive::Deserialize;

/// The fields every `MonoBehaviour` starts with, regardless of its script.
#[derive(Debug, Deserialize)]
pub struct MonoBehaviour {
    pub m_GameObject: PPtr,
    pub m_Enabled: u8,
    pub m_Script: TypedPPtr<MonoScript>,
    pub m_Name: String,
}
impl ClassIdType for MonoBehaviour {
    const CLASS_ID: ClassId = ClassId::MonoBehaviour;
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct MonoScript {
    pub m_Name: String,
    pub m_ExecutionOrder: i32,
    pub m_PropertiesHash: [u8; 16],
    pub m_ClassName: String,
    pub m_Namespace: String,
    pub m_AssemblyName: String,
}
