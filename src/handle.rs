use std::io::Cursor;
use std::path::Path;

use anyhow::{Context as _, Result};
use rabex::files::SerializedFile;
use rabex::files::serializedfile::ObjectRef;
use rabex::objects::pptr::PathId;
use rabex::objects::TypedPPtr;
use rabex::tpk::TpkTypeTreeBlob;
use rabex::typetree::TypeTreeProvider;
use rabex::typetree::typetree_cache::sync::TypeTreeCache;
use serde::Deserialize;

use crate::Environment;
use crate::game_files::GameFiles;
use crate::resolver::EnvResolver;
use crate::unity::types::{MonoBehaviour, MonoScript};

pub struct SerializedFileHandle<'a, R = GameFiles, P = TypeTreeCache<TpkTypeTreeBlob>> {
    pub file: &'a SerializedFile,
    pub data: &'a [u8],
    pub env: &'a Environment<R, P>,
}
pub struct ObjectRefHandle<'a, T, R = GameFiles, P = TypeTreeCache<TpkTypeTreeBlob>> {
    pub object: ObjectRef<'a, T>,
    pub file: SerializedFileHandle<'a, R, P>,
}

impl<'a, R, P> SerializedFileHandle<'a, R, P> {
    pub fn reborrow(&self) -> SerializedFileHandle<'a, R, P> {
        SerializedFileHandle {
            file: self.file,
            data: self.data,
            env: self.env,
        }
    }

    pub fn new(env: &'a Environment<R, P>, file: &'a SerializedFile, data: &'a [u8]) -> Self {
        SerializedFileHandle { file, data, env }
    }

    pub fn reader(&self) -> Cursor<&'a [u8]> {
        Cursor::new(self.data)
    }
}

impl<'a, R: EnvResolver, P: TypeTreeProvider> SerializedFileHandle<'a, R, P> {
    /// All objects of the file, in file order. `T` is the shape [`ObjectRefHandle::read`] decodes into.
    pub fn objects<T>(&self) -> impl ExactSizeIterator<Item = ObjectRefHandle<'a, T, R, P>> {
        self.file.objects().map(|o| {
            let tt = self.file.get_typetree_for(o, &self.env.tpk);
            ObjectRefHandle::new(ObjectRef::new(self.file, o, tt), self.reborrow())
        })
    }

    pub fn deref_optional<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<Option<ObjectRefHandle<'a, T, R, P>>> {
        match pptr.optional() {
            Some(pptr) => self.deref(pptr).map(Some),
            None => Ok(None),
        }
    }

    pub fn deref_read_optional<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<Option<T>> {
        self.deref_optional(pptr)?.map(|obj| obj.read()).transpose()
    }

    /// Resolves `pptr` against this file, loading the referenced external file if needed.
    pub fn deref<T: for<'de> Deserialize<'de>>(
        &self,
        pptr: TypedPPtr<T>,
    ) -> Result<ObjectRefHandle<'a, T, R, P>> {
        Ok(match pptr.m_FileID.get_external(self.file) {
            None => {
                let object = pptr.deref_local(self.file, &self.env.tpk)?;
                ObjectRefHandle::new(object, self.reborrow())
            }
            Some(external_path) => {
                let external = self
                    .env
                    .load_external_file(Path::new(&external_path))
                    .with_context(|| format!("failed to load external file '{}'", external_path))?;
                let object = pptr
                    .make_local()
                    .deref_local(external.file, &self.env.tpk)
                    .with_context(|| format!("In external {} {}", pptr.m_FileID, external_path))?;
                ObjectRefHandle::new(object, external)
            }
        })
    }
}

impl<'a, T, R: EnvResolver, P: TypeTreeProvider> ObjectRefHandle<'a, T, R, P> {
    pub fn new(object: ObjectRef<'a, T>, file: SerializedFileHandle<'a, R, P>) -> Self {
        ObjectRefHandle { object, file }
    }

    pub fn read(&self) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let data = self.object.read(&mut self.file.reader())?;
        Ok(data)
    }

    /// Views the same object as a different type, using the object's typetree.
    pub fn retype<U>(&self) -> ObjectRefHandle<'a, U, R, P> {
        let info = self.object.info;
        let tt = self.file.file.get_typetree_for(info, &self.file.env.tpk);
        ObjectRefHandle::new(ObjectRef::new(self.file.file, info, tt), self.file.reborrow())
    }

    /// Reads the `MonoBehaviour` header and follows its `m_Script` pointer.
    /// `Ok(None)` means the behaviour has no script attached.
    pub fn mono_script(&self) -> Result<Option<MonoScript>> {
        let behaviour = self
            .retype::<MonoBehaviour>()
            .read()
            .with_context(|| format!("Could not read MonoBehaviour {}", self.path_id()))?;
        self.file.deref_read_optional(behaviour.m_Script)
    }
}

impl<'a, T, R, P> ObjectRefHandle<'a, T, R, P> {
    pub fn path_id(&self) -> PathId {
        self.object.info.m_PathID
    }
}
