//! The seam between the scanners and the asset library.
//!
//! [`harvest`](crate::harvest::harvest) and [`explore`](crate::explore::explore) only
//! ever see containers and objects through these traits. [`Environment`] implements them
//! on top of `rabex`, tests use an in-memory source.

use std::path::Path;

use anyhow::Result;
use rabex::objects::ClassId;
use rabex::typetree::TypeTreeProvider;

use crate::Environment;
use crate::handle::ObjectRefHandle;
use crate::resolver::EnvResolver;
use crate::tree::PropertyTree;

/// A single object inside a container.
pub trait AssetObject {
    fn class_id(&self) -> ClassId;

    /// Name of the script attached to the object, or `None` if it has none.
    fn script_name(&self) -> Result<Option<String>>;

    /// Decodes the full object into a dynamically typed tree.
    fn property_tree(&self) -> Result<PropertyTree>;
}

/// A collection of named containers.
pub trait AssetSource {
    fn contains(&self, container: &str) -> bool;

    /// Loads `container` and calls `f` for every object in it, in file order.
    ///
    /// Errors only if the container itself can't be loaded.
    fn visit_objects(&self, container: &str, f: &mut dyn FnMut(&dyn AssetObject)) -> Result<()>;
}

impl<R: EnvResolver, P: TypeTreeProvider> AssetSource for Environment<R, P> {
    fn contains(&self, container: &str) -> bool {
        self.game_files.contains(Path::new(container))
    }

    fn visit_objects(&self, container: &str, f: &mut dyn FnMut(&dyn AssetObject)) -> Result<()> {
        let file = self.load_cached(container)?;
        for object in file.objects::<PropertyTree>() {
            f(&object);
        }
        Ok(())
    }
}

impl<R: EnvResolver, P: TypeTreeProvider> AssetObject for ObjectRefHandle<'_, PropertyTree, R, P> {
    fn class_id(&self) -> ClassId {
        self.object.info.m_ClassID
    }

    fn script_name(&self) -> Result<Option<String>> {
        Ok(self.mono_script()?.map(|script| script.m_Name))
    }

    fn property_tree(&self) -> Result<PropertyTree> {
        self.read()
    }
}
