use std::path::Path;

use crate::env::Data;

/// A trait abstracting where the asset containers are read from.
pub trait EnvResolver {
    fn base_dir(&self) -> &Path;

    fn read_path(&self, path: &Path) -> Result<Data, std::io::Error>;

    /// Whether `path` can be read at all. Used to tell a missing container
    /// apart from one that fails to parse.
    fn contains(&self, path: &Path) -> bool;
}

impl<T: EnvResolver> EnvResolver for &T {
    fn base_dir(&self) -> &Path {
        (**self).base_dir()
    }

    fn read_path(&self, path: &Path) -> Result<Data, std::io::Error> {
        (**self).read_path(path)
    }

    fn contains(&self, path: &Path) -> bool {
        (**self).contains(path)
    }
}
