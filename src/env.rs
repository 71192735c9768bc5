use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use elsa::sync::FrozenMap;
use rabex::files::SerializedFile;
use rabex::tpk::TpkTypeTreeBlob;
use rabex::typetree::TypeTreeProvider;
use rabex::typetree::typetree_cache::sync::TypeTreeCache;

use crate::game_files::GameFiles;
use crate::handle::SerializedFileHandle;
use crate::resolver::EnvResolver;

pub enum Data {
    InMemory(Vec<u8>),
    Mmap(memmap2::Mmap),
}
impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        match self {
            Data::InMemory(data) => data.as_slice(),
            Data::Mmap(mmap) => mmap.as_ref(),
        }
    }
}

/// Loads serialized files through a resolver and keeps them alive for the
/// lifetime of the environment, so external references between containers
/// resolve against already parsed files.
pub struct Environment<R = GameFiles, P = TypeTreeCache<TpkTypeTreeBlob>> {
    pub game_files: R,
    pub tpk: P,
    serialized_files: FrozenMap<PathBuf, Box<(SerializedFile, Data)>>,
}

impl<R, P> Environment<R, P> {
    pub fn new(resolver: R, tpk: P) -> Self {
        Environment {
            game_files: resolver,
            tpk,
            serialized_files: Default::default(),
        }
    }
}

impl<R> Environment<R> {
    /// Uses the class database embedded in `rabex` for objects without a serialized typetree.
    pub fn with_embedded_tpk(resolver: R) -> Self {
        Environment::new(resolver, TypeTreeCache::new(TpkTypeTreeBlob::embedded()))
    }
}

impl<R: EnvResolver, P: TypeTreeProvider> Environment<R, P> {
    pub fn load_cached(
        &self,
        relative_path: impl AsRef<Path>,
    ) -> Result<SerializedFileHandle<'_, R, P>> {
        self.load_external_file(relative_path.as_ref())
    }

    pub(crate) fn load_external_file(
        &self,
        path_name: &Path,
    ) -> Result<SerializedFileHandle<'_, R, P>> {
        Ok(match self.serialized_files.get(path_name) {
            Some((file, data)) => SerializedFileHandle::new(self, file, data.as_ref()),
            None => {
                let data = self
                    .game_files
                    .read_path(path_name)
                    .with_context(|| format!("Cannot read file {}", path_name.display()))?;
                let serialized = SerializedFile::from_reader(&mut Cursor::new(data.as_ref()))
                    .with_context(|| {
                        format!("'{}' is not a serialized file", path_name.display())
                    })?;
                let file = self
                    .serialized_files
                    .insert(path_name.to_owned(), Box::new((serialized, data)));
                SerializedFileHandle::new(self, &file.0, file.1.as_ref())
            }
        })
    }
}
