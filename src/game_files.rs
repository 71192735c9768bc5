use std::ffi::OsStr;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;
use rabex::files::bundlefile::{BundleFileReader, ExtractionConfig};

use crate::env::Data;
use crate::resolver::EnvResolver;

pub struct GameFiles {
    pub game_dir: PathBuf,
    pub level_files: LevelFiles,
}

pub enum LevelFiles {
    Unpacked,
    Packed(Box<BundleFileReader<Cursor<Mmap>>>),
    /// `data.unity3d` exists but could not be opened. Every read fails with this message.
    Broken(String),
}

const BUNDLE_SIGNATURES: [&[u8]; 4] = [
    b"UnityFS\0",
    b"UnityWeb\0",
    b"UnityRaw\0",
    b"UnityArchive\0",
];

/// Whether `data` starts like a Unity asset bundle rather than a serialized file.
pub fn is_bundle(data: &[u8]) -> bool {
    BUNDLE_SIGNATURES
        .iter()
        .any(|signature| data.starts_with(signature))
}

/// Reads the first bytes of `path` and checks them with [`is_bundle`].
pub fn is_bundle_file(path: &Path) -> Result<bool> {
    let mut header = Vec::with_capacity(16);
    File::open(path)
        .with_context(|| format!("Could not open '{}'", path.display()))?
        .take(16)
        .read_to_end(&mut header)
        .with_context(|| format!("Could not read '{}'", path.display()))?;
    Ok(is_bundle(&header))
}

fn open_bundle(bundle_path: &Path) -> Result<BundleFileReader<Cursor<Mmap>>> {
    let file = File::open(bundle_path)
        .with_context(|| format!("Could not open '{}'", bundle_path.display()))?;
    let data = unsafe { Mmap::map(&file)? };
    BundleFileReader::from_reader(Cursor::new(data), &ExtractionConfig::default())
        .with_context(|| format!("Failed to read '{}'", bundle_path.display()))
}

/// Entry name inside a bundle. References between bundle files look like `archive:/CAB-x/CAB-x`.
fn bundle_entry_name(path: &Path) -> Option<&str> {
    let path = path.to_str()?;
    match path.strip_prefix("archive:/") {
        Some(archive_path) => archive_path.rsplit('/').next(),
        None => Some(path),
    }
}

fn find_unity_data_dir(install_dir: &Path) -> Result<Option<PathBuf>> {
    Ok(std::fs::read_dir(install_dir)?
        .filter_map(Result::ok)
        .find_map(|entry| is_unity_data_dir(&entry.path()).then(|| entry.path())))
}

fn is_unity_data_dir(dir: &Path) -> bool {
    dir.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.ends_with("_Data"))
        && dir.is_dir()
}

impl GameFiles {
    /// Opens the container directory of a game.
    ///
    /// `game_dir` may be the `gamename_Data` folder itself or the install folder containing it.
    /// Never fails: a directory that doesn't exist has no containers, and a `data.unity3d` that
    /// can't be opened makes every container read fail with its error.
    pub fn probe(game_dir: impl AsRef<Path>) -> GameFiles {
        let game_dir = GameFiles::probe_dir(game_dir.as_ref());

        let bundle_path = game_dir.join("data.unity3d");
        let level_files = if bundle_path.is_file() {
            match open_bundle(&bundle_path) {
                Ok(bundle) => LevelFiles::Packed(Box::new(bundle)),
                Err(e) => {
                    tracing::error!("{e:#}");
                    LevelFiles::Broken(format!("{e:#}"))
                }
            }
        } else {
            LevelFiles::Unpacked
        };

        GameFiles {
            game_dir,
            level_files,
        }
    }

    /// Reads loose files from `dir` without looking for a data folder or a packed `data.unity3d`.
    pub fn unpacked(dir: impl Into<PathBuf>) -> GameFiles {
        GameFiles {
            game_dir: dir.into(),
            level_files: LevelFiles::Unpacked,
        }
    }

    /// Reads the entries of the asset bundle at `bundle_path`. Builtin resources still
    /// resolve relative to `dir`.
    pub fn packed(dir: impl Into<PathBuf>, bundle_path: &Path) -> Result<GameFiles> {
        Ok(GameFiles {
            game_dir: dir.into(),
            level_files: LevelFiles::Packed(Box::new(open_bundle(bundle_path)?)),
        })
    }

    pub fn probe_dir(game_dir: &Path) -> PathBuf {
        if !game_dir.is_dir() || is_unity_data_dir(game_dir) {
            return game_dir.to_owned();
        }

        match find_unity_data_dir(game_dir) {
            Ok(data_dir) => data_dir.unwrap_or_else(|| game_dir.to_owned()),
            Err(e) => {
                tracing::warn!("Could not list '{}': {e}", game_dir.display());
                game_dir.to_owned()
            }
        }
    }

    /// Names of the serialized files inside a packed build, in bundle order.
    pub fn serialized_files(&self) -> Vec<String> {
        match &self.level_files {
            LevelFiles::Packed(bundle) => bundle
                .serialized_files()
                .map(|entry| entry.path.clone())
                .collect(),
            LevelFiles::Unpacked | LevelFiles::Broken(_) => Vec::new(),
        }
    }

    fn builtin_resource_path(&self, path: &Path) -> Option<PathBuf> {
        let suffix = path.strip_prefix("Library").ok()?;
        Some(self.game_dir.join("Resources").join(suffix))
    }
}

impl EnvResolver for GameFiles {
    fn base_dir(&self) -> &Path {
        &self.game_dir
    }

    fn read_path(&self, path: &Path) -> Result<Data, std::io::Error> {
        if let Some(resource_path) = self.builtin_resource_path(path) {
            match File::open(resource_path) {
                Ok(val) => {
                    let mmap = unsafe { memmap2::Mmap::map(&val)? };
                    return Ok(Data::Mmap(mmap));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        match &self.level_files {
            LevelFiles::Unpacked => {
                let file = File::open(self.game_dir.join(path))?;
                let mmap = unsafe { memmap2::Mmap::map(&file)? };
                Ok(Data::Mmap(mmap))
            }
            LevelFiles::Packed(bundle) => {
                let path = bundle_entry_name(path)
                    .ok_or_else(|| std::io::Error::other("non-utf8 string"))?;
                let data = bundle.read_at(path)?.ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("File '{path}' does not exist in bundle"),
                    )
                })?;

                Ok(Data::InMemory(data))
            }
            LevelFiles::Broken(message) => Err(std::io::Error::other(message.clone())),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        if self
            .builtin_resource_path(path)
            .is_some_and(|resource_path| resource_path.is_file())
        {
            return true;
        }

        match &self.level_files {
            LevelFiles::Unpacked => self.game_dir.join(path).is_file(),
            LevelFiles::Packed(bundle) => bundle_entry_name(path)
                .is_some_and(|name| bundle.files().iter().any(|file| file.path == name)),
            // present, but every read reports why the bundle is unusable
            LevelFiles::Broken(_) => true,
        }
    }
}
