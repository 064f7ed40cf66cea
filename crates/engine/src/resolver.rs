use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::Exception;
use crate::stream::{Input, InputStream};

/// File extension tried when a name does not resolve as given.
pub const SOURCE_EXTENSION: &str = "qll";

/// Maps file names to readable sources through a list of search paths.
#[derive(Debug, Default)]
pub struct Resolver {
    paths: RwLock<Vec<PathBuf>>,
}

impl Resolver {
    pub fn new(paths: Vec<PathBuf>) -> Resolver {
        Resolver {
            paths: RwLock::new(paths),
        }
    }

    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.paths
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.into());
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn candidates(name: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let with_ext = match name.extension() {
            Some(_) => None,
            None => Some(name.with_extension(SOURCE_EXTENSION)),
        };
        std::iter::once(name.to_path_buf()).chain(with_ext)
    }

    /// Find the file `name` refers to: as given first, then under each search path.
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        let name = Path::new(name);
        if let Some(found) = Resolver::candidates(name).find(|p| p.is_file()) {
            return Some(found);
        }
        if name.is_absolute() {
            return None;
        }
        self.paths().iter().find_map(|dir| {
            Resolver::candidates(name)
                .map(|p| dir.join(p))
                .find(|p| p.is_file())
        })
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// The full path `name` resolves to.
    pub fn canonical_name(&self, name: &str) -> Option<String> {
        let path = self.lookup(name)?;
        let path = path.canonicalize().unwrap_or(path);
        Some(path.display().to_string())
    }

    /// Open `name` for reading. Returns its canonical name along with the stream.
    pub fn resolve(&self, name: &str) -> Result<(String, Arc<dyn InputStream>), Exception> {
        let path = self
            .lookup(name)
            .ok_or_else(|| Exception::io(format!("cannot resolve file `{}`", name)))?;
        let file = File::open(&path)
            .map_err(|e| Exception::io(format!("cannot open `{}`: {}", path.display(), e)))?;
        let canonical = path.canonicalize().unwrap_or(path);
        tracing::debug!(name, path = %canonical.display(), "resolved source file");
        Ok((
            canonical.display().to_string(),
            Arc::new(Input::new(BufReader::new(file))),
        ))
    }
}
