use std::sync::{Arc, RwLock};

use fnv::FnvHashMap;
use smol_str::SmolStr;

use crate::error::Exception;
use crate::interp::Interp;
use crate::object::Obj;

/// A native extension, registered with the [`Loader`] and initialized on first request.
pub trait Library: Send + Sync {
    fn name(&self) -> &str;

    /// Install the library into `interp`. Called at most once per loader.
    fn init(&self, interp: &Interp) -> Result<Obj, Exception>;
}

/// Registry of known and loaded libraries.
#[derive(Default)]
pub struct Loader {
    registered: RwLock<FnvHashMap<SmolStr, Arc<dyn Library>>>,
    loaded: RwLock<FnvHashMap<SmolStr, Arc<dyn Library>>>,
}

impl Loader {
    pub fn new() -> Loader {
        Loader::default()
    }

    /// Make `library` available to [`Loader::load`].
    pub fn register(&self, library: Arc<dyn Library>) {
        let name = SmolStr::new(library.name());
        self.registered
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, library);
    }

    /// Returns `true` if `name` is loaded.
    pub fn exists(&self, name: &str) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Record `library` as loaded under `name`. Returns `false` if the name was taken.
    pub fn add(&self, name: &str, library: Arc<dyn Library>) -> bool {
        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        if loaded.contains_key(name) {
            return false;
        }
        loaded.insert(name.into(), library);
        true
    }

    /// The loaded library `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Library>, Exception> {
        self.loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Exception::io(format!("library `{}` is not loaded", name)))
    }

    /// Load and initialize the registered library `name`. Loading it again does nothing.
    pub fn load(&self, interp: &Interp, name: &str) -> Result<Obj, Exception> {
        if self.exists(name) {
            return Ok(Obj::nil());
        }
        let library = self
            .registered
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| Exception::io(format!("cannot find library `{}`", name)))?;
        if !self.add(name, library.clone()) {
            return Ok(Obj::nil());
        }
        tracing::debug!(library = name, "initializing library");
        library.init(interp)
    }
}
