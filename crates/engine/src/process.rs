use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::stream::Encoding;

/// State shared by every interpreter of one process: the assertion switch, the random engine
/// and the default stream encoding.
///
/// Interpreters get it injected at construction, so tests build a fresh one each.
#[derive(Debug)]
pub struct ProcessState {
    assert: AtomicBool,
    rng: Mutex<StdRng>,
    encoding: Encoding,
}

impl ProcessState {
    /// `seed` makes the random engine reproducible; without it the engine is seeded from the
    /// operating system.
    pub fn new(seed: Option<u64>, assert: bool, encoding: Encoding) -> ProcessState {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ProcessState {
            assert: AtomicBool::new(assert),
            rng: Mutex::new(rng),
            encoding,
        }
    }

    pub fn assert_enabled(&self) -> bool {
        self.assert.load(Ordering::SeqCst)
    }

    pub fn set_assert(&self, enabled: bool) {
        self.assert.store(enabled, Ordering::SeqCst)
    }

    /// Run `f` with exclusive access to the random engine.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        ProcessState::new(None, false, Encoding::default())
    }
}
