use std::any::Any;
use std::cell::Cell;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use quill_util::Quark;
use smol_str::SmolStr;

use crate::args::expect_argc;
use crate::error::{EvalResult, Exception};
use crate::interp::Interp;
use crate::literal::{Boolean, Str};
use crate::nameset::Nameset;
use crate::object::{apply_object, object_isquark, Obj, Object};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

quark_zone! {
    static THREAD_ZONE {
        WAIT = "wait",
        END_P = "end-p",
        GET_RESULT = "get-result",
        GET_NAME = "get-name",
    }
}

#[derive(Debug, Default)]
enum TaskState {
    #[default]
    Idle,
    Running,
    Done(Result<Obj, Exception>),
}

#[derive(Debug, Default)]
struct Task {
    state: Mutex<TaskState>,
    done: Condvar,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// The result side of a launched form.
///
/// A handle starts idle, becomes running when launched and holds the outcome of the form once
/// its thread finishes. Clones share the same task.
#[derive(Debug, Clone, Default)]
pub struct ThreadHandle {
    name: Option<SmolStr>,
    task: Arc<Task>,
}

impl ThreadHandle {
    pub fn new(name: Option<SmolStr>) -> ThreadHandle {
        ThreadHandle {
            name,
            task: Arc::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Mark the handle as running. Fails if it was launched before.
    pub(crate) fn start(&self) -> Result<(), Exception> {
        let mut state = lock(&self.task.state);
        match *state {
            TaskState::Idle => {
                *state = TaskState::Running;
                Ok(())
            }
            _ => Err(Exception::argument("launch", "thread was already launched")),
        }
    }

    /// Return a handle to idle after its thread failed to start.
    pub(crate) fn cancel(&self) {
        *lock(&self.task.state) = TaskState::Idle;
    }

    pub(crate) fn set_join(&self, join: JoinHandle<()>) {
        *lock(&self.task.join) = Some(join);
    }

    pub(crate) fn complete(&self, result: Result<Obj, Exception>) {
        *lock(&self.task.state) = TaskState::Done(result);
        self.task.done.notify_all();
    }

    /// Returns `true` once the launched form has finished.
    pub fn is_done(&self) -> bool {
        matches!(*lock(&self.task.state), TaskState::Done(_))
    }

    /// Block until the form finishes and return its outcome.
    ///
    /// Waiting on a handle that was never launched returns nil at once.
    pub fn wait(&self) -> Result<Obj, Exception> {
        let mut state = lock(&self.task.state);
        let res = loop {
            match &*state {
                TaskState::Idle => return Ok(Obj::nil()),
                TaskState::Done(res) => break res.clone(),
                TaskState::Running => {
                    state = self
                        .task
                        .done
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        };
        drop(state);

        if let Some(join) = lock(&self.task.join).take() {
            if join.join().is_err() {
                tracing::warn!(thread = ?self.name, "launched thread panicked after finishing");
            }
        }
        res
    }

    /// The outcome if finished, nil otherwise.
    pub fn result(&self) -> Result<Obj, Exception> {
        match &*lock(&self.task.state) {
            TaskState::Done(res) => res.clone(),
            _ => Ok(Obj::nil()),
        }
    }
}

impl Object for ThreadHandle {
    fn repr(&self) -> &'static str {
        "Thread"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn isquark(&self, quark: Quark, hflg: bool) -> bool {
        THREAD_ZONE.contains(quark) || (hflg && object_isquark(quark))
    }

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if quark == WAIT {
            expect_argc(quark, argv, 0)?;
            Ok(self.wait()?)
        } else if quark == END_P {
            expect_argc(quark, argv, 0)?;
            Ok(Boolean::obj(self.is_done()))
        } else if quark == GET_RESULT {
            expect_argc(quark, argv, 0)?;
            Ok(self.result()?)
        } else if quark == GET_NAME {
            expect_argc(quark, argv, 0)?;
            Ok(self.name.clone().map_or_else(Obj::nil, Str::obj))
        } else {
            apply_object(self, quark, argv)
        }
    }
}

thread_local! {
    /// Id of the launched thread running on this OS thread, if any.
    static CURRENT: Cell<Option<u64>> = Cell::new(None);
}

#[derive(Debug, Default)]
struct Registry {
    next: u64,
    live: Vec<u64>,
    /// Launched threads blocked in `wait_all`
    waiting: Vec<u64>,
}

/// Bookkeeping of launched threads, shared by every interpreter of a family.
#[derive(Debug, Default)]
pub struct ThreadSet {
    registry: Mutex<Registry>,
    changed: Condvar,
}

impl ThreadSet {
    pub fn new() -> ThreadSet {
        ThreadSet::default()
    }

    /// Register a thread about to start and return its id.
    pub(crate) fn enter(&self) -> u64 {
        let mut registry = lock(&self.registry);
        let id = registry.next;
        registry.next += 1;
        registry.live.push(id);
        id
    }

    pub(crate) fn leave(&self, id: u64) {
        lock(&self.registry).live.retain(|&t| t != id);
        self.changed.notify_all();
    }

    /// Mark the calling OS thread as the launched thread `id`.
    pub(crate) fn set_current(id: u64) {
        CURRENT.with(|c| c.set(Some(id)));
    }

    /// Number of launched threads still running.
    pub fn active(&self) -> usize {
        lock(&self.registry).live.len()
    }

    /// Block until every launched thread other than the caller has finished.
    ///
    /// A launched thread does not wait for threads that are themselves in `wait_all`, so
    /// launched threads calling it at the same time do not wait on each other.
    pub fn wait_all(&self) {
        let me = CURRENT.with(Cell::get);
        let mut registry = lock(&self.registry);
        if let Some(id) = me {
            registry.waiting.push(id);
            self.changed.notify_all();
        }
        loop {
            let blocked = registry.live.iter().any(|t| match me {
                Some(id) => *t != id && !registry.waiting.contains(t),
                None => true,
            });
            if !blocked {
                break;
            }
            registry = self
                .changed
                .wait(registry)
                .unwrap_or_else(|e| e.into_inner());
        }
        if let Some(id) = me {
            registry.waiting.retain(|&t| t != id);
        }
    }
}
