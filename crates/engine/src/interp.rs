use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::builder::build;
use crate::builtins;
use crate::error::{Exception, Unwind};
use crate::loader::{Library, Loader};
use crate::nameset::Nameset;
use crate::object::Obj;
use crate::process::ProcessState;
use crate::resolver::Resolver;
use crate::stream::{Encoding, FormReader, OutputStream, Streams};
use crate::thread::{ThreadHandle, ThreadSet};

/// Settings for a root interpreter.
pub struct InterpOptions {
    /// Arguments passed to the program
    pub argv: Vec<String>,
    /// Directories searched by `load`
    pub paths: Vec<PathBuf>,
    pub assert: bool,
    /// Seed for the random engine, `None` to seed from the system
    pub seed: Option<u64>,
    pub encoding: Encoding,
    /// Streams to use instead of the terminal
    pub streams: Option<Streams>,
    /// Libraries available to `library`
    pub libraries: Vec<Arc<dyn Library>>,
}

impl Default for InterpOptions {
    fn default() -> Self {
        InterpOptions {
            argv: vec![],
            paths: vec![],
            assert: false,
            seed: None,
            encoding: Encoding::default(),
            streams: None,
            libraries: vec![],
        }
    }
}

/// An evaluation context.
///
/// The root interpreter owns the global nameset and the process-wide services. Duplicates made
/// with [`Interp::dup`] and friends share all of them but have their own stream bindings and
/// posted result; they are what launched threads run on.
///
/// Dropping the root interpreter waits for every launched thread.
pub struct Interp {
    globals: Arc<Nameset>,
    argv: Arc<Vec<String>>,
    resolver: Arc<Resolver>,
    loader: Arc<Loader>,
    state: Arc<ProcessState>,
    threads: Arc<ThreadSet>,

    streams: Streams,
    /// Form bound to a duplicate by [`Interp::dup_with_form`]
    form: Option<Obj>,
    /// Result of the last top-level evaluation
    posted: Mutex<Obj>,
    is_root: bool,
}

impl Interp {
    pub fn new(options: InterpOptions) -> Interp {
        let state = ProcessState::new(options.seed, options.assert, options.encoding);
        Interp::with_state(options, Arc::new(state))
    }

    /// Create a root interpreter around existing process state.
    pub fn with_state(options: InterpOptions, state: Arc<ProcessState>) -> Interp {
        let streams = options
            .streams
            .unwrap_or_else(|| Streams::terminal(state.encoding()));
        let loader = Loader::new();
        for library in options.libraries {
            loader.register(library);
        }

        let globals = Nameset::new();
        builtins::install(&globals);

        tracing::debug!(argc = options.argv.len(), "created root interpreter");
        Interp {
            globals,
            argv: Arc::new(options.argv),
            resolver: Arc::new(Resolver::new(options.paths)),
            loader: Arc::new(loader),
            state,
            threads: Arc::new(ThreadSet::new()),
            streams,
            form: None,
            posted: Mutex::new(Obj::nil()),
            is_root: true,
        }
    }

    pub fn globals(&self) -> &Arc<Nameset> {
        &self.globals
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn threads(&self) -> &ThreadSet {
        &self.threads
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    pub fn output(&self) -> &Arc<dyn OutputStream> {
        &self.streams.output
    }

    pub fn error(&self) -> &Arc<dyn OutputStream> {
        &self.streams.error
    }

    pub fn set_streams(&mut self, streams: Streams) {
        self.streams = streams;
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// The form bound by [`Interp::dup_with_form`].
    pub fn form(&self) -> Option<&Obj> {
        self.form.as_ref()
    }

    /// The result of the last top-level evaluation.
    pub fn posted(&self) -> Obj {
        self.posted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn post(&self, value: Obj) {
        *self.posted.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// Write an exception to the error stream.
    pub fn report(&self, e: &Exception) {
        tracing::debug!(kind = e.kind().name(), abort = e.is_abort(), "reporting exception");
        if let Err(write_err) = self.error().errorln(&e.to_string()) {
            tracing::error!(error = %write_err, exception = %e, "cannot write to error stream");
        }
    }

    // ====== Evaluation ======

    /// Evaluate `form` against the global nameset.
    ///
    /// Exceptions are reported to the error stream. Only abort-flagged exceptions are returned
    /// as errors; any other failure yields nil. A top-level `return` yields its value.
    pub fn run(&self, form: &Obj) -> Result<Obj, Exception> {
        self.execute(form, &self.globals)
    }

    /// Evaluate the form bound to this interpreter, or nothing.
    pub fn run_form(&self) -> Result<Obj, Exception> {
        match &self.form {
            Some(form) => self.execute(form, &self.globals),
            None => Ok(Obj::nil()),
        }
    }

    fn execute(&self, form: &Obj, nset: &Nameset) -> Result<Obj, Exception> {
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| form.eval(self, nset)));
        let value = match res {
            Ok(Ok(value)) | Ok(Err(Unwind::Return(value))) => value,
            Ok(Err(Unwind::Error(e))) => {
                self.report(&e);
                if e.is_abort() {
                    return Err(e);
                }
                Obj::nil()
            }
            Err(_) => {
                tracing::error!("evaluation panicked");
                let _ = self.error().errorln("fatal: unknown error");
                Obj::nil()
            }
        };
        self.post(value.clone());
        Ok(value)
    }

    /// Parse and evaluate source text against the global nameset, as [`Interp::repl`] does.
    pub fn eval_str(&self, source: &str) -> Result<Obj, Exception> {
        let mut reader = FormReader::from_string(source, "<string>");
        self.loop_in(&self.globals, &mut reader)
    }

    /// Evaluate every form from `reader` against the global nameset.
    pub fn repl(&self, reader: &mut FormReader) -> Result<Obj, Exception> {
        self.loop_in(&self.globals, reader)
    }

    /// Evaluate every form from `reader` against `nset`.
    ///
    /// Failing forms are reported and skipped. An abort-flagged exception ends the loop and is
    /// returned. Returns the value of the last form.
    pub fn loop_in(&self, nset: &Nameset, reader: &mut FormReader) -> Result<Obj, Exception> {
        let mut last = Obj::nil();
        loop {
            let syntax = match reader.next_form() {
                Ok(Some(syntax)) => syntax,
                Ok(None) => return Ok(last),
                Err(e) => {
                    let e = e.or_file(reader.name());
                    self.report(&e);
                    if e.kind() == &crate::error::ExceptionKind::Io {
                        return Err(e);
                    }
                    continue;
                }
            };
            let form = match build(&syntax) {
                Ok(form) => form,
                Err(e) => {
                    self.report(&e.or_line(syntax.line));
                    continue;
                }
            };
            last = self.execute(&form, nset)?;
        }
    }

    /// Evaluate every form of the file `name` against the global nameset.
    ///
    /// The first failure stops the load and is returned, annotated with the file and line it
    /// was raised at.
    pub fn load(&self, name: &str) -> Result<(), Exception> {
        let (path, input) = self.resolver.resolve(name)?;
        tracing::debug!(file = %path, "loading");
        let mut reader = FormReader::new(input, path.as_str());

        while let Some(syntax) = reader.next_form().map_err(|e| e.or_file(path.as_str()))? {
            let line = syntax.line;
            let form = build(&syntax).map_err(|e| e.or_line(line).or_file(path.as_str()))?;
            match form.eval(self, &self.globals) {
                Ok(value) | Err(Unwind::Return(value)) => self.post(value),
                Err(Unwind::Error(e)) => return Err(e.or_line(line).or_file(path.as_str())),
            }
        }
        Ok(())
    }

    // ====== Duplication and threads ======

    /// A child interpreter sharing everything but its stream bindings and posted result.
    pub fn dup(&self) -> Interp {
        self.dup_with_streams(self.streams.clone())
    }

    /// A child interpreter bound to the process terminal.
    pub fn dup_with_terminal(&self) -> Interp {
        self.dup_with_streams(Streams::terminal(self.state.encoding()))
    }

    pub fn dup_with_streams(&self, streams: Streams) -> Interp {
        Interp {
            globals: self.globals.clone(),
            argv: self.argv.clone(),
            resolver: self.resolver.clone(),
            loader: self.loader.clone(),
            state: self.state.clone(),
            threads: self.threads.clone(),
            streams,
            form: None,
            posted: Mutex::new(Obj::nil()),
            is_root: false,
        }
    }

    /// A child interpreter bound to `form`, ready for [`Interp::run_form`].
    pub fn dup_with_form(&self, form: Obj) -> Interp {
        let mut interp = self.dup();
        interp.form = Some(form);
        interp
    }

    /// Evaluate `form` on a new thread.
    pub fn launch(&self, form: Obj) -> Result<ThreadHandle, Exception> {
        self.launch_with(ThreadHandle::new(None), form)
    }

    /// Evaluate `form` on a new thread, reporting through `handle`.
    pub fn launch_with(
        &self,
        handle: ThreadHandle,
        form: Obj,
    ) -> Result<ThreadHandle, Exception> {
        handle.start()?;
        let child = self.dup_with_form(form);
        let threads = self.threads.clone();
        let id = threads.enter();
        let task = handle.clone();

        let mut builder = std::thread::Builder::new();
        if let Some(name) = handle.name() {
            builder = builder.name(name.to_string());
        }
        let spawned = builder.spawn(move || {
            ThreadSet::set_current(id);
            let res = child.run_form();
            task.complete(res);
            drop(child);
            threads.leave(id);
        });

        match spawned {
            Ok(join) => {
                tracing::debug!(id, name = ?handle.name(), "launched thread");
                handle.set_join(join);
                Ok(handle)
            }
            Err(e) => {
                self.threads.leave(id);
                handle.cancel();
                Err(Exception::io(format!("cannot spawn thread: {}", e)))
            }
        }
    }

    /// Block until every launched thread except the calling one has finished.
    pub fn wait_all(&self) {
        self.threads.wait_all();
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        if !self.is_root {
            return;
        }
        self.threads.wait_all();
        let active = self.threads.active();
        if active != 0 {
            tracing::error!(active, "threads still running at interpreter shutdown");
            std::process::abort();
        }
        tracing::debug!("root interpreter shut down");
    }
}
