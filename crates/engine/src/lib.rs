//! The evaluation engine: objects, namesets and the interpreter driving them.
//!
//! Source text is read by `quill-syn`, turned into objects by [`builder::build`] and evaluated
//! by an [`Interp`] against its global [`Nameset`]. Every value is an [`Object`] behind an
//! [`Obj`] handle; operations on values are dispatched by quark through [`Object::apply`].

#[macro_use]
pub mod zone;
#[macro_use]
pub mod literal;

pub mod args;
pub mod builder;
pub mod builtins;
pub mod constant;
pub mod counter;
pub mod error;
pub mod form;
pub mod function;
pub mod ident;
pub mod interp;
pub mod loader;
pub mod nameset;
pub mod object;
pub mod process;
pub mod resolver;
pub mod set;
pub mod stream;
pub mod symbol;
pub mod thread;

#[cfg(test)]
mod test;

pub use error::{EvalResult, Exception, ExceptionKind, Unwind};
pub use interp::{Interp, InterpOptions};
pub use loader::Library;
pub use nameset::Nameset;
pub use object::{Obj, Object};
pub use stream::{Encoding, FormReader, OutputBuffer, Streams};
