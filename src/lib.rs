//! bellows - a small, embeddable concatenative stack language.
//!
//! Programs are streams of whitespace-separated words over a shared
//! parameter stack. Every input word is compiled into threaded code; an
//! implicit EXECUTE at end of input runs whatever was compiled. Immediate
//! words run during compilation instead, which is how control flow,
//! definitions and the parsing words work.

pub mod context;
pub mod cursor;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod host;
pub mod value;
pub mod words;

pub use context::{Completion, Context, Frame};
pub use engine::{query, run, run_entry, Engine};
pub use error::EngineError;
pub use host::{BasicHost, HostBridge};
pub use value::Value;
