pub mod action;
pub mod anchor;
pub mod config;
pub mod environment;
pub mod error;
pub mod io;
pub mod mutation;
pub mod sequencer;
pub mod settings;
pub mod step;
pub mod template;

pub use error::{BaselineError, ErrorKind, Result};
