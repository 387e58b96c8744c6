//! gitmirror core library — reference types, configuration, errors.
//!
//! - [`types`] — reference names, targets and refspecs
//! - [`config`] — environment resolution, validation, masked display
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod mask;
pub mod types;

pub use config::{resolve, validate, Config, Env, SshConf};
pub use error::ConfigError;
pub use mask::mask;
pub use types::{ObjectId, RefName, RefSpec, RefTarget, Reference};
