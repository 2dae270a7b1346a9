//! Logger setup for hosts embedding the runtime.
//!
//! The runtime itself only talks to the `log` facade; `env_logger` is wired
//! up here for binaries that want a ready-made backend.

mod init;

pub use init::{LoggingConfig, init_logging};
