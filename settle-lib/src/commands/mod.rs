//! Command-line interface for settle
//!
//! # Commands
//!
//! - **dir**: Wait for a number of new entries to show up in a directory that some
//!   other process fills, optionally treating a spool file as the pending input
//! - **simulate**: Run the detector against an in-process writer, to try out
//!   tunables and see each termination path
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file
//!
//! The watching commands share the setup in `common`: logging, configuration,
//! the progress display (a terminal bar, or log lines when logging is enabled),
//! and the summary line printed once a watch ends.

mod common;
mod config;
mod dir;
mod host;
mod init;
mod run;
mod simulate;
mod validate;

pub use dir::{DirArgs, process_dir};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
pub use simulate::{SimulateArgs, simulate};
pub use validate::{ValidateArgs, validate_config};
