#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Completion detection with dual-strategy progress estimation
//!
//! This library reports meaningful progress for, and reliably detects completion
//! of, operations whose real completion signal is not observable by the caller.
//! Completion is inferred from a count that some other, independent subsystem
//! maintains in a container the caller can only read.
//!
//! # Module Organization
//!
//! - [`progress`]: The monotonic progress value and the sinks that display it
//! - [`estimator`]: A time-based, never-authoritative progress projection
//! - [`watch`]: The polling state machine that decides when the operation is done
//! - `commands`: The `settle` command-line interface built on top of the above

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

mod commands;
pub mod estimator;
pub mod progress;
pub mod watch;

pub use crate::commands::{Host, run};
