// src/exec/mod.rs

//! Unit execution layer.
//!
//! - [`generator`] defines the `Generator` trait, its request type and the
//!   progress sink handed to it.
//! - [`command`] provides `CommandGenerator`, which runs a shell command per
//!   unit using `tokio::process::Command`.
//! - [`task_runner`] runs one unit: child context in, artifact out, result
//!   stored.

pub mod command;
pub mod generator;
pub mod task_runner;

pub use command::CommandGenerator;
pub use generator::{GenerateRequest, Generator, ProgressSink, ProgressUpdate};
pub use task_runner::{TaskReport, TaskRunner};
