//! I/O adapters: subprocesses, AWS services, files and time.

pub mod aws;
pub mod clock;
pub mod cloudformation;
pub mod ecs;
pub mod process;
pub mod secrets;
pub mod settings;
pub mod sources;
