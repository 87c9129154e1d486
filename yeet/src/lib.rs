//! Layered stack configuration and CloudFormation deployment.
//!
//! A stack is described by YAML files that merge under fixed precedence
//! rules, pull in further fragments through `_include`, template themselves
//! and propagate `_defaults`. The resolved tree renders into a CloudFormation
//! document which is submitted and polled to a terminal state.
//!
//! - **[`core`]**: pure logic (merge, defaults, fixed-point iteration, status
//!   classification, tags). No I/O.
//! - **[`io`]**: side effects (AWS CLI, files, clock), behind traits so tests
//!   can script them.
//!
//! Orchestration modules ([`resolve`], [`render`], [`deploy`], [`output`])
//! combine the two to implement the CLI commands.

pub mod context;
pub mod core;
pub mod deploy;
pub mod error;
pub mod exit_codes;
pub mod include;
pub mod io;
pub mod logging;
pub mod output;
pub mod render;
pub mod report;
pub mod resolve;
pub mod template;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
