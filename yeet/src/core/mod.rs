//! Deterministic, pure logic shared by the resolver and the deploy loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! configuration trees and status strings and are fully testable in isolation.

pub mod defaults;
pub mod fixed_point;
pub mod merge;
pub mod status;
pub mod tags;
pub mod value;
