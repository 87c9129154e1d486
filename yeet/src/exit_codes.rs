//! Stable exit codes for yeet CLI commands.

/// Command succeeded, or the stack reached a successful terminal state.
pub const OK: i32 = 0;
/// Resolution, submission or polling failed, or the stack ended in failure
/// or timed out.
pub const FAILURE: i32 = 1;
/// Help was requested or the command line could not be parsed.
pub const USAGE: i32 = 64;
