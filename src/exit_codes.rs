//! Exit code constants for the tulp CLI.
//!
//! - 0: Success
//! - 1: Backend-reported error, transport failure, or execution failure after retries
//! - 2: Malformed or non-terminating reply, or token limit exceeded
//! - 3: Setup error (configuration, unknown model, missing credentials)
//! - 130: Interrupted by the user

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// The backend declared an error, the transport failed, or generated code kept failing.
pub const BACKEND_ERROR: i32 = 1;

/// Reply structure was missing or the reply was cut short by a token limit.
pub const PROTOCOL_ERROR: i32 = 2;

/// Configuration or client setup failed before any chunk was processed.
pub const SETUP_ERROR: i32 = 3;

/// Run aborted by Ctrl-C.
pub const INTERRUPTED: i32 = 130;
