//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments)
pub const USAGE_ERROR: u8 = 2;

/// Authentication failed (wrong password or mismatched key file)
pub const AUTH_FAILED: u8 = 3;

/// Key file or encrypted file not found
pub const NOT_FOUND: u8 = 4;

/// Unsupported or malformed container
pub const INVALID_CONTAINER: u8 = 5;
