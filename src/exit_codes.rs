//! Exit code policy for vaultfix.
//!
//! ## Run results (0-1)
//!
//! - `0` = Clean (every issue fixed, nothing left for manual review)
//! - `1` = Issues remain (manual review needed, or some fixes failed)
//!
//! ## Operational Failures (10+)
//!
//! Operational failures (unreadable audit report, invalid config, missing schema)
//! use codes >= 10 to distinguish from results:
//! - `10` = General operational failure
//! - `12` = Configuration error
//!
//! `130` means the user quit an interactive run.

/// Exit code: nothing left to do
pub const CLEAN: i32 = 0;

/// Exit code: issues remain or fixes failed
pub const ISSUES_REMAIN: i32 = 1;

/// Exit code: general operational failure
pub const OPERATIONAL_FAILURE: i32 = 10;

/// Exit code: configuration error
pub const CONFIG_ERROR: i32 = 12;

/// Exit code: interactive run stopped early
pub const INTERRUPTED: i32 = 130;
