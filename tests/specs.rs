//! Behavioral specifications for the `wings` CLI.
//!
//! Black-box: these invoke the built binary and assert on stdout, stderr,
//! and exit codes. Deeper per-component behavior (reconciliation, SFTP
//! permission checks, activity dedup, cron retries) is covered by each
//! crate's own unit tests closer to the code.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod prelude;

mod cli;
