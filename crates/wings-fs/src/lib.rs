// SPDX-License-Identifier: MIT

//! wings-fs: the jailed per-server filesystem view (C4).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod filesystem;
mod path;
mod quota;

pub use error::FsError;
pub use filesystem::{DirEntryInfo, FileStat, ServerFilesystem, WriteKind};
pub use path::safe_path;
pub use quota::Quota;
