// SPDX-License-Identifier: MIT

//! wings-ssh: the SFTP front-end (C7) — one SSH listener, password auth
//! against the Panel, per-session jailed SFTP handler.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod hostkey;
mod ops;
mod server;
mod sftp;
mod username;

pub use error::SshError;
pub use hostkey::load_or_generate;
pub use ops::SftpSession;
pub use server::SshListener;
