// SPDX-License-Identifier: MIT

//! `wings version` — print the CLI/daemon build version.

pub fn run() {
    println!("wings {}", env!("CARGO_PKG_VERSION"));
}
