//! CLI help and version output.

use crate::prelude::*;

#[test]
fn wings_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn wings_version_subcommand_shows_version() {
    cli().args(&["version"]).passes().stdout_has("wings");
}

#[test]
fn wings_version_flag_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("wings");
}

#[test]
fn wings_configure_help_shows_required_flags() {
    cli()
        .args(&["configure", "--help"])
        .passes()
        .stdout_has("--panel-url")
        .stdout_has("--token")
        .stdout_has("--node");
}
