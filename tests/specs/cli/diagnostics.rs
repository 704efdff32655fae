//! `wings diagnostics` behavior.

use crate::prelude::*;

#[test]
fn diagnostics_reports_missing_config_without_crashing() {
    let missing = std::env::temp_dir().join("wings-diagnostics-missing-config.toml");
    let _ = std::fs::remove_file(&missing);

    cli()
        .args(&["--config", missing.to_str().expect("utf8 path"), "diagnostics"])
        .passes()
        .stdout_has("config: failed to load");
}

#[test]
fn diagnostics_redacts_token_from_a_real_config() {
    let config = TestConfig::minimal();

    cli()
        .args(&["--config", config.path().to_str().expect("utf8 path"), "diagnostics"])
        .passes()
        .stdout_has("token: <redacted>")
        .stdout_has("...ghij");
}
