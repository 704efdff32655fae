//! `wings configure` behavior against an unreachable Panel.

use crate::prelude::*;

#[test]
fn configure_fails_cleanly_when_panel_is_unreachable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("wings.toml");

    cli()
        .args(&[
            "--config",
            output.to_str().expect("utf8 path"),
            "configure",
            "--panel-url",
            "http://127.0.0.1:1",
            "--token",
            "nodetoken",
            "--node",
            "1",
        ])
        .fails()
        .stderr_has("failed to reach panel");

    assert!(!output.exists(), "configure must not write a partial config on failure");
}
