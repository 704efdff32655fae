// SPDX-License-Identifier: MIT

//! `wings configure` — fetch a node's configuration from the Panel and write
//! it out as `wings.toml`, the way a node is first provisioned (SPEC_FULL.md
//! §5.11). Grounded on `wings-panel`'s own bearer-token HTTP client shape for
//! the outbound call, since the teacher's copied `cli` crate carries no
//! provisioning command of its own to imitate directly.

use std::path::Path;

use anyhow::{bail, Context};

pub struct ConfigureArgs<'a> {
    pub panel_url: &'a str,
    pub token: &'a str,
    pub node: &'a str,
    pub output: &'a Path,
}

pub async fn run(args: ConfigureArgs<'_>) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;

    let url = configuration_url(args.panel_url, args.node);

    let response = client
        .get(&url)
        .bearer_auth(args.token)
        .send()
        .await
        .with_context(|| format!("failed to reach panel at {url}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("panel returned {status} fetching node configuration: {body}");
    }

    let config: toml::Value = response
        .json()
        .await
        .context("panel response was not a valid configuration document")?;
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(args.output, rendered)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("wrote configuration to {}", args.output.display());
    Ok(())
}

fn configuration_url(panel_url: &str, node: &str) -> String {
    format!("{}/api/remote/nodes/{node}/configuration", panel_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_url_strips_trailing_slash() {
        assert_eq!(
            configuration_url("https://panel.example/", "7"),
            "https://panel.example/api/remote/nodes/7/configuration"
        );
    }

    #[test]
    fn configuration_url_without_trailing_slash() {
        assert_eq!(
            configuration_url("https://panel.example", "7"),
            "https://panel.example/api/remote/nodes/7/configuration"
        );
    }
}
