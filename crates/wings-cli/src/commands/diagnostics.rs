// SPDX-License-Identifier: MIT

//! `wings diagnostics` — a redacted report for bug reports: versions, config
//! with secrets stripped, container runtime info, and a tail of the daemon
//! log. Grounded on the same "never print the raw config" posture
//! `wings-daemon::config`'s `control_bearer` helper implies (credentials are
//! assembled, never logged).

use std::path::Path;

use wings_daemon::DaemonConfig;

pub async fn run(config_path: &Path) {
    println!("wings-cli {}", env!("CARGO_PKG_VERSION"));

    match DaemonConfig::load(config_path) {
        Ok(config) => print_config(&config),
        Err(err) => println!("config: failed to load {}: {err}", config_path.display()),
    }

    print_docker_info().await;
}

fn print_config(config: &DaemonConfig) {
    println!("config:");
    println!("  uuid: {}", config.uuid);
    println!("  remote: {}", config.remote);
    println!("  token_id: {}", redact_tail(&config.token_id));
    println!("  token: <redacted>");
    println!("  debug: {}", config.debug);
    println!("  api: {}:{}", config.api.host, config.api.port);
    println!("  system.data: {}", config.system.data.display());
    println!("  system.sftp.bind_port: {}", config.system.sftp.bind_port);
    println!("  system.sftp.read_only: {}", config.system.sftp.read_only);

    print_log_tail(&config.system.data.join("logs"));
}

fn redact_tail(value: &str) -> String {
    let visible = value.chars().rev().take(4).collect::<Vec<_>>();
    let visible: String = visible.into_iter().rev().collect();
    format!("...{visible}")
}

async fn print_docker_info() {
    match bollard::Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.version().await {
            Ok(version) => println!(
                "docker: version={} api_version={}",
                version.version.unwrap_or_default(),
                version.api_version.unwrap_or_default(),
            ),
            Err(err) => println!("docker: failed to query version: {err}"),
        },
        Err(err) => println!("docker: failed to connect: {err}"),
    }
}

fn print_log_tail(log_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        println!("logs: no log directory at {}", log_dir.display());
        return;
    };

    let latest = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .unwrap_or(std::time::UNIX_EPOCH)
        });

    let Some(latest) = latest else {
        println!("logs: {} has no log files yet", log_dir.display());
        return;
    };

    match std::fs::read_to_string(latest.path()) {
        Ok(contents) => {
            println!("logs: tail of {}", latest.path().display());
            for line in contents.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev() {
                println!("  {line}");
            }
        }
        Err(err) => println!("logs: failed to read {}: {err}", latest.path().display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_tail_keeps_only_the_last_four_characters() {
        assert_eq!(redact_tail("abcdefghij"), "...ghij");
    }

    #[test]
    fn redact_tail_handles_short_values() {
        assert_eq!(redact_tail("ab"), "...ab");
    }

    #[test]
    fn print_log_tail_on_missing_directory_does_not_panic() {
        print_log_tail(Path::new("/nonexistent/wings-diagnostics-dir"));
    }

    #[test]
    fn print_log_tail_on_empty_directory_does_not_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        print_log_tail(dir.path());
    }
}
