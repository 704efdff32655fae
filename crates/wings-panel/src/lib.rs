// SPDX-License-Identifier: MIT

//! wings-panel: the authenticated RPC-style client to the Panel (C2).
//!
//! One [`PanelClient`] per daemon process. Every call retries transient
//! failures with backoff internally (spec.md §9's "Retry policy") — callers
//! see only a final success or a final, non-retryable error.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod dto;
mod error;
mod retry;

pub use dto::{
    ActivitySubmission, ActivityWire, ArchiveStatus, BackupCompletion, BackupPart,
    BackupUploadUrls, InstallScript, InstallStatus, PageMeta, ResetStuckFlags, RestoreCompletion,
    ServerListPage, ServerSpec, SftpAuthRequest, SftpAuthResponse, TransferStatus,
};
pub use error::PanelError;

use retry::with_backoff;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wings_core::{ActivityRecord, ServerId};

const USER_AGENT_TEMPLATE: &str = concat!("Pterodactyl Wings/v", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_CONCURRENT_PAGES: usize = 4;

pub struct PanelClient {
    http: reqwest::Client,
    base_url: String,
    node_id: String,
}

impl PanelClient {
    pub fn new(base_url: impl Into<String>, node_id: impl Into<String>, token: impl Into<String>) -> Result<Self, PanelError> {
        let node_id = node_id.into();
        let token = token.into();
        let user_agent = format!("{USER_AGENT_TEMPLATE} (id:{node_id})");

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {node_id}.{token}")
                .parse()
                .map_err(|_| PanelError::InvalidCredentials)?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            "application/vnd.pterodactyl.v1+json".parse().unwrap(),
        );

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), node_id })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, PanelError> {
        let path = path.to_string();
        with_backoff(cancel, || {
            let path = path.clone();
            async move {
                let response = self.http.get(self.url(&path)).send().await?;
                Self::decode(response).await
            }
        })
        .await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, PanelError> {
        let path = path.to_string();
        with_backoff(cancel, || {
            let path = path.clone();
            async move {
                let response = self.http.post(self.url(&path)).json(body).send().await?;
                Self::decode(response).await
            }
        })
        .await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PanelError> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Ok(serde_json::from_value(serde_json::Value::Null)?);
            }
            return Ok(serde_json::from_slice(&bytes)?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PanelError::from_status(status, body))
    }

    /// GET `/servers?page&per_page`, fetching all pages. The first page is
    /// awaited to learn `meta.last_page`, then the rest are fetched
    /// concurrently under a bounded error-group: the first page failure
    /// aborts the whole call (spec.md §4.2).
    pub async fn list_servers(&self, cancel: &CancellationToken) -> Result<Vec<ServerSpec>, PanelError> {
        let first = self.fetch_server_page(1, cancel).await?;
        let mut servers = first.data;
        let last_page = first.meta.last_page;
        if last_page <= 1 {
            return Ok(servers);
        }

        let mut join_set = tokio::task::JoinSet::new();
        let mut next_page = 2;
        let mut in_flight = 0usize;
        let mut pages: Vec<Option<Vec<ServerSpec>>> = vec![None; (last_page - 1) as usize];

        loop {
            while in_flight < MAX_CONCURRENT_PAGES && next_page <= last_page {
                let page = next_page;
                let http = self.http.clone();
                let url = self.url(&format!("/servers?page={page}&per_page=50"));
                join_set.spawn(async move {
                    let response = http.get(url).send().await?;
                    let parsed: ServerListPage = Self::decode(response).await?;
                    Ok::<_, PanelError>((page, parsed.data))
                });
                next_page += 1;
                in_flight += 1;
            }

            let joined = tokio::select! {
                joined = join_set.join_next() => joined,
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(PanelError::Cancelled);
                }
            };
            let Some(joined) = joined else { break };
            in_flight -= 1;
            match joined {
                Ok(Ok((page, data))) => pages[(page - 2) as usize] = Some(data),
                Ok(Err(panel_err)) => {
                    join_set.abort_all();
                    return Err(panel_err);
                }
                Err(join_err) => {
                    join_set.abort_all();
                    return Err(PanelError::Permanent {
                        status: 0,
                        body: format!("page fetch task panicked: {join_err}"),
                    });
                }
            }
        }

        for page in pages.into_iter().flatten() {
            servers.extend(page);
        }
        Ok(servers)
    }

    async fn fetch_server_page(&self, page: u32, cancel: &CancellationToken) -> Result<ServerListPage, PanelError> {
        self.get_json(&format!("/servers?page={page}&per_page=50"), cancel).await
    }

    pub async fn get_server(&self, id: ServerId, cancel: &CancellationToken) -> Result<ServerSpec, PanelError> {
        self.get_json(&format!("/servers/{id}"), cancel).await
    }

    pub async fn get_install_script(
        &self,
        id: ServerId,
        cancel: &CancellationToken,
    ) -> Result<InstallScript, PanelError> {
        self.get_json(&format!("/servers/{id}/install"), cancel).await
    }

    pub async fn submit_install_status(
        &self,
        id: ServerId,
        status: InstallStatus,
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        self.post_json(&format!("/servers/{id}/install"), &status, cancel).await
    }

    pub async fn submit_archive_status(
        &self,
        id: ServerId,
        status: ArchiveStatus,
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        self.post_json(&format!("/servers/{id}/archive"), &status, cancel).await
    }

    pub async fn report_transfer(
        &self,
        id: ServerId,
        success: bool,
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        let outcome = if success { "success" } else { "failure" };
        self.get_json(&format!("/servers/{id}/transfer/{outcome}"), cancel).await
    }

    /// POST `/servers/reset` — spec.md §4.6.1 step 5, a single idempotent
    /// request run once after boot reconciliation drains.
    pub async fn reset_stuck_servers(&self, cancel: &CancellationToken) -> Result<(), PanelError> {
        self.post_json("/servers/reset", &ResetStuckFlags { successful: true }, cancel).await
    }

    pub async fn get_backup_upload_urls(
        &self,
        backup_id: ServerId,
        size: u64,
        cancel: &CancellationToken,
    ) -> Result<BackupUploadUrls, PanelError> {
        self.get_json(&format!("/backups/{backup_id}?size={size}"), cancel).await
    }

    pub async fn submit_backup_completion(
        &self,
        backup_id: ServerId,
        completion: BackupCompletion,
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        self.post_json(&format!("/backups/{backup_id}"), &completion, cancel).await
    }

    pub async fn submit_restore_completion(
        &self,
        backup_id: ServerId,
        completion: RestoreCompletion,
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        self.post_json(&format!("/backups/{backup_id}/restore"), &completion, cancel).await
    }

    /// POST `/sftp/auth`. Unlike every other call, a 401/403 here is not a
    /// broken Panel — it is the answer "bad password" — so it is classified
    /// via [`PanelError::from_auth_status`] and never retried.
    pub async fn sftp_auth(
        &self,
        request: SftpAuthRequest,
        cancel: &CancellationToken,
    ) -> Result<SftpAuthResponse, PanelError> {
        with_backoff(cancel, || {
            let request = &request;
            async move {
                let response = self.http.post(self.url("/sftp/auth")).json(request).send().await?;
                let status = response.status();
                if status.is_success() {
                    let bytes = response.bytes().await?;
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                let body = response.text().await.unwrap_or_default();
                Err(PanelError::from_auth_status(status, body))
            }
        })
        .await
    }

    /// POST `/activity` — a single batch of records, per spec.md §4.8.2/.3.
    pub async fn submit_activity(
        &self,
        records: &[ActivityRecord],
        cancel: &CancellationToken,
    ) -> Result<(), PanelError> {
        let submission = ActivitySubmission { data: records.iter().map(ActivityWire::from).collect() };
        self.post_json("/activity", &submission, cancel).await
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_rejects_non_ascii_token_header() {
        let result = PanelClient::new("https://panel.example", "1", "tok\nwith-newline");
        assert!(result.is_err());
    }

    #[test]
    fn url_joins_base_and_path() {
        let client = PanelClient::new("https://panel.example/", "1", "secret").unwrap();
        assert_eq!(client.url("/servers"), "https://panel.example/servers");
    }
}
