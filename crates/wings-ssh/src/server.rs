// SPDX-License-Identifier: MIT

//! SSH listener and per-connection handler (spec.md §4.7.1): hand-rolled
//! accept loop in the style of the IPC listener this crate's SFTP front-end
//! replaces, one spawned task per connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::keys::ssh_key::private::PrivateKey;
use russh::server::{Auth, Config, Handler, Msg, Session};
use russh::{Channel, ChannelId};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use wings_core::{Permissions, ServerId};
use wings_engine::ServerManager;
use wings_panel::{PanelClient, PanelError, SftpAuthRequest};
use wings_store::ActivityBuffer;

use crate::error::SshError;
use crate::ops::SftpSession;
use crate::sftp::SftpHandler;
use crate::username::validate_username;

/// 5-minute credential cache (§5 "Shared resources") would sit in front of
/// `sftp_auth`; deferred until the Panel client itself grows a cache layer,
/// since every auth here already goes through one retrying HTTP call.
pub struct SshListener {
    host_key: PrivateKey,
    panel: Arc<PanelClient>,
    manager: Arc<ServerManager>,
    general_activity: Arc<ActivityBuffer>,
    sftp_activity: Arc<ActivityBuffer>,
    read_only: bool,
    shutdown: CancellationToken,
}

impl SshListener {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host_key: PrivateKey,
        panel: Arc<PanelClient>,
        manager: Arc<ServerManager>,
        general_activity: Arc<ActivityBuffer>,
        sftp_activity: Arc<ActivityBuffer>,
        read_only: bool,
        shutdown: CancellationToken,
    ) -> Self {
        Self { host_key, panel, manager, general_activity, sftp_activity, read_only, shutdown }
    }

    pub async fn run(self, addr: SocketAddr) -> Result<(), SshError> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "sftp front-end listening");

        let config = Arc::new(Config {
            keys: vec![self.host_key.clone()],
            auth_rejection_time: Duration::from_secs(1),
            ..Default::default()
        });
        let shared = Arc::new(self);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let config = Arc::clone(&config);
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        let client_version = peek_client_version(&stream).await;
                        let handler = ConnectionHandler::new(shared, peer, client_version);
                        if let Err(err) = russh::server::run_stream(config, stream, handler).await {
                            warn!(%peer, %err, "sftp connection ended with error");
                        }
                    });
                }
                Err(err) => error!(%err, "sftp accept error"),
            }
        }
    }
}

/// Peeks the client's SSH identification string (RFC 4253 §4.2) off the raw
/// socket without consuming it, so it's known before `russh` starts the
/// version exchange and drives `auth_password`.
async fn peek_client_version(stream: &tokio::net::TcpStream) -> String {
    let mut buf = [0u8; 256];
    match stream.peek(&mut buf).await {
        Ok(0) | Err(_) => String::new(),
        Ok(n) => String::from_utf8_lossy(&buf[..n])
            .lines()
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r')
            .to_string(),
    }
}

struct Authenticated {
    server: ServerId,
    user: Uuid,
    permissions: Permissions,
}

struct ConnectionHandler {
    shared: Arc<SshListener>,
    peer: SocketAddr,
    session_id: String,
    client_version: String,
    authenticated: Option<Authenticated>,
    channel: Option<Channel<Msg>>,
}

impl ConnectionHandler {
    fn new(shared: Arc<SshListener>, peer: SocketAddr, client_version: String) -> Self {
        Self {
            shared,
            peer,
            session_id: Uuid::new_v4().to_string(),
            client_version,
            authenticated: None,
            channel: None,
        }
    }
}

#[async_trait]
impl Handler for ConnectionHandler {
    type Error = SshError;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if validate_username(user).is_err() {
            return Ok(Auth::Reject { proceed_with_methods: None });
        }

        let request = SftpAuthRequest {
            username: user.to_string(),
            password: password.to_string(),
            ip: self.peer.ip().to_string(),
            session_id: self.session_id.clone(),
            client_version: self.client_version.clone(),
        };

        match self.shared.panel.sftp_auth(request, &self.shared.shutdown).await {
            Ok(response) => {
                self.authenticated = Some(Authenticated {
                    server: response.server,
                    user: response.user,
                    permissions: Permissions::new(response.permissions),
                });
                Ok(Auth::Accept)
            }
            Err(PanelError::InvalidCredentials) => Ok(Auth::Reject { proceed_with_methods: None }),
            Err(err) => {
                warn!(%err, "sftp auth call to panel failed");
                Ok(Auth::Reject { proceed_with_methods: None })
            }
        }
    }

    async fn channel_open_session(&mut self, channel: Channel<Msg>, _session: &mut Session) -> Result<bool, Self::Error> {
        self.channel = Some(channel);
        Ok(true)
    }

    async fn subsystem_request(&mut self, channel_id: ChannelId, name: &str, session: &mut Session) -> Result<(), Self::Error> {
        let Some(channel) = self.channel.take() else {
            session.channel_failure(channel_id);
            return Ok(());
        };
        let Some(auth) = &self.authenticated else {
            session.channel_failure(channel_id);
            return Ok(());
        };
        if name != "sftp" {
            session.channel_failure(channel_id);
            return Ok(());
        }

        let Some(server) = self.shared.manager.get(auth.server) else {
            session.channel_failure(channel_id);
            return Ok(());
        };

        let sftp_session = SftpSession::new(
            server,
            auth.user,
            self.peer.ip(),
            auth.permissions.clone(),
            self.shared.read_only,
            Arc::clone(&self.shared.general_activity),
            Arc::clone(&self.shared.sftp_activity),
        );
        let handler = SftpHandler::new(sftp_session);

        session.channel_success(channel_id);
        tokio::spawn(async move {
            if let Err(err) = russh_sftp::server::run(channel.into_stream(), handler).await {
                warn!(%err, "sftp subsystem session ended with error");
            }
        });
        Ok(())
    }
}
