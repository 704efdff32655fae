// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("store error: {0}")]
    Store(#[from] wings_store::StoreError),
    #[error("panel error: {0}")]
    Panel(#[from] wings_panel::PanelError),
    #[error("malformed files metadata: {0}")]
    Files(#[from] serde_json::Error),
}
