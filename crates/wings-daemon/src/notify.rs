// SPDX-License-Identifier: MIT

//! `NOTIFY_SOCKET` readiness protocol (spec.md §6 "Environment"). A no-op
//! whenever the variable isn't set, e.g. when not run under systemd.

use sd_notify::NotifyState;
use tracing::warn;

pub fn ready() {
    notify(&[NotifyState::Ready]);
}

pub fn reloading() {
    notify(&[NotifyState::Reloading]);
}

pub fn stopping() {
    notify(&[NotifyState::Stopping]);
}

fn notify(state: &[NotifyState]) {
    if let Err(err) = sd_notify::notify(false, state) {
        warn!(%err, "failed to send systemd readiness notification");
    }
}
