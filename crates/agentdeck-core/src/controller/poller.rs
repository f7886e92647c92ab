//! Periodic backend status checks.

use std::time::Duration;

use crate::api::BackendApi;
use crate::error::Result;
use crate::state::BackendState;

use super::StatusLog;

#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    interval: Duration,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Scheduled polls are skipped while a start or restart is in flight
    pub fn should_poll(&self, loading: bool) -> bool {
        !loading
    }

    /// Overwrite `state` with a status result. A failed check means the
    /// backend's state is unknown; it is reported once per transition.
    pub fn apply(
        result: Result<bool>,
        state: &mut BackendState,
        log: &mut StatusLog,
    ) -> BackendState {
        let previous = *state;
        *state = match result {
            Ok(is_running) => BackendState::from_running(is_running),
            Err(e) => {
                if previous != BackendState::Unknown {
                    log.error(format!("Backend status check failed: {e}"));
                } else {
                    tracing::debug!("Backend status check failed: {e}");
                }
                BackendState::Unknown
            }
        };
        if previous != *state {
            tracing::info!(from = previous.label(), to = state.label(), "Backend state changed");
        }
        *state
    }

    /// Run one scheduled poll. Returns `None` when it was skipped.
    pub async fn poll<B: BackendApi + ?Sized>(
        &self,
        api: &B,
        state: &mut BackendState,
        loading: bool,
        log: &mut StatusLog,
    ) -> Option<BackendState> {
        if !self.should_poll(loading) {
            tracing::debug!("Skipping status poll while loading");
            return None;
        }
        Some(Self::apply(api.backend_status().await, state, log))
    }
}
