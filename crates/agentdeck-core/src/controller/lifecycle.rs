//! Start and restart of the backend process.

use std::time::Duration;

use crate::api::BackendApi;
use crate::error::Result;
use crate::state::BackendState;

use super::{StatusLog, StatusPoller};

/// Not-running answers tolerated after an accepted start
pub const START_STATUS_CHECKS: u8 = 5;

/// Pause between status checks while an accepted start settles
pub const START_RECHECK_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Stopped,
    Starting,
    Running,
    /// Waiting for the user to answer the restart prompt
    ConfirmingRestart,
    Restarting,
}

impl LifecyclePhase {
    pub fn label(&self) -> &'static str {
        match self {
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::Starting => "starting",
            LifecyclePhase::Running => "running",
            LifecyclePhase::ConfirmingRestart => "confirm restart",
            LifecyclePhase::Restarting => "restarting",
        }
    }
}

#[derive(Debug, Default)]
pub struct LifecycleController {
    phase: LifecyclePhase,
    /// The start request succeeded; observations now decide the phase
    start_acknowledged: bool,
    /// Not-running observations since the start was acknowledged
    start_misses: u8,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// A start or restart is in flight. Scheduled status polls are skipped
    /// meanwhile.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, LifecyclePhase::Starting | LifecyclePhase::Restarting)
    }

    /// The backend accepted a start but no check has seen it running yet.
    /// The caller keeps checking status until this turns false.
    pub fn awaiting_start(&self) -> bool {
        self.phase == LifecyclePhase::Starting && self.start_acknowledged
    }

    /// Fold an observed backend state into the phase.
    pub fn observe(&mut self, state: BackendState, log: &mut StatusLog) {
        let running = state.is_running();
        self.phase = match self.phase {
            LifecyclePhase::Starting if running => {
                self.start_acknowledged = false;
                log.info("Backend is running");
                LifecyclePhase::Running
            }
            LifecyclePhase::Starting if self.start_acknowledged => {
                self.start_misses += 1;
                if self.start_misses < START_STATUS_CHECKS {
                    tracing::debug!(misses = self.start_misses, "Backend not up yet");
                    LifecyclePhase::Starting
                } else {
                    self.start_acknowledged = false;
                    log.error("Backend did not come up after starting");
                    LifecyclePhase::Stopped
                }
            }
            LifecyclePhase::Starting => LifecyclePhase::Starting,
            LifecyclePhase::Restarting => LifecyclePhase::Restarting,
            LifecyclePhase::ConfirmingRestart if running => LifecyclePhase::ConfirmingRestart,
            _ if running => LifecyclePhase::Running,
            _ => LifecyclePhase::Stopped,
        };
    }

    /// Enter `Starting`. Returns whether the caller should send the start
    /// request.
    pub fn begin_start(&mut self, log: &mut StatusLog) -> bool {
        match self.phase {
            LifecyclePhase::Stopped => {
                self.phase = LifecyclePhase::Starting;
                self.start_acknowledged = false;
                self.start_misses = 0;
                log.info("Starting backend...");
                true
            }
            LifecyclePhase::Running | LifecyclePhase::ConfirmingRestart => {
                log.info("Backend is already running");
                false
            }
            LifecyclePhase::Starting | LifecyclePhase::Restarting => false,
        }
    }

    /// Apply the start request's outcome. Returns `true` when the backend
    /// accepted and its status should be checked right away.
    pub fn finish_start(&mut self, result: Result<()>, log: &mut StatusLog) -> bool {
        if self.phase != LifecyclePhase::Starting {
            return false;
        }
        match result {
            Ok(()) => {
                self.start_acknowledged = true;
                true
            }
            Err(e) => {
                self.phase = LifecyclePhase::Stopped;
                log.error(format!("Failed to start backend: {e}"));
                false
            }
        }
    }

    pub async fn start<B: BackendApi + ?Sized>(
        &mut self,
        api: &B,
        state: &mut BackendState,
        log: &mut StatusLog,
    ) {
        if !self.begin_start(log) {
            return;
        }
        let result = api.start_backend().await;
        if !self.finish_start(result, log) {
            return;
        }
        loop {
            StatusPoller::apply(api.backend_status().await, state, log);
            self.observe(*state, log);
            if !self.awaiting_start() {
                break;
            }
            tokio::time::sleep(START_RECHECK_DELAY).await;
        }
    }

    /// Ask for confirmation before restarting. No request is made.
    pub fn request_restart(&mut self, log: &mut StatusLog) -> bool {
        if self.phase == LifecyclePhase::Running {
            self.phase = LifecyclePhase::ConfirmingRestart;
            true
        } else {
            log.info("Backend is not running");
            false
        }
    }

    /// Resolve the restart prompt. Returns whether the caller should send the
    /// restart request.
    pub fn answer_restart(&mut self, confirmed: bool, log: &mut StatusLog) -> bool {
        if self.phase != LifecyclePhase::ConfirmingRestart {
            return false;
        }
        if confirmed {
            self.phase = LifecyclePhase::Restarting;
            log.info("Restarting backend...");
            true
        } else {
            self.phase = LifecyclePhase::Running;
            log.info("Restart cancelled");
            false
        }
    }

    /// Back to `Running` whatever the outcome; failures are only reported.
    pub fn finish_restart(
        &mut self,
        result: Result<()>,
        state: &mut BackendState,
        log: &mut StatusLog,
    ) {
        if self.phase != LifecyclePhase::Restarting {
            return;
        }
        self.phase = LifecyclePhase::Running;
        match result {
            Ok(()) => {
                *state = BackendState::Running;
                log.info("Backend restarted");
            }
            Err(e) => log.error(format!("Failed to restart backend: {e}")),
        }
    }

    pub async fn confirm_restart<B: BackendApi + ?Sized>(
        &mut self,
        confirmed: bool,
        api: &B,
        state: &mut BackendState,
        log: &mut StatusLog,
    ) {
        if self.answer_restart(confirmed, log) {
            let result = api.restart_backend().await;
            self.finish_restart(result, state, log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::fake::FakeBackend;
    use crate::error::Error;

    fn running_controller() -> (LifecycleController, StatusLog) {
        let mut log = StatusLog::new();
        let mut lifecycle = LifecycleController::new();
        lifecycle.observe(BackendState::Running, &mut log);
        (lifecycle, log)
    }

    #[tokio::test]
    async fn test_start_waits_for_running_status() {
        let api = FakeBackend::default();
        let mut lifecycle = LifecycleController::new();
        let mut state = BackendState::Stopped;
        let mut log = StatusLog::new();

        lifecycle.start(&api, &mut state, &mut log).await;

        assert_eq!(api.calls("start backend"), 1);
        assert_eq!(api.calls("status"), 1);
        assert_eq!(state, BackendState::Running);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
    }

    #[test]
    fn test_start_is_busy_until_observed() {
        let mut lifecycle = LifecycleController::new();
        let mut log = StatusLog::new();

        assert!(lifecycle.begin_start(&mut log));
        assert!(lifecycle.is_busy());
        // Observations before the request completes don't settle the phase.
        lifecycle.observe(BackendState::Stopped, &mut log);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Starting);

        assert!(lifecycle.finish_start(Ok(()), &mut log));
        assert!(lifecycle.is_busy());
        lifecycle.observe(BackendState::Running, &mut log);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
        assert!(!lifecycle.is_busy());
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_stopped() {
        let api = FakeBackend::default().rejecting("start backend");
        let mut lifecycle = LifecycleController::new();
        let mut state = BackendState::Stopped;
        let mut log = StatusLog::new();

        lifecycle.start(&api, &mut state, &mut log).await;

        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
        assert_eq!(state, BackendState::Stopped);
        assert_eq!(api.calls("status"), 0);
        assert!(log.latest().unwrap().text.contains("Failed to start"));
    }

    #[test]
    fn test_accepted_start_tolerates_slow_backend() {
        let mut lifecycle = LifecycleController::new();
        let mut log = StatusLog::new();
        lifecycle.begin_start(&mut log);
        lifecycle.finish_start(Ok(()), &mut log);

        for _ in 1..START_STATUS_CHECKS {
            lifecycle.observe(BackendState::Stopped, &mut log);
            assert_eq!(lifecycle.phase(), LifecyclePhase::Starting);
            assert!(lifecycle.awaiting_start());
        }
        lifecycle.observe(BackendState::Running, &mut log);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
        assert!(!lifecycle.awaiting_start());
    }

    #[test]
    fn test_accepted_start_gives_up_eventually() {
        let mut lifecycle = LifecycleController::new();
        let mut log = StatusLog::new();
        lifecycle.begin_start(&mut log);
        lifecycle.finish_start(Ok(()), &mut log);

        for _ in 0..START_STATUS_CHECKS {
            lifecycle.observe(BackendState::Unknown, &mut log);
        }

        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
        assert!(!lifecycle.is_busy());
        assert!(log.latest().unwrap().text.contains("did not come up"));
    }

    #[test]
    fn test_start_ignored_when_running() {
        let (mut lifecycle, mut log) = running_controller();
        assert!(!lifecycle.begin_start(&mut log));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
    }

    #[tokio::test]
    async fn test_restart_declined_sends_nothing() {
        let api = FakeBackend::running();
        let (mut lifecycle, mut log) = running_controller();
        let mut state = BackendState::Running;

        assert!(lifecycle.request_restart(&mut log));
        assert_eq!(lifecycle.phase(), LifecyclePhase::ConfirmingRestart);
        lifecycle.confirm_restart(false, &api, &mut state, &mut log).await;

        assert_eq!(api.total_calls(), 0);
        assert_eq!(state, BackendState::Running);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
    }

    #[tokio::test]
    async fn test_restart_confirmed() {
        let api = FakeBackend::running();
        let (mut lifecycle, mut log) = running_controller();
        let mut state = BackendState::Running;

        lifecycle.request_restart(&mut log);
        lifecycle.confirm_restart(true, &api, &mut state, &mut log).await;

        assert_eq!(api.calls("restart backend"), 1);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
    }

    #[test]
    fn test_restart_failure_still_returns_to_running() {
        let (mut lifecycle, mut log) = running_controller();
        let mut state = BackendState::Running;

        lifecycle.request_restart(&mut log);
        assert!(lifecycle.answer_restart(true, &mut log));
        assert!(lifecycle.is_busy());
        lifecycle.finish_restart(Err(Error::ChannelClosed), &mut state, &mut log);

        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
        assert!(!lifecycle.is_busy());
        assert!(log.latest().unwrap().text.contains("Failed to restart"));
    }

    #[test]
    fn test_restart_needs_running_backend() {
        let mut lifecycle = LifecycleController::new();
        let mut log = StatusLog::new();
        assert!(!lifecycle.request_restart(&mut log));
        assert!(!lifecycle.answer_restart(true, &mut log));
    }

    #[test]
    fn test_backend_dying_closes_prompt() {
        let (mut lifecycle, mut log) = running_controller();
        lifecycle.request_restart(&mut log);
        lifecycle.observe(BackendState::Unknown, &mut log);
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
    }
}
