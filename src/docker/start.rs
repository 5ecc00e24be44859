//! Start a container and poll it until the daemon reports it running

use std::time::Duration;

use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::client::RuntimeClient;
use super::error::DockError;

/// Shortest poll interval; `interval_at` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Progress of a container start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPhase {
    /// Start not yet acknowledged by the daemon.
    Requested,
    /// Start accepted, waiting to observe the running state.
    Starting,
    Running,
    TimedOut,
}

/// Issues a start and polls `inspect` on a fixed interval until the container
/// runs or the budget (which covers the start call too) is spent.
pub struct StartPoll<'a> {
    client: &'a dyn RuntimeClient,
    container_id: &'a str,
    budget: Duration,
    interval: Duration,
    phase: StartPhase,
    polls: u32,
}

impl<'a> StartPoll<'a> {
    pub fn new(
        client: &'a dyn RuntimeClient,
        container_id: &'a str,
        budget: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            container_id,
            budget,
            interval: interval.max(MIN_POLL_INTERVAL),
            phase: StartPhase::Requested,
            polls: 0,
        }
    }

    pub fn phase(&self) -> StartPhase {
        self.phase
    }

    /// Number of inspect calls made so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub async fn run(&mut self) -> Result<(), DockError> {
        let deadline = Instant::now() + self.budget;

        let outcome = timeout_at(deadline, self.converge()).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.transition(StartPhase::TimedOut);
                Err(DockError::timeout("container start", self.budget))
            }
        }
    }

    async fn converge(&mut self) -> Result<(), DockError> {
        self.client
            .start_container(self.container_id)
            .await
            .map_err(|source| self.start_failed(source))?;
        self.transition(StartPhase::Starting);

        // First inspect one interval after the start was accepted.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.polls += 1;

            let inspected = self
                .client
                .inspect_container(self.container_id)
                .await
                .map_err(|source| self.start_failed(source))?;

            let running = inspected
                .state
                .and_then(|state| state.running)
                .unwrap_or(false);
            if running {
                self.transition(StartPhase::Running);
                return Ok(());
            }

            debug!(
                container_id = %self.container_id,
                polls = self.polls,
                "Container not running yet"
            );
        }
    }

    fn transition(&mut self, next: StartPhase) {
        debug!(
            container_id = %self.container_id,
            from = ?self.phase,
            to = ?next,
            "Container start phase"
        );
        self.phase = next;
    }

    fn start_failed(&self, source: bollard::errors::Error) -> DockError {
        DockError::ContainerStart {
            container_id: self.container_id.to_string(),
            source,
        }
    }
}
