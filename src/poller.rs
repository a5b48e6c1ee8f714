//! Round-tracking poller
//!
//! The poller keeps a best-effort view of the remote network's current round.
//! It long-polls for the round after the one it last saw, publishes timing and
//! transaction counts for it, and falls back to a fresh baseline from the
//! status endpoint whenever the tracking looks stale.
//!
//! The loop state is an explicit [`LoopState`] value. Each iteration consumes
//! the previous state and produces the next one, so the staleness rules can be
//! exercised without a network or a runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::PollerConfig;
use crate::source::RoundSource;
use crate::types::{PollResult, Position};

/// Phases of the polling state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fetching the first baseline position
    Initializing,
    /// Long-polling for the round after the tracked one
    Steady,
    /// Replacing a stale baseline with a fresh one
    Resyncing,
    /// Stopped; no further network calls
    Cancelled,
}

/// State carried from one iteration to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    /// When the previous poll attempt began, successful or not
    pub last_fetch_time: Option<Instant>,
    /// The last polled position, or the baseline after a resync
    pub latest_fetched_position: Option<Position>,
}

/// Outcome of the staleness check after a successful poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// The previous attempt started too long ago
    Slow { since: Duration },
    /// The tracked position leads the fetched one by too much
    Behind { lead: u64 },
}

impl Staleness {
    pub fn is_stale(self) -> bool {
        !matches!(self, Staleness::Fresh)
    }
}

/// Thresholds for the staleness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub stale_after: Duration,
    pub max_round_gap: u64,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for StalenessPolicy {
    fn from(config: &PollerConfig) -> Self {
        Self { stale_after: config.stale_after(), max_round_gap: config.max_round_gap }
    }
}

impl StalenessPolicy {
    /// Judge a freshly fetched result against the state before it was applied.
    ///
    /// `started` is when this iteration began, not when the result arrived, so
    /// the slow check measures the gap between the starts of two attempts.
    /// The slow check wins when both apply. The behind check compares the
    /// tracked position against the fetched one, so a result newer than the
    /// tracked position is never behind.
    pub fn evaluate(&self, state: &LoopState, result: &PollResult, started: Instant) -> Staleness {
        if let Some(last) = state.last_fetch_time {
            let since = started.saturating_duration_since(last);
            if since > self.stale_after {
                return Staleness::Slow { since };
            }
        }

        if let Some(latest) = state.latest_fetched_position {
            let lead = latest.lead_over(result.position);
            if lead > self.max_round_gap {
                return Staleness::Behind { lead };
            }
        }

        Staleness::Fresh
    }
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a baseline from the status endpoint.
    pub fn with_baseline(self, position: Position) -> Self {
        Self { latest_fetched_position: Some(position), ..self }
    }

    /// Record a failed poll attempt that began at `started`. The tracked position is kept.
    pub fn after_failure(self, started: Instant) -> Self {
        Self { last_fetch_time: Some(started), ..self }
    }

    /// Apply a successful poll that began at `started`.
    ///
    /// Returns the next state and the phase to enter.
    pub fn after_success(
        self,
        result: &PollResult,
        started: Instant,
        policy: &StalenessPolicy,
    ) -> (Self, Phase, Staleness) {
        let staleness = policy.evaluate(&self, result, started);
        let next = Self {
            last_fetch_time: Some(started),
            latest_fetched_position: Some(result.position),
        };
        let phase = if staleness.is_stale() { Phase::Resyncing } else { Phase::Steady };
        (next, phase, staleness)
    }
}

/// Result of spawning a poller task
pub struct PollerChannels {
    /// Receiver for published results
    pub results: watch::Receiver<Option<Arc<PollResult>>>,
    /// Cancellation token for shutdown
    pub cancel: CancellationToken,
}

/// Drives a [`RoundSource`] through the polling state machine
pub struct RoundPoller<S> {
    source: S,
    policy: StalenessPolicy,
    retry_delay: Duration,
    /// Cuts backoff sleeps short when cancelled
    shutdown: Option<CancellationToken>,
}

impl<S: RoundSource> RoundPoller<S> {
    /// Create a poller with default delays and thresholds
    pub fn new(source: S) -> Self {
        Self::with_config(source, &PollerConfig::default())
    }

    /// Create a poller using the delays and thresholds in `config`
    pub fn with_config(source: S, config: &PollerConfig) -> Self {
        Self {
            source,
            policy: StalenessPolicy::from(config),
            retry_delay: config.retry_delay(),
            shutdown: None,
        }
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// Get the current position known to the source
    pub async fn fetch_initial_position(&self) -> crate::Result<Position> {
        self.source.fetch_initial_position().await
    }

    /// Wait for the position after `from` and collect its metrics
    pub async fn await_next_position(&self, from: Position) -> crate::Result<PollResult> {
        self.source.await_next_position(from).await
    }

    /// Run until `is_cancelled` returns true at an iteration boundary.
    ///
    /// `on_update` is called once per successful poll, in order. Errors never
    /// leave the loop; they are logged and retried after the fixed delay.
    /// Returns the state at cancellation.
    pub async fn run_loop<F, C>(&self, on_update: F, is_cancelled: C) -> LoopState
    where
        F: FnMut(PollResult),
        C: Fn() -> bool,
    {
        self.run_observed(on_update, is_cancelled, |_, _| {}).await
    }

    /// Like [`run_loop`](Self::run_loop), also reporting every phase entered
    /// together with the state at that point.
    pub async fn run_observed<F, C, O>(
        &self,
        mut on_update: F,
        is_cancelled: C,
        mut on_phase: O,
    ) -> LoopState
    where
        F: FnMut(PollResult),
        C: Fn() -> bool,
        O: FnMut(Phase, &LoopState),
    {
        info!(source = self.source.name(), "Round poller started");
        let mut state = LoopState::new();
        let mut phase = Phase::Initializing;
        let mut published = 0u64;
        on_phase(phase, &state);

        loop {
            if is_cancelled() {
                on_phase(Phase::Cancelled, &state);
                break;
            }

            let next = match phase {
                Phase::Initializing | Phase::Resyncing => {
                    match self.source.fetch_initial_position().await {
                        Ok(position) => {
                            if phase == Phase::Resyncing {
                                info!(
                                    previous = ?state.latest_fetched_position,
                                    %position,
                                    "Resynchronized to fresh baseline"
                                );
                            } else {
                                info!(%position, "Fetched initial position");
                            }
                            state = state.with_baseline(position);
                            Phase::Steady
                        }
                        Err(e) => {
                            warn!(
                                phase = ?phase,
                                kind = e.kind(),
                                "Failed to fetch baseline position, retrying in {:?}: {}",
                                self.retry_delay,
                                e
                            );
                            self.backoff().await;
                            phase
                        }
                    }
                }
                Phase::Steady => {
                    let Some(from) = state.latest_fetched_position else {
                        // No baseline to wait past
                        phase = Phase::Initializing;
                        on_phase(phase, &state);
                        continue;
                    };

                    let started = Instant::now();
                    match self.source.await_next_position(from).await {
                        Ok(result) => {
                            published += 1;
                            trace!(
                                position = %result.position,
                                elapsed_ms = result.elapsed_ms,
                                auxiliary_count = result.auxiliary_count,
                                "Poll {} succeeded",
                                published
                            );
                            on_update(result);

                            let (next_state, next_phase, staleness) =
                                state.after_success(&result, started, &self.policy);
                            if staleness.is_stale() {
                                info!(?staleness, position = %result.position, "Tracking is stale");
                            }
                            state = next_state;
                            next_phase
                        }
                        Err(e) => {
                            warn!(
                                %from,
                                kind = e.kind(),
                                "Failed to poll next position, retrying in {:?}: {}",
                                self.retry_delay,
                                e
                            );
                            state = state.after_failure(started);
                            self.backoff().await;
                            Phase::Steady
                        }
                    }
                }
                Phase::Cancelled => break,
            };

            if next != phase {
                debug!(from = ?phase, to = ?next, "Poller phase changed");
                phase = next;
                on_phase(phase, &state);
            }
        }

        info!("Round poller stopped after {} published results", published);
        state
    }

    async fn backoff(&self) {
        match &self.shutdown {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
            None => tokio::time::sleep(self.retry_delay).await,
        }
    }

    /// Spawn the poller on a tokio task
    ///
    /// Returns a watch receiver for results plus a cancellation token. The
    /// task also stops once every receiver has been dropped.
    pub fn spawn(mut self) -> PollerChannels {
        let (result_tx, result_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        self.shutdown = Some(cancel.clone());

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            self.run_loop(
                |result| {
                    let _ = result_tx.send(Some(Arc::new(result)));
                },
                || cancel_task.is_cancelled() || result_tx.is_closed(),
            )
            .await;
        });

        PollerChannels { results: result_rx, cancel }
    }
}
