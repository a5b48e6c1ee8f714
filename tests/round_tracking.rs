//! End-to-end round tracking against a simulated network
//!
//! The simulated network produces a round every 2.8 seconds of tokio time.
//! Its node can be told to drop a long-poll or to stall on a round, which
//! exercises retry and resynchronization through the public API only.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use roundwatch::{
    PollError, PollResult, PollerConfig, Position, RoundPoller, RoundSource, Roundwatch, UpdateRate,
};
use tokio::time::Instant;

const ROUND_TIME: Duration = Duration::from_millis(2_800);

struct SimulatedNetwork {
    genesis: Instant,
    first_round: u64,
    status_calls: AtomicUsize,
    /// Rounds for which the long-poll fails once before succeeding
    flaky_rounds: Mutex<Vec<u64>>,
    /// Rounds whose long-poll is held 30 seconds past the round
    stalled_rounds: Mutex<Vec<u64>>,
    waits: AtomicU64,
}

impl SimulatedNetwork {
    fn new(first_round: u64) -> Self {
        Self {
            genesis: Instant::now(),
            first_round,
            status_calls: AtomicUsize::new(0),
            flaky_rounds: Mutex::new(Vec::new()),
            stalled_rounds: Mutex::new(Vec::new()),
            waits: AtomicU64::new(0),
        }
    }

    fn current_round(&self) -> u64 {
        let elapsed = self.genesis.elapsed().as_millis() as u64;
        self.first_round + elapsed / ROUND_TIME.as_millis() as u64
    }

    fn round_start(&self, round: u64) -> Instant {
        self.genesis + ROUND_TIME * (round - self.first_round) as u32
    }
}

#[async_trait::async_trait]
impl RoundSource for SimulatedNetwork {
    async fn fetch_initial_position(&self) -> roundwatch::Result<Position> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Position(self.current_round()))
    }

    async fn await_next_position(&self, from: Position) -> roundwatch::Result<PollResult> {
        let started = Instant::now();
        self.waits.fetch_add(1, Ordering::SeqCst);

        let next = from.next();
        let flaky = {
            let mut flaky = self.flaky_rounds.lock().unwrap();
            let hit = flaky.iter().position(|r| *r == next.value());
            hit.map(|index| flaky.remove(index)).is_some()
        };
        if flaky {
            return Err(PollError::network_failed("connection reset by peer"));
        }

        let mut ready_at = self.round_start(next.value());
        if self.stalled_rounds.lock().unwrap().contains(&next.value()) {
            ready_at += Duration::from_secs(30);
        }
        tokio::time::sleep_until(ready_at.max(Instant::now())).await;
        Ok(PollResult::new(next, started.elapsed(), (next.value() % 7) as usize))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[tokio::test(start_paused = true)]
async fn follows_the_network_round_by_round() {
    let network = SimulatedNetwork::new(1_000);
    let connection = Roundwatch::from_source(network, &PollerConfig::default());
    let mut rounds = Box::pin(connection.subscribe(UpdateRate::Native));

    let mut seen = Vec::new();
    for _ in 0..5 {
        let result = rounds.next().await.expect("network keeps producing rounds");
        seen.push(result.position.value());
        assert_eq!(result.auxiliary_count, (result.position.value() % 7) as usize);
    }

    assert_eq!(seen, vec![1_001, 1_002, 1_003, 1_004, 1_005]);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_delays_but_does_not_skip_rounds() {
    let network = Arc::new(SimulatedNetwork::new(500));
    network.flaky_rounds.lock().unwrap().push(502);

    let poller = RoundPoller::new(Arc::clone(&network));
    let published = Mutex::new(Vec::new());
    let target = Position(504);

    poller
        .run_loop(
            |result| published.lock().unwrap().push(result.position),
            || published.lock().unwrap().last() == Some(&target),
        )
        .await;

    assert_eq!(
        published.into_inner().unwrap(),
        vec![Position(501), Position(502), Position(503), Position(504)]
    );
    // One baseline fetch; the failure retried without a resync
    assert_eq!(network.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(network.waits.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn stalled_node_triggers_resync_to_current_round() {
    let network = Arc::new(SimulatedNetwork::new(200));
    network.stalled_rounds.lock().unwrap().push(202);

    let poller = RoundPoller::new(Arc::clone(&network));
    let published = Mutex::new(Vec::new());
    let target = Position(213);

    poller
        .run_loop(
            |result| published.lock().unwrap().push(result.position),
            || published.lock().unwrap().last() == Some(&target),
        )
        .await;

    // 203 starts more than 25s after 202 did, so the poller jumps to the
    // network's current round instead of crawling through the backlog
    assert_eq!(
        published.into_inner().unwrap(),
        vec![Position(201), Position(202), Position(203), Position(213)]
    );
    assert_eq!(network.status_calls.load(Ordering::SeqCst), 2);
}
