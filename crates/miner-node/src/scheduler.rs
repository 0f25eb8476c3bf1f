//! The adaptive scheduler keeps one mining session proposing blocks.
//!
//! Each cycle reads the network difficulty, sizes a try-budget to it,
//! randomizes the budget and a short start delay, and hands the attempt to
//! the [`Backend`]. Cycles run back-to-back on a single task, so a session
//! never has more than one backend call outstanding.
//!
//! # Cancellation
//!
//! [`Scheduler::stop`] flips the session inactive and wakes a cycle that is
//! waiting out its delay, which then returns without calling the backend.
//! A backend call already in flight is left to finish (the backend owns its
//! resources); its result is counted, but no further cycle starts.
//!
//! # Randomization
//!
//! Independent miners pointed at the same backend tend to race for the same
//! height. Jittering both the budget and the start delay spreads them out,
//! and scaling the budget with difficulty keeps each attempt proportional to
//! the puzzle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::backend::{AddressProvider, Backend, ChainState, GenerateOutcome};
use crate::config::SchedulerConfig;
use crate::error::{AddressError, BackendError};
use crate::params::MiningParameters;
use crate::session::{MiningSession, SessionStats};
use crate::tracing::prelude::*;

/// Capacity of the observer channel; slow observers lose the oldest events.
const EVENT_CAPACITY: usize = 256;

/// Notification for observers (console, GUI, log file).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MinerEvent {
    /// The session became active.
    Started { address: String },
    /// A chain-state snapshot was fetched.
    ChainState(ChainState),
    /// A cycle finished (not emitted for cycles aborted by stop).
    Cycle(CycleReport),
    /// A block was found.
    BlockFound {
        round: u64,
        hash: String,
        address: String,
        blocks_found: u64,
    },
    /// The session became inactive.
    ///
    /// Totals are as of the stop. A backend call still in flight at that
    /// point is reported by its own `Cycle` event when it settles.
    Stopped {
        total_attempts: u64,
        blocks_found: u64,
    },
}

/// How a cycle's backend call ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    Found { hash: String },
    NotFound,
    BackendError { message: String },
}

/// Per-cycle report with the session totals after the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub round: u64,
    pub max_tries: u64,
    pub delay_ms: u64,
    pub difficulty: f64,
    pub outcome: CycleOutcome,
    pub total_attempts: u64,
    pub blocks_found: u64,
    pub hash_rate: f64,
}

/// What the cycle loop does after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Start the next cycle right away.
    Continue,
    /// The backend failed; pause before the next cycle.
    Backoff,
    /// The session was stopped.
    Halt,
}

/// Session state shared between the control methods and the cycle task.
struct Shared {
    session: MiningSession,
    cancel: CancellationToken,
}

/// The running cycle task; hands the random source back when it ends.
struct Runner {
    handle: JoinHandle<StdRng>,
}

struct Control {
    rng: Option<StdRng>,
    runner: Option<Runner>,
}

/// Drives one mining session against a backend.
pub struct Scheduler {
    backend: Arc<dyn Backend>,
    addresses: Option<Arc<dyn AddressProvider>>,
    config: SchedulerConfig,
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<MinerEvent>,
    control: tokio::sync::Mutex<Control>,
}

impl Scheduler {
    /// Create an idle scheduler.
    ///
    /// The random source is seeded from `config.seed`, or from entropy.
    pub fn new(backend: Arc<dyn Backend>, config: SchedulerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Scheduler {
            backend,
            addresses: None,
            config,
            shared: Arc::new(Mutex::new(Shared {
                session: MiningSession::new(),
                cancel: CancellationToken::new(),
            })),
            events,
            control: tokio::sync::Mutex::new(Control {
                rng: Some(rng),
                runner: None,
            }),
        }
    }

    /// Use `rng` as the session's random source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.control.get_mut().rng = Some(rng);
        self
    }

    /// Wallet used for per-cycle fresh addresses.
    pub fn with_address_provider(mut self, provider: Arc<dyn AddressProvider>) -> Self {
        self.addresses = Some(provider);
        self
    }

    /// Receive session events.
    pub fn subscribe(&self) -> broadcast::Receiver<MinerEvent> {
        self.events.subscribe()
    }

    /// Whether the session is mining.
    pub fn is_active(&self) -> bool {
        self.shared.lock().session.active
    }

    /// Consistent snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        self.shared.lock().session.snapshot()
    }

    /// Ask `provider` for an address, then [`start`](Self::start).
    ///
    /// Returns `Ok(false)` without consulting the provider if already
    /// active. An address failure leaves the session inactive.
    pub async fn start_from(&self, provider: &dyn AddressProvider) -> Result<bool, AddressError> {
        if self.is_active() {
            return Ok(false);
        }

        info!("Getting mining address from wallet");
        let address = provider.receiving_address().await.map_err(|e| {
            error!(error = %e, "Unable to get or create mining address");
            e
        })?;

        Ok(self.start(address).await)
    }

    /// Start mining to `address`.
    ///
    /// Returns `false` (and does nothing) if already active. Also returns
    /// `false` if [`stop`](Self::stop) lands while the initial chain state
    /// is being fetched; no cycle task is spawned then.
    pub async fn start(&self, address: impl Into<String>) -> bool {
        let address = address.into();
        let mut control = self.control.lock().await;

        if self.is_active() {
            return false;
        }

        // A previous run may still be finishing its last backend call.
        if let Some(runner) = control.runner.take() {
            match runner.handle.await {
                Ok(rng) => control.rng = Some(rng),
                Err(e) => warn!(error = %e, "Previous mining task ended abnormally"),
            }
        }

        let cancel = CancellationToken::new();
        {
            let mut shared = self.shared.lock();
            shared.session.begin(address.clone());
            shared.cancel = cancel.clone();
        }

        info!(address = %address, "Mining started");
        let _ = self.events.send(MinerEvent::Started {
            address: address.clone(),
        });

        let snapshot = match self.backend.chain_state().await {
            Ok(state) => {
                log_chain_state(&state);
                let _ = self.events.send(MinerEvent::ChainState(state.clone()));
                Some((Instant::now(), state))
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch chain state");
                None
            }
        };

        if cancel.is_cancelled() {
            debug!("Stopped before the first cycle");
            return false;
        }

        let rng = control
            .rng
            .take()
            .unwrap_or_else(StdRng::from_entropy);

        let cycles = CycleLoop {
            backend: self.backend.clone(),
            addresses: self.addresses.clone(),
            config: self.config.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
            cancel,
            rng,
            snapshot,
        };

        control.runner = Some(Runner {
            handle: tokio::spawn(cycles.run()),
        });

        true
    }

    /// Stop mining.
    ///
    /// Returns `false` if already inactive. Does not wait for an in-flight
    /// backend call; see [`shutdown`](Self::shutdown).
    pub fn stop(&self) -> bool {
        let (total_attempts, blocks_found) = {
            let mut shared = self.shared.lock();
            if !shared.session.active {
                return false;
            }
            shared.session.end();
            shared.cancel.cancel();
            (shared.session.total_attempts, shared.session.blocks_found)
        };

        info!(total_attempts, blocks_found, "Mining stopped");
        let _ = self.events.send(MinerEvent::Stopped {
            total_attempts,
            blocks_found,
        });
        true
    }

    /// Stop mining and wait for the cycle task to finish.
    pub async fn shutdown(&self) {
        self.stop();

        let mut control = self.control.lock().await;
        if let Some(runner) = control.runner.take() {
            match runner.handle.await {
                Ok(rng) => control.rng = Some(rng),
                Err(e) => warn!(error = %e, "Mining task ended abnormally"),
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.lock().cancel.cancel();
    }
}

/// The cycle state machine, owned by the session's task.
struct CycleLoop {
    backend: Arc<dyn Backend>,
    addresses: Option<Arc<dyn AddressProvider>>,
    config: SchedulerConfig,
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<MinerEvent>,
    cancel: CancellationToken,
    rng: StdRng,
    snapshot: Option<(Instant, ChainState)>,
}

impl CycleLoop {
    async fn run(mut self) -> StdRng {
        debug!("Cycle loop running");

        while self.is_active() {
            match self.cycle().await {
                Next::Continue => {}
                Next::Backoff => {
                    if !self.suspend(self.config.retry_delay()).await {
                        break;
                    }
                }
                Next::Halt => break,
            }
        }

        debug!("Cycle loop finished");
        self.rng
    }

    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && self.shared.lock().session.active
    }

    /// Sleep for `duration` unless stopped first. Returns whether the
    /// session is still active afterwards.
    async fn suspend(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => self.is_active(),
        }
    }

    /// One cycle: plan, wait, attempt, settle.
    async fn cycle(&mut self) -> Next {
        let started = Instant::now();
        let round = self.shared.lock().session.next_round();

        let difficulty = match self.difficulty().await {
            Ok(d) => d,
            Err(e) => {
                warn!(round, error = %e, "No difficulty available, retrying");
                self.report(round, None, CycleOutcome::BackendError {
                    message: e.to_string(),
                });
                return Next::Backoff;
            }
        };

        let params = MiningParameters::sample(difficulty, &self.config, &mut self.rng);
        debug!(
            round,
            max_tries = params.max_tries,
            delay_ms = params.delay.as_millis() as u64,
            difficulty,
            "Cycle planned"
        );

        if !self.suspend(params.delay).await {
            debug!(round, "Cycle aborted before attempt");
            return Next::Halt;
        }

        let address = self.address().await;
        if !self.is_active() {
            debug!(round, "Cycle aborted during address lookup");
            return Next::Halt;
        }

        let result = self.backend.generate_block(&address, params.max_tries).await;

        let (outcome, next) = match result {
            Ok(GenerateOutcome::Found { hash }) => {
                let blocks_found = {
                    let mut shared = self.shared.lock();
                    shared.session.record_found(params.max_tries, &hash);
                    shared.session.blocks_found
                };
                info!(round, hash = %hash, address = %address, blocks_found, "Block found");
                let _ = self.events.send(MinerEvent::BlockFound {
                    round,
                    hash: hash.clone(),
                    address: address.clone(),
                    blocks_found,
                });
                self.refresh_chain_state().await;
                (CycleOutcome::Found { hash }, Next::Continue)
            }
            Ok(GenerateOutcome::NotFound) => {
                self.shared.lock().session.record_not_found(params.max_tries);
                debug!(round, "Attempt completed without a block");
                (CycleOutcome::NotFound, Next::Continue)
            }
            Err(e) => {
                match &e {
                    BackendError::Unavailable(_) => warn!(round, error = %e, "Mining attempt failed"),
                    BackendError::MalformedResponse(_) => {
                        warn!(round, error = %e, "Ignoring malformed mining response")
                    }
                }
                (
                    CycleOutcome::BackendError {
                        message: e.to_string(),
                    },
                    Next::Backoff,
                )
            }
        };

        if next == Next::Continue {
            self.shared
                .lock()
                .session
                .record_rate(params.max_tries, started.elapsed());
        }

        self.report(round, Some(&params), outcome);
        next
    }

    /// Difficulty from a recent snapshot, refreshing when stale.
    async fn difficulty(&mut self) -> Result<f64, BackendError> {
        if let Some((at, state)) = &self.snapshot {
            if at.elapsed() < self.config.difficulty_refresh() {
                return Ok(state.difficulty);
            }
        }

        match self.backend.chain_state().await {
            Ok(state) => {
                let difficulty = state.difficulty;
                self.snapshot = Some((Instant::now(), state));
                Ok(difficulty)
            }
            Err(e) => match &self.snapshot {
                Some((_, stale)) => {
                    warn!(error = %e, "Chain state refresh failed, using last difficulty");
                    Ok(stale.difficulty)
                }
                None => Err(e),
            },
        }
    }

    async fn refresh_chain_state(&mut self) {
        match self.backend.chain_state().await {
            Ok(state) => {
                log_chain_state(&state);
                let _ = self.events.send(MinerEvent::ChainState(state.clone()));
                self.snapshot = Some((Instant::now(), state));
            }
            Err(e) => warn!(error = %e, "Could not refresh chain state"),
        }
    }

    /// Address for this attempt, optionally freshly issued.
    async fn address(&self) -> String {
        if self.config.fresh_address_per_cycle {
            if let Some(provider) = &self.addresses {
                match provider.receiving_address().await {
                    Ok(address) => {
                        debug!(address = %address, "Using fresh mining address");
                        self.shared.lock().session.address = Some(address);
                    }
                    Err(e) => warn!(error = %e, "Fresh address unavailable, keeping previous"),
                }
            }
        }

        self.shared
            .lock()
            .session
            .address
            .clone()
            .unwrap_or_default()
    }

    fn report(&self, round: u64, params: Option<&MiningParameters>, outcome: CycleOutcome) {
        let stats = self.shared.lock().session.snapshot();
        let report = CycleReport {
            round,
            max_tries: params.map_or(0, |p| p.max_tries),
            delay_ms: params.map_or(0, |p| p.delay.as_millis() as u64),
            difficulty: params.map_or(0.0, |p| p.difficulty),
            outcome,
            total_attempts: stats.total_attempts,
            blocks_found: stats.blocks_found,
            hash_rate: stats.hash_rate,
        };
        let _ = self.events.send(MinerEvent::Cycle(report));
    }
}

fn log_chain_state(state: &ChainState) {
    info!(
        height = state.height,
        difficulty = state.difficulty,
        best_block = %state.best_block_hash,
        "Chain state"
    );
}
