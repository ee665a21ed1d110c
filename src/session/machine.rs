//! Session state machine
//!
//! Owns the lifecycle of one competitive session and runs its watch loop:
//! wait for participants, count down, run the match, collect results, repeat.
//!
//! The loop is a single spawned task. Every platform call goes through the
//! [`PlatformExecutor`], and every wait inside a cycle is raced against a
//! cancellation token so `force_quit` interrupts it immediately.

use crate::config::SessionConfig;
use crate::error::{is_disconnection, RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::session::driver::{ResultStream, SessionDriver};
use crate::session::platform::{PlatformExecutor, SessionPlatform};
use crate::session::results::normalize_results;
use crate::types::{
    JoinReference, RawResultBatch, SessionId, SessionState, LIVE_JOIN_REFERENCE,
};
use crate::utils::generate_session_id;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A match needs at least this many registered participants
pub const MIN_PARTICIPANTS: usize = 2;

type ResultSender = mpsc::Sender<Result<Option<RawResultBatch>>>;

/// Outcome of one step of the match-ready policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    Closed,
    Quit,
}

/// Outcome of one iteration of the watch loop
#[derive(Debug)]
enum Cycle {
    Played(RawResultBatch),
    NotEnoughPlayers,
    Quit,
}

struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State machine driving one session on a [`SessionPlatform`]
pub struct SessionStateMachine {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    config: SessionConfig,
    executor: PlatformExecutor,
    state: RwLock<SessionState>,
    join_reference: RwLock<Option<JoinReference>>,
    live: AtomicBool,
    quit_requested: AtomicBool,
    watch: Mutex<Option<WatchHandle>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SessionStateMachine {
    pub fn new(platform: Arc<dyn SessionPlatform>, config: SessionConfig) -> Self {
        let executor = PlatformExecutor::new(platform, config.driver_workers);

        Self {
            inner: Arc::new(SessionInner {
                id: generate_session_id(),
                config,
                executor,
                state: RwLock::new(SessionState::Stopped),
                join_reference: RwLock::new(None),
                live: AtomicBool::new(false),
                quit_requested: AtomicBool::new(false),
                watch: Mutex::new(None),
                metrics: None,
            }),
        }
    }

    /// Record state changes, notices and disconnections in the given collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.metrics = Some(metrics),
            None => warn!("Session already shared, metrics not attached"),
        }
        self
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether a watch loop is currently running
    pub async fn is_watching(&self) -> bool {
        self.inner
            .watch
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }
}

#[async_trait]
impl SessionDriver for SessionStateMachine {
    async fn create_game(&self, live: bool) -> Result<JoinReference> {
        let inner = &self.inner;

        let mut state = inner.state.write().await;
        if *state != SessionState::Stopped {
            return Err(RankingError::InvalidState {
                operation: "create_game".to_string(),
                state: *state,
            }
            .into());
        }

        let reference = inner
            .executor
            .run(move |platform| platform.create_session(live))
            .await?;
        let reference = if live {
            LIVE_JOIN_REFERENCE.to_string()
        } else {
            reference
        };

        inner.live.store(live, Ordering::SeqCst);
        *inner.join_reference.write().await = Some(reference.clone());
        *state = SessionState::Created;
        drop(state);
        inner.record_state(SessionState::Created);

        info!(session = %inner.id, live, "Session created, join at {}", reference);
        Ok(reference)
    }

    async fn get_state(&self) -> SessionState {
        *self.inner.state.read().await
    }

    async fn join_reference(&self) -> Option<JoinReference> {
        self.inner.join_reference.read().await.clone()
    }

    async fn watch_and_get_results(&self) -> Result<ResultStream> {
        let inner = &self.inner;

        let mut watch = inner.watch.lock().await;
        if watch
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
        {
            return Err(RankingError::AlreadyWatching.into());
        }

        let state = *inner.state.read().await;
        if !matches!(state, SessionState::Created | SessionState::Watching) {
            return Err(RankingError::InvalidState {
                operation: "watch_and_get_results".to_string(),
                state,
            }
            .into());
        }

        inner.quit_requested.store(false, Ordering::SeqCst);
        inner.set_state(SessionState::Watching).await;

        let (results, receiver) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let span = info_span!("session", id = %inner.id);
        let task = tokio::spawn(
            inner
                .clone()
                .run_watch_loop(results, cancel.clone())
                .instrument(span),
        );

        *watch = Some(WatchHandle { cancel, task });
        Ok(Box::pin(ReceiverStream::new(receiver)))
    }

    async fn quit(&self) {
        info!(session = %self.inner.id, "Quit requested, stopping after the current match");
        self.inner.quit_requested.store(true, Ordering::SeqCst);
    }

    async fn force_quit(&self) -> Result<()> {
        let inner = &self.inner;
        info!(session = %inner.id, "Force quitting session");

        let handle = inner.watch.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                if e.is_panic() {
                    error!("Watch loop panicked: {}", e);
                }
            }
        }

        inner.quit_requested.store(false, Ordering::SeqCst);
        let reset = inner.executor.run(|platform| platform.reset()).await;
        inner.join_reference.write().await.take();
        inner.set_state(SessionState::Stopped).await;

        reset
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        if let Ok(mut watch) = self.inner.watch.try_lock() {
            if let Some(handle) = watch.take() {
                handle.cancel.cancel();
            }
        }
    }
}

impl SessionInner {
    async fn run_watch_loop(self: Arc<Self>, results: ResultSender, cancel: CancellationToken) {
        info!("Watching for matches");
        let mut idle_cycles = 0u32;

        let outcome: Result<()> = loop {
            if self.quit_requested() {
                info!("Quit requested, leaving the watch loop");
                break Ok(());
            }

            let cycle = tokio::select! {
                _ = cancel.cancelled() => return,
                cycle = self.run_a_match() => cycle,
            };

            let item = match cycle {
                Ok(Cycle::Played(batch)) => {
                    idle_cycles = 0;
                    Some(batch)
                }
                Ok(Cycle::NotEnoughPlayers) => {
                    idle_cycles += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_idle_cycle();
                    }
                    None
                }
                Ok(Cycle::Quit) => {
                    info!("Quit requested, leaving the watch loop");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            let sent = tokio::select! {
                _ = cancel.cancelled() => return,
                sent = results.send(Ok(item)) => sent,
            };
            if sent.is_err() {
                info!("Result consumer went away, leaving the watch loop");
                break Ok(());
            }

            if self.config.max_idle_cycles > 0 && idle_cycles >= self.config.max_idle_cycles {
                info!("Stopping watching after {} idle cycles", idle_cycles);
                break self.notice("Stopping watching, not enough players.").await;
            }
        };

        self.finish_watch(outcome, &results, &cancel).await;
    }

    /// Reset the platform and report why the loop ended
    async fn finish_watch(
        &self,
        outcome: Result<()>,
        results: &ResultSender,
        cancel: &CancellationToken,
    ) {
        if let Err(e) = &outcome {
            if is_disconnection(e) {
                warn!("Lost connection to the session platform: {:#}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_disconnection();
                }
            } else {
                error!("Watch loop failed: {:#}", e);
            }
        }

        let reset = self.executor.run(|platform| platform.reset()).await;
        self.join_reference.write().await.take();
        self.set_state(SessionState::Stopped).await;

        let failure = match (outcome, reset) {
            (Err(e), Ok(())) => Some(e),
            (Err(e), Err(reset_error)) => {
                error!("Platform reset failed: {:#}", reset_error);
                Some(e)
            }
            (Ok(()), Err(reset_error)) => {
                error!("Platform reset failed: {:#}", reset_error);
                Some(reset_error)
            }
            (Ok(()), Ok(())) => None,
        };

        if let Some(e) = failure {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = results.send(Err(e)) => {}
            }
        }

        info!("Watch loop ended");
    }

    async fn run_a_match(&self) -> Result<Cycle> {
        // One participant deadline covers every wait and countdown of this cycle
        let deadline = Instant::now() + self.config.participant_timeout;

        let roster = loop {
            match self.wait_until_ready(deadline).await? {
                Gate::Open => {}
                Gate::Closed => return Ok(Cycle::NotEnoughPlayers),
                Gate::Quit => return Ok(Cycle::Quit),
            }

            let roster = self.executor.run(|platform| platform.start_match()).await?;
            if roster.len() >= MIN_PARTICIPANTS {
                break roster;
            }
            warn!(
                "Match started with {} registered participants, waiting again",
                roster.len()
            );
        };

        self.set_state(SessionState::Running).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_started();
        }
        info!("Match started with {} registered participants", roster.len());
        self.notice("Starting now!").await?;

        self.wait_for_match_end().await?;

        let reports = self
            .executor
            .run(|platform| platform.fetch_results())
            .await?;
        let batch = normalize_results(&roster, &reports);
        debug!("Match ended with {} results", batch.len());

        self.set_state(SessionState::Watching).await;
        Ok(Cycle::Played(batch))
    }

    /// Alternate participant waits and countdowns until one completes or `deadline` passes
    async fn wait_until_ready(&self, deadline: Instant) -> Result<Gate> {
        loop {
            if Instant::now() >= deadline {
                self.notice("Not enough registered players to start game.")
                    .await?;
                return Ok(Gate::Closed);
            }

            match self.wait_for_participants(deadline).await? {
                Gate::Open => {}
                Gate::Closed => continue,
                Gate::Quit => return Ok(Gate::Quit),
            }

            match self.countdown().await? {
                Gate::Closed => {
                    info!("Participants left during the countdown");
                    self.notice("Not enough players left, countdown aborted.")
                        .await?;
                }
                gate => return Ok(gate),
            }
        }
    }

    /// Wait in notice-sized increments until two participants are present
    async fn wait_for_participants(&self, deadline: Instant) -> Result<Gate> {
        self.check_connection().await?;
        if self.enough_participants().await? {
            return Ok(Gate::Open);
        }

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(Gate::Closed);
            }

            let remaining = deadline - now;
            self.notice(format!(
                "Will wait for up to {}s for at least two registered players to join.",
                remaining.as_secs()
            ))
            .await?;

            let increment_end = now + self.config.participant_notice_interval.min(remaining);
            while Instant::now() < increment_end {
                if self.quit_requested() {
                    return Ok(Gate::Quit);
                }

                sleep(self.config.participant_poll).await;
                self.check_connection().await?;
                if self.enough_participants().await? {
                    return Ok(Gate::Open);
                }
            }
        }
    }

    /// Count down to the match, re-checking participants on every tick
    async fn countdown(&self) -> Result<Gate> {
        let mut remaining = self.config.countdown;

        while !remaining.is_zero() {
            if self.quit_requested() {
                return Ok(Gate::Quit);
            }
            if !self.enough_participants().await? {
                return Ok(Gate::Closed);
            }

            self.notice(format!(
                "Starting next game in {} seconds...",
                remaining.as_secs()
            ))
            .await?;

            let step = if self.config.countdown_step.is_zero() {
                remaining
            } else {
                self.config.countdown_step.min(remaining)
            };
            sleep(step).await;
            self.check_connection().await?;
            remaining = remaining.saturating_sub(step);
        }

        if !self.enough_participants().await? {
            return Ok(Gate::Closed);
        }
        Ok(Gate::Open)
    }

    async fn wait_for_match_end(&self) -> Result<()> {
        loop {
            self.check_connection().await?;
            if self
                .executor
                .run(|platform| platform.has_match_ended())
                .await?
            {
                return Ok(());
            }
            sleep(self.config.match_poll).await;
        }
    }

    async fn enough_participants(&self) -> Result<bool> {
        let count = self
            .executor
            .run(|platform| platform.participant_count())
            .await?;
        Ok(count >= MIN_PARTICIPANTS)
    }

    async fn check_connection(&self) -> Result<()> {
        self.executor
            .run(|platform| platform.check_connection())
            .await
    }

    /// Post a chat notice; spectators of the live stream stay silent
    async fn notice(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let live = self.live.load(Ordering::SeqCst);
        if let Some(metrics) = &self.metrics {
            metrics.record_notice(!live);
        }

        if live {
            debug!("Suppressed notice in live mode: {}", text);
            return Ok(());
        }

        debug!("Notice: {}", text);
        self.executor
            .run(move |platform| platform.send_notice(&text))
            .await
    }

    fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!("Session state {} -> {}", *state, next);
        }
        *state = next;
        drop(state);
        self.record_state(next);
    }

    fn record_state(&self, state: SessionState) {
        if let Some(metrics) = &self.metrics {
            metrics.record_session_state(&self.id.to_string(), state);
        }
    }
}
