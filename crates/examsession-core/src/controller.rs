//! Session controller.
//!
//! One spawned task owns the [`SessionState`]. User actions arrive over a
//! command channel, countdown ticks over a tick channel, and the in-flight
//! submission is polled by the same task, so the state is never touched by
//! two actors at once and needs no lock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, OptionFuture};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::countdown::Countdown;
use crate::error::{ActionError, LoadError, SubmissionError};
use crate::loader::QuestionLoader;
use crate::model::{Direction, FinishTrigger, Subject, SubmissionResult};
use crate::outcome::{ExamOutcome, OutcomeTotals};
use crate::session::{Lifecycle, SessionSnapshot, SessionState, Step};
use crate::submission::{SubmissionConfig, SubmissionCoordinator};
use crate::traits::{
    ContentService, DiscardHandoff, NoopObserver, ResultsHandoff, ScoringService,
    SessionObserver,
};

/// Default exam length: three hours.
pub const DEFAULT_DURATION_SECS: u64 = 180 * 60;

/// Configuration accepted at session start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The acting user; stamped on every result.
    pub user_id: String,
    /// Number of countdown units.
    pub duration_secs: u64,
    /// Wall-clock length of one countdown unit.
    pub tick: Duration,
    pub submission: SubmissionConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            duration_secs: DEFAULT_DURATION_SECS,
            tick: Duration::from_secs(1),
            submission: SubmissionConfig::default(),
        }
    }
}

/// Builds and starts sessions.
pub struct SessionEngine {
    content: Arc<dyn ContentService>,
    scoring: Arc<dyn ScoringService>,
    handoff: Arc<dyn ResultsHandoff>,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
}

impl SessionEngine {
    pub fn new(
        content: Arc<dyn ContentService>,
        scoring: Arc<dyn ScoringService>,
        config: SessionConfig,
    ) -> Self {
        Self {
            content,
            scoring,
            handoff: Arc::new(DiscardHandoff),
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn ResultsHandoff>) -> Self {
        self.handoff = handoff;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Load the question sets and enter the active state.
    ///
    /// On a load error no session task is spawned. A zero `tick` is
    /// rejected before anything is fetched.
    pub async fn start(&self, subjects: Vec<Subject>) -> Result<RunningSession, LoadError> {
        if self.config.tick.is_zero() {
            return Err(LoadError::ZeroTick);
        }
        self.observer.on_lifecycle(Lifecycle::Loading);

        let loader = QuestionLoader::new(Arc::clone(&self.content));
        let loaded = match loader.load(&subjects).await {
            Ok(questions) => SessionState::new(subjects, questions, self.config.duration_secs),
            Err(e) => Err(e),
        };
        let state = match loaded {
            Ok(state) => state,
            Err(e) => {
                self.observer.on_lifecycle(Lifecycle::Failed);
                return Err(e);
            }
        };

        let session_id = Uuid::new_v4();
        tracing::info!(
            %session_id,
            user = %self.config.user_id,
            subjects = state.subjects().len(),
            questions = state.progress().total,
            "session active"
        );

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = watch::channel(Lifecycle::Active);
        self.observer.on_lifecycle(Lifecycle::Active);

        let controller = SessionController {
            state,
            coordinator: SubmissionCoordinator::new(
                Arc::clone(&self.scoring),
                self.config.submission.clone(),
            ),
            handoff: Arc::clone(&self.handoff),
            observer: Arc::clone(&self.observer),
            user_id: self.config.user_id.clone(),
            tick: self.config.tick,
            session_id,
            started_at: Utc::now(),
            commands: command_rx,
            tick_tx,
            ticks: tick_rx,
            countdown: None,
            generation: 0,
            in_flight: None,
            last_error: None,
            outcome: None,
            lifecycle: lifecycle_tx,
        };

        Ok(RunningSession {
            handle: SessionHandle {
                session_id,
                commands: command_tx,
                lifecycle: lifecycle_rx,
            },
            task: tokio::spawn(controller.run()),
        })
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// All subjects were graded and handed off.
    Completed(Box<ExamOutcome>),
    /// The session can no longer make progress.
    Failed { last_error: Option<SubmissionError> },
}

/// A spawned session: a handle for driving it and its controller task.
pub struct RunningSession {
    handle: SessionHandle,
    task: JoinHandle<SessionEnd>,
}

impl RunningSession {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Wait for the controller to reach a terminal state.
    ///
    /// Dropping every handle first means no one can retry a failed
    /// submission; the session then ends as soon as nothing is pending.
    pub async fn finished(self) -> anyhow::Result<SessionEnd> {
        drop(self.handle);
        self.task.await.context("session controller task failed")
    }

    /// Stop the session without submitting anything.
    pub fn abandon(self) {
        tracing::warn!(session_id = %self.handle.session_id, "session abandoned");
        self.task.abort();
    }
}

/// Cloneable handle for sending user actions to a session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    lifecycle: watch::Receiver<Lifecycle>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn answer(&self, option_id: &str) -> Result<Step, ActionError> {
        let option_id = option_id.to_string();
        self.request(|reply| Command::Answer { option_id, reply })
            .await?
    }

    pub async fn navigate(&self, direction: Direction) -> Result<Step, ActionError> {
        self.request(|reply| Command::Navigate { direction, reply })
            .await
    }

    pub async fn jump(&self, subject: usize, question: usize) -> Result<Step, ActionError> {
        self.request(|reply| Command::Jump {
            subject,
            question,
            reply,
        })
        .await?
    }

    /// Finish now, or retry after a failed submission.
    pub async fn finish(&self) -> Result<Step, ActionError> {
        self.request(|reply| Command::Finish { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ActionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Last published lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Wait until the session publishes a state matching `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&Lifecycle) -> bool,
    ) -> Result<Lifecycle, ActionError> {
        let mut rx = self.lifecycle.clone();
        let state = rx
            .wait_for(pred)
            .await
            .map_err(|_| ActionError::SessionClosed)?;
        Ok(*state)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ActionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ActionError::SessionClosed)?;
        rx.await.map_err(|_| ActionError::SessionClosed)
    }
}

enum Command {
    Answer {
        option_id: String,
        reply: oneshot::Sender<Result<Step, ActionError>>,
    },
    Navigate {
        direction: Direction,
        reply: oneshot::Sender<Step>,
    },
    Jump {
        subject: usize,
        question: usize,
        reply: oneshot::Sender<Result<Step, ActionError>>,
    },
    Finish {
        reply: oneshot::Sender<Step>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

type Submission = BoxFuture<'static, Result<Vec<SubmissionResult>, SubmissionError>>;

struct SessionController {
    state: SessionState,
    coordinator: SubmissionCoordinator,
    handoff: Arc<dyn ResultsHandoff>,
    observer: Arc<dyn SessionObserver>,
    user_id: String,
    tick: Duration,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    commands: mpsc::UnboundedReceiver<Command>,
    tick_tx: mpsc::UnboundedSender<u64>,
    ticks: mpsc::UnboundedReceiver<u64>,
    countdown: Option<Countdown>,
    generation: u64,
    in_flight: Option<Submission>,
    last_error: Option<SubmissionError>,
    outcome: Option<ExamOutcome>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl SessionController {
    async fn run(mut self) -> SessionEnd {
        if self.state.remaining_secs() == 0 {
            let step = self.state.time_up();
            self.apply(step);
        } else {
            self.start_countdown();
        }

        let mut commands_open = true;
        while !self.state.lifecycle().is_terminal() {
            if !commands_open && self.in_flight.is_none() && self.countdown.is_none() {
                tracing::warn!(session_id = %self.session_id, "no handles left; giving up");
                self.state.fail();
                self.publish();
                break;
            }

            tokio::select! {
                Some(result) = OptionFuture::from(self.in_flight.as_mut()) => {
                    self.in_flight = None;
                    self.on_submission(result).await;
                }
                Some(generation) = self.ticks.recv() => self.on_tick(generation),
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.on_command(command),
                    None => commands_open = false,
                },
            }
        }

        self.stop_countdown();
        match self.outcome.take() {
            Some(outcome) => SessionEnd::Completed(Box::new(outcome)),
            None => SessionEnd::Failed {
                last_error: self.last_error.take(),
            },
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Answer { option_id, reply } => {
                let result = self.state.answer(&option_id);
                if let Ok(Step::Ignored) = result {
                    tracing::warn!("answer ignored while {:?}", self.state.lifecycle());
                }
                let _ = reply.send(result);
            }
            Command::Navigate { direction, reply } => {
                let step = self.state.navigate(direction);
                self.apply(step);
                let _ = reply.send(step);
            }
            Command::Jump {
                subject,
                question,
                reply,
            } => {
                let result = self.state.jump(subject, question);
                let _ = reply.send(result);
            }
            Command::Finish { reply } => {
                let step = self.state.finish();
                self.apply(step);
                let _ = reply.send(step);
            }
            Command::Snapshot { reply } => {
                let mut snapshot = self.state.snapshot();
                snapshot.last_error = self.last_error.as_ref().map(SubmissionError::reason);
                let _ = reply.send(snapshot);
            }
        }
    }

    fn on_tick(&mut self, generation: u64) {
        let live = self
            .countdown
            .as_ref()
            .is_some_and(|c| c.generation() == generation && !c.is_cancelled());
        if !live {
            tracing::debug!(generation, "stale tick dropped");
            return;
        }
        let step = self.state.tick();
        self.observer.on_tick(self.state.remaining_secs());
        self.apply(step);
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Finish(trigger) => self.begin_submission(trigger),
            Step::Ignored => {
                tracing::warn!("event ignored while {:?}", self.state.lifecycle());
            }
            Step::Updated => {}
        }
    }

    fn begin_submission(&mut self, trigger: FinishTrigger) {
        self.stop_countdown();
        self.last_error = None;
        self.publish();
        tracing::info!(session_id = %self.session_id, %trigger, "finishing");

        let requests = match self.state.submission_plan() {
            Ok(requests) => requests,
            Err(e) => {
                tracing::error!("session state is invalid, cannot submit: {e}");
                self.last_error = Some(SubmissionError::Invalid(e));
                self.state.fail();
                self.publish();
                return;
            }
        };

        let coordinator = self.coordinator.clone();
        let user_id = self.user_id.clone();
        self.in_flight = Some(Box::pin(async move {
            coordinator.submit_all(requests, &user_id).await
        }));
    }

    async fn on_submission(&mut self, result: Result<Vec<SubmissionResult>, SubmissionError>) {
        match result {
            Ok(results) => {
                self.state.complete();
                let outcome = self.build_outcome(results);
                tracing::info!(
                    session_id = %self.session_id,
                    score = outcome.totals.score,
                    max_score = outcome.totals.max_score,
                    "session completed"
                );
                self.deliver(&outcome).await;
                self.outcome = Some(outcome);
                self.publish();
            }
            Err(e) => {
                tracing::error!(session_id = %self.session_id, "submission failed: {e}");
                self.observer.on_submission_error(&e);
                self.last_error = Some(e);
                self.state.submission_failed();
                self.publish();
                // Time that already ran out stays out; retry is manual only.
                if self.state.remaining_secs() > 0 {
                    self.start_countdown();
                }
            }
        }
    }

    /// Hand the outcome over on the blocking pool; failures are only logged.
    fn deliver(&self, outcome: &ExamOutcome) -> impl std::future::Future<Output = ()> + Send + 'static {
        let handoff = Arc::clone(&self.handoff);
        let outcome = outcome.clone();
        async move {
            match tokio::task::spawn_blocking(move || handoff.deliver(&outcome)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("results handoff failed: {e:#}"),
                Err(e) => tracing::error!("results handoff task failed: {e}"),
            }
        }
    }

    fn build_outcome(&self, results: Vec<SubmissionResult>) -> ExamOutcome {
        ExamOutcome {
            session_id: self.session_id,
            user_id: self.user_id.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            trigger: self.state.finish_trigger().unwrap_or(FinishTrigger::Manual),
            totals: OutcomeTotals::from_results(&results),
            results,
            subjects: self.state.subjects().to_vec(),
            questions: self.state.questions().clone(),
            answers: self.state.answers().clone(),
        }
    }

    fn start_countdown(&mut self) {
        self.generation += 1;
        self.countdown = Some(Countdown::start(
            self.tick,
            self.generation,
            self.tick_tx.clone(),
        ));
    }

    fn stop_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }

    fn publish(&self) {
        let lifecycle = self.state.lifecycle();
        self.lifecycle.send_replace(lifecycle);
        self.observer.on_lifecycle(lifecycle);
    }
}
