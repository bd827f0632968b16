use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use aura_core::actions::Action;
use aura_core::config::RouterSettings;
use aura_core::decision::RawDecision;
use aura_core::ids::IdGenerator;
use aura_core::mapper::handoff_for;
use aura_core::mapper::map_decision;
use aura_core::mapper::Handoff;
use aura_core::mapper::MapContext;
use aura_core::mapper::ValidationError;
use aura_core::store::Store;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::contracts::ClassifierError;
use crate::contracts::ContextSnapshot;
use crate::contracts::IntentClassifier;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterPhase {
    Idle,
    Classifying,
    Mapping,
    Applying,
    Failed,
}

impl RouterPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Mapping => "mapping",
            Self::Applying => "applying",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Upper bound for a single classification attempt.
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&RouterSettings::default())
    }
}

impl From<&RouterSettings> for RouterConfig {
    fn from(settings: &RouterSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Routing is disabled until the credential is configured.
    Configuration,
    Service,
    Decision,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterNotice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    Phase(RouterPhase),
    Notice(RouterNotice),
    Handoff(Handoff),
    Applied { actions: Vec<Action> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnFailure {
    Classifier(ClassifierError),
    Validation(ValidationError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Applied { actions: Vec<Action> },
    NoAction { handoff: Option<Handoff> },
    Failed(TurnFailure),
    Cancelled,
    /// Routing was switched off by an earlier configuration failure.
    Disabled,
    /// Blank utterance; no turn was started.
    Ignored,
}

enum MapAbort {
    Cancelled,
    Invalid(ValidationError),
}

/// Drives one utterance at a time through classify, map and apply.
pub struct Router {
    store: Arc<Store>,
    classifier: Arc<dyn IntentClassifier>,
    ids: Arc<dyn IdGenerator>,
    config: RouterConfig,
    events: broadcast::Sender<RouterEvent>,
    phase: watch::Sender<RouterPhase>,
    disabled: AtomicBool,
    cancel: CancellationToken,
    /// Held for a whole turn; later callers queue behind it.
    turn: Mutex<()>,
}

impl Router {
    pub fn new(
        store: Arc<Store>,
        classifier: Arc<dyn IntentClassifier>,
        ids: Arc<dyn IdGenerator>,
        config: RouterConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (phase, _) = watch::channel(RouterPhase::Idle);
        Self {
            store,
            classifier,
            ids,
            config,
            events,
            phase,
            disabled: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            turn: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> RouterPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<RouterPhase> {
        self.phase.subscribe()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// Cancelling this token ends the session: in-flight work is dropped.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run_turn(&self, utterance: &str) -> TurnOutcome {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return TurnOutcome::Ignored;
        }
        let _turn = self.turn.lock().await;
        if self.is_disabled() {
            debug!("routing disabled; skipping utterance");
            return TurnOutcome::Disabled;
        }
        if self.cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }

        let context = ContextSnapshot::from_state(&self.store.get_state());
        self.set_phase(RouterPhase::Classifying);

        let classified = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("turn cancelled during classification");
                self.set_phase(RouterPhase::Idle);
                return TurnOutcome::Cancelled;
            }
            result = self.classify_with_retry(utterance, &context) => result,
        };
        let decision = match classified {
            Ok(decision) => decision,
            Err(err) => return self.fail_classification(err),
        };
        debug!(agent = %decision.agent, action = %decision.action, "classified utterance");

        self.set_phase(RouterPhase::Mapping);
        self.apply_decision(&decision)
    }

    async fn classify_with_retry(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(
                self.config.timeout,
                self.classifier.classify(utterance, context),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::Timeout(self.config.timeout)),
            };
            match result {
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, "classification failed, retrying: {err}");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    fn apply_decision(&self, decision: &RawDecision) -> TurnOutcome {
        let handoff = handoff_for(decision);
        let applied = self.store.apply_with(|state| {
            // Checked under the store lock so a cancelled turn never applies.
            if self.cancel.is_cancelled() {
                return Err(MapAbort::Cancelled);
            }
            let ctx = MapContext::new(self.ids.as_ref());
            let actions = map_decision(decision, state, &ctx).map_err(MapAbort::Invalid)?;
            if !actions.is_empty() {
                self.set_phase(RouterPhase::Applying);
            }
            Ok(actions)
        });

        match applied {
            Ok(actions) if actions.is_empty() => {
                self.set_phase(RouterPhase::Idle);
                if let Some(handoff) = &handoff {
                    self.emit(RouterEvent::Handoff(handoff.clone()));
                }
                TurnOutcome::NoAction { handoff }
            }
            Ok(actions) => {
                let labels: Vec<&str> = actions.iter().map(Action::label).collect();
                info!(actions = ?labels, "applied turn");
                self.emit(RouterEvent::Applied {
                    actions: actions.clone(),
                });
                self.set_phase(RouterPhase::Idle);
                TurnOutcome::Applied { actions }
            }
            Err(MapAbort::Cancelled) => {
                debug!("turn cancelled before apply");
                self.set_phase(RouterPhase::Idle);
                TurnOutcome::Cancelled
            }
            Err(MapAbort::Invalid(err)) => {
                let kind = if err.is_internal() {
                    error!(agent = %decision.agent, action = %decision.action, "{err}");
                    NoticeKind::Internal
                } else {
                    warn!(agent = %decision.agent, action = %decision.action, "rejected decision: {err}");
                    NoticeKind::Decision
                };
                self.fail(kind, format!("I couldn't do that: {err}"));
                TurnOutcome::Failed(TurnFailure::Validation(err))
            }
        }
    }

    fn fail_classification(&self, err: ClassifierError) -> TurnOutcome {
        if err.is_configuration() {
            if !self.disabled.swap(true, Ordering::SeqCst) {
                error!("intent routing disabled: {err}");
                self.fail(
                    NoticeKind::Configuration,
                    format!("Voice commands are unavailable: {err}"),
                );
            } else {
                self.set_phase(RouterPhase::Idle);
            }
        } else {
            warn!("classification failed: {err}");
            self.fail(
                NoticeKind::Service,
                "I couldn't process that request. Please try again.".to_string(),
            );
        }
        TurnOutcome::Failed(TurnFailure::Classifier(err))
    }

    fn fail(&self, kind: NoticeKind, message: String) {
        self.set_phase(RouterPhase::Failed);
        self.emit(RouterEvent::Notice(RouterNotice { kind, message }));
        self.set_phase(RouterPhase::Idle);
    }

    fn set_phase(&self, phase: RouterPhase) {
        let changed = self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
        if changed {
            debug!(phase = phase.label(), "router phase");
            self.emit(RouterEvent::Phase(phase));
        }
    }

    fn emit(&self, event: RouterEvent) {
        let _ = self.events.send(event);
    }

    /// Moves the router onto a worker task that serves queued utterances in order.
    pub fn spawn(self) -> RouterHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let router = Arc::new(self);
        let worker = Arc::clone(&router);
        let cancel = router.cancel.clone();

        let join = tokio::spawn(async move {
            loop {
                let utterance = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(utterance) => utterance,
                        None => break,
                    },
                };
                worker.run_turn(&utterance).await;
            }
            debug!("router worker stopped");
        });

        RouterHandle { tx, router, join }
    }
}

pub struct RouterHandle {
    tx: mpsc::UnboundedSender<String>,
    router: Arc<Router>,
    join: JoinHandle<()>,
}

impl RouterHandle {
    /// Queues an utterance behind any turn in flight. Returns false once the
    /// worker has stopped.
    pub fn submit(&self, utterance: impl Into<String>) -> bool {
        let utterance = utterance.into();
        if utterance.trim().is_empty() {
            return true;
        }
        self.tx.send(utterance).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.router.subscribe()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serves every queued utterance, then stops the worker.
    pub async fn finish(self) {
        drop(self.tx);
        let _ = self.join.await;
    }

    /// Stops immediately; a turn in flight is dropped without applying.
    pub async fn shutdown(self) {
        self.router.cancel.cancel();
        let _ = self.join.await;
    }
}
