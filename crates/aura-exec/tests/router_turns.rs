use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use aura_core::actions::Action;
use aura_core::decision::DecisionPayload;
use aura_core::decision::RawDecision;
use aura_core::ids::SequentialIds;
use aura_core::mapper::Handoff;
use aura_core::mapper::ValidationError;
use aura_core::state::AppState;
use aura_core::state::Task;
use aura_core::state::ToolTab;
use aura_core::store::Store;
use aura_exec::ClassifierError;
use aura_exec::ContextSnapshot;
use aura_exec::IntentClassifier;
use aura_exec::NoticeKind;
use aura_exec::Router;
use aura_exec::RouterConfig;
use aura_exec::RouterEvent;
use aura_exec::RouterPhase;
use aura_exec::TurnFailure;
use aura_exec::TurnOutcome;
use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

type Scripted = Result<RawDecision, ClassifierError>;

/// Replays queued results; falls back to conversation once exhausted.
#[derive(Default)]
struct ScriptedClassifier {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _utterance: &str,
        _context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(decision("conversation", "chat", DecisionPayload::default())))
    }
}

/// Never answers.
struct HangingClassifier;

#[async_trait]
impl IntentClassifier for HangingClassifier {
    async fn classify(
        &self,
        _utterance: &str,
        _context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        std::future::pending().await
    }
}

/// Adds every utterance as a task and records how many calls overlap.
#[derive(Default)]
struct TrackingClassifier {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl IntentClassifier for TrackingClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(decision("tasks", "add", text_payload(utterance)))
    }
}

/// Ends the session while its answer is on the way back.
#[derive(Default)]
struct CancellingClassifier {
    token: OnceLock<CancellationToken>,
}

#[async_trait]
impl IntentClassifier for CancellingClassifier {
    async fn classify(
        &self,
        _utterance: &str,
        _context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        if let Some(token) = self.token.get() {
            token.cancel();
        }
        Ok(decision("tasks", "add", text_payload("too late")))
    }
}

/// Plays a UI edit while classification is suspended, then completes `t-1`.
#[derive(Default)]
struct UiEditClassifier {
    store: OnceLock<Arc<Store>>,
}

#[async_trait]
impl IntentClassifier for UiEditClassifier {
    async fn classify(
        &self,
        _utterance: &str,
        _context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        if let Some(store) = self.store.get() {
            store.dispatch(Action::DeleteTask("t-1".to_string()));
            store.dispatch(Action::AddTask(Task {
                id: "ui-1".to_string(),
                text: "ui task".to_string(),
                completed: false,
                created_at: Utc::now(),
            }));
        }
        Ok(decision(
            "tasks",
            "complete",
            DecisionPayload {
                id: Some("t-1".to_string()),
                ..DecisionPayload::default()
            },
        ))
    }
}

fn decision(agent: &str, action: &str, payload: DecisionPayload) -> RawDecision {
    RawDecision::new(agent, action, payload)
}

fn text_payload(text: &str) -> DecisionPayload {
    DecisionPayload {
        text: Some(text.to_string()),
        ..DecisionPayload::default()
    }
}

fn router_with(
    classifier: Arc<dyn IntentClassifier>,
    config: RouterConfig,
    initial: AppState,
) -> (Arc<Store>, Router) {
    let store = Arc::new(Store::new(initial));
    let router = Router::new(
        Arc::clone(&store),
        classifier,
        Arc::new(SequentialIds::new()),
        config,
    );
    (store, router)
}

fn router(classifier: Arc<dyn IntentClassifier>) -> (Arc<Store>, Router) {
    router_with(classifier, RouterConfig::default(), AppState::default())
}

fn drain(rx: &mut broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn notices(events: &[RouterEvent]) -> Vec<NoticeKind> {
    events
        .iter()
        .filter_map(|event| match event {
            RouterEvent::Notice(notice) => Some(notice.kind),
            _ => None,
        })
        .collect()
}

fn seeded_task(id: &str, text: &str) -> AppState {
    let mut state = AppState::default();
    state.tasks.push(Task {
        id: id.to_string(),
        text: text.to_string(),
        completed: false,
        created_at: Utc::now(),
    });
    state
}

#[tokio::test]
async fn reminder_adds_one_incomplete_task() {
    let classifier = ScriptedClassifier::new(vec![Ok(decision(
        "tasks",
        "add",
        text_payload("buy milk"),
    ))]);
    let (store, router) = router(classifier);
    let mut rx = router.subscribe();

    let outcome = router.run_turn("remind me to buy milk").await;

    assert!(matches!(outcome, TurnOutcome::Applied { ref actions } if actions.len() == 1));
    let state = store.get_state();
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.tasks[0].text, "buy milk");
    assert!(!state.tasks[0].completed);
    assert_eq!(state.tasks[0].id, "task-1");

    let phases: Vec<RouterPhase> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            RouterEvent::Phase(phase) => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            RouterPhase::Classifying,
            RouterPhase::Mapping,
            RouterPhase::Applying,
            RouterPhase::Idle,
        ]
    );
    assert_eq!(router.phase(), RouterPhase::Idle);
}

#[tokio::test]
async fn completion_without_id_leaves_state_unchanged() {
    let classifier = ScriptedClassifier::new(vec![Ok(decision(
        "tasks",
        "complete",
        DecisionPayload::default(),
    ))]);
    let (store, router) = router_with(
        classifier,
        RouterConfig::default(),
        seeded_task("t-1", "buy milk"),
    );
    let before = store.get_state();
    let mut rx = router.subscribe();

    let outcome = router.run_turn("mark that done").await;

    assert_eq!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Validation(ValidationError::MissingField {
            route: "complete",
            field: "id",
        }))
    );
    assert!(Arc::ptr_eq(&before, &store.get_state()));
    assert_eq!(notices(&drain(&mut rx)), vec![NoticeKind::Decision]);
    assert_eq!(router.phase(), RouterPhase::Idle);
}

#[tokio::test]
async fn lunch_event_spans_one_hour() {
    let classifier = ScriptedClassifier::new(vec![Ok(decision(
        "calendar",
        "add",
        DecisionPayload {
            title: Some("Lunch".to_string()),
            start: Some("2025-06-11T12:00:00Z".to_string()),
            end: Some("2025-06-11T13:00:00Z".to_string()),
            ..DecisionPayload::default()
        },
    ))]);
    let (store, router) = router(classifier);

    router
        .run_turn("schedule lunch tomorrow at noon for an hour")
        .await;

    let state = store.get_state();
    assert_eq!(state.calendar_events.len(), 1);
    let event = &state.calendar_events[0];
    assert_eq!(event.title, "Lunch");
    assert_eq!(event.end - event.start, chrono::Duration::hours(1));
}

#[tokio::test(start_paused = true)]
async fn classifier_timeout_fails_then_returns_to_idle() {
    let config = RouterConfig {
        timeout: Duration::from_secs(5),
        ..RouterConfig::default()
    };
    let (store, router) = router_with(Arc::new(HangingClassifier), config, AppState::default());
    let before = store.get_state();
    let mut rx = router.subscribe();

    let outcome = router.run_turn("what's on today").await;

    assert_eq!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Classifier(ClassifierError::Timeout(
            Duration::from_secs(5)
        )))
    );
    assert!(Arc::ptr_eq(&before, &store.get_state()));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], RouterEvent::Phase(RouterPhase::Classifying));
    assert_eq!(events[1], RouterEvent::Phase(RouterPhase::Failed));
    assert!(matches!(&events[2], RouterEvent::Notice(notice) if notice.kind == NoticeKind::Service));
    assert_eq!(events[3], RouterEvent::Phase(RouterPhase::Idle));
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_when_configured() {
    let classifier = ScriptedClassifier::new(vec![
        Err(ClassifierError::Transport("connection reset".to_string())),
        Ok(decision("tasks", "add", text_payload("buy milk"))),
    ]);
    let config = RouterConfig {
        max_retries: 1,
        retry_backoff: Duration::from_millis(10),
        ..RouterConfig::default()
    };
    let (store, router) = router_with(classifier.clone(), config, AppState::default());

    let outcome = router.run_turn("remind me to buy milk").await;

    assert!(matches!(outcome, TurnOutcome::Applied { .. }));
    assert_eq!(classifier.calls(), 2);
    assert_eq!(store.get_state().tasks.len(), 1);
}

#[tokio::test]
async fn retries_are_off_by_default_and_never_cover_bad_output() {
    let classifier = ScriptedClassifier::new(vec![
        Err(ClassifierError::Transport("connection reset".to_string())),
        Err(ClassifierError::MalformedResponse("not json".to_string())),
    ]);
    let config = RouterConfig {
        max_retries: 3,
        retry_backoff: Duration::ZERO,
        ..RouterConfig::default()
    };
    let (_store, default_router) = router(classifier.clone());
    default_router.run_turn("first").await;
    assert_eq!(classifier.calls(), 1);

    let (_store, retrying_router) = router_with(classifier.clone(), config, AppState::default());
    let outcome = retrying_router.run_turn("second").await;
    assert_eq!(classifier.calls(), 2);
    assert!(matches!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Classifier(ClassifierError::MalformedResponse(_)))
    ));
}

#[tokio::test]
async fn missing_credential_disables_routing_with_one_notice() {
    let missing = || {
        Err(ClassifierError::MissingCredential {
            checked: "GEMINI_API_KEY, API_KEY".to_string(),
        })
    };
    let classifier = ScriptedClassifier::new(vec![missing(), missing()]);
    let (store, router) = router(classifier.clone());
    let mut rx = router.subscribe();

    let first = router.run_turn("remind me to buy milk").await;
    let second = router.run_turn("remind me to buy bread").await;

    assert!(matches!(
        first,
        TurnOutcome::Failed(TurnFailure::Classifier(ClassifierError::MissingCredential { .. }))
    ));
    assert_eq!(second, TurnOutcome::Disabled);
    assert!(router.is_disabled());
    assert_eq!(classifier.calls(), 1);
    assert_eq!(notices(&drain(&mut rx)), vec![NoticeKind::Configuration]);
    assert!(store.get_state().tasks.is_empty());
}

#[tokio::test]
async fn handoffs_are_reported_without_touching_state() {
    let classifier = ScriptedClassifier::new(vec![
        Ok(decision("conversation", "chat", DecisionPayload::default())),
        Ok(decision("tasks", "list", DecisionPayload::default())),
        Ok(decision("search", "query", text_payload("rust tokio"))),
    ]);
    let (store, router) = router(classifier);
    let before = store.get_state();
    let mut rx = router.subscribe();

    let chat = router.run_turn("how are you?").await;
    let list = router.run_turn("show my tasks").await;
    let search = router.run_turn("search rust tokio").await;

    assert_eq!(
        chat,
        TurnOutcome::NoAction {
            handoff: Some(Handoff::Conversation)
        }
    );
    assert_eq!(
        list,
        TurnOutcome::NoAction {
            handoff: Some(Handoff::ShowTool(ToolTab::Tasks))
        }
    );
    assert_eq!(
        search,
        TurnOutcome::NoAction {
            handoff: Some(Handoff::Search {
                query: "rust tokio".to_string()
            })
        }
    );
    assert!(Arc::ptr_eq(&before, &store.get_state()));

    let handoffs = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, RouterEvent::Handoff(_)))
        .count();
    assert_eq!(handoffs, 3);
}

#[tokio::test]
async fn failed_turn_does_not_affect_the_next_one() {
    let classifier = ScriptedClassifier::new(vec![
        Ok(decision("notes", "update", text_payload("rename"))),
        Ok(decision("tasks", "add", text_payload("water plants"))),
    ]);
    let (store, router) = router(classifier);

    let first = router.run_turn("rename my note").await;
    let second = router.run_turn("remind me to water plants").await;

    assert!(matches!(
        first,
        TurnOutcome::Failed(TurnFailure::Validation(ValidationError::UnknownRoute { .. }))
    ));
    assert!(matches!(second, TurnOutcome::Applied { .. }));
    assert_eq!(store.get_state().tasks[0].text, "water plants");
}

#[tokio::test]
async fn blank_utterances_start_no_turn() {
    let classifier = ScriptedClassifier::new(Vec::new());
    let (_store, router) = router(classifier.clone());
    let mut rx = router.subscribe();

    assert_eq!(router.run_turn("   \n").await, TurnOutcome::Ignored);
    assert_eq!(classifier.calls(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn cancellation_after_classification_applies_nothing() {
    let classifier = Arc::new(CancellingClassifier::default());
    let (store, router) = router(classifier.clone());
    let _ = classifier.token.set(router.cancel_token());

    let outcome = router.run_turn("remind me to buy milk").await;

    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert!(store.get_state().tasks.is_empty());
    assert_eq!(router.phase(), RouterPhase::Idle);
    assert_eq!(router.run_turn("again").await, TurnOutcome::Cancelled);
}

#[tokio::test]
async fn ui_edits_during_classification_stay_visible() {
    let classifier = Arc::new(UiEditClassifier::default());
    let (store, router) = router_with(
        classifier.clone(),
        RouterConfig::default(),
        seeded_task("t-1", "buy milk"),
    );
    let _ = classifier.store.set(Arc::clone(&store));

    let outcome = router.run_turn("mark buy milk as done").await;

    assert_eq!(
        outcome,
        TurnOutcome::Applied {
            actions: vec![Action::ToggleTask("t-1".to_string())]
        }
    );
    let tasks: Vec<(String, bool)> = store
        .get_state()
        .tasks
        .iter()
        .map(|task| (task.id.clone(), task.completed))
        .collect();
    assert_eq!(tasks, vec![("ui-1".to_string(), false)]);
}

#[tokio::test]
async fn direct_turns_on_one_router_never_overlap() {
    let classifier = Arc::new(TrackingClassifier::default());
    let (store, router) = router(classifier.clone());

    let (first, second) = tokio::join!(router.run_turn("one"), router.run_turn("two"));

    assert!(matches!(first, TurnOutcome::Applied { .. }));
    assert!(matches!(second, TurnOutcome::Applied { .. }));
    assert_eq!(classifier.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_state().tasks.len(), 2);
    assert_eq!(router.phase(), RouterPhase::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_utterances_run_one_at_a_time_in_order() {
    let classifier = Arc::new(TrackingClassifier::default());
    let (store, router) = router(classifier.clone());
    let handle = router.spawn();

    for utterance in ["one", "two", "three", "  "] {
        assert!(handle.submit(utterance));
    }
    handle.finish().await;

    let texts: Vec<String> = store
        .get_state()
        .tasks
        .iter()
        .map(|task| task.text.clone())
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert_eq!(classifier.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_drops_the_turn_in_flight() {
    let (store, router) = router(Arc::new(HangingClassifier));
    let mut phase = router.watch_phase();
    let handle = router.spawn();

    assert!(handle.submit("remind me to buy milk"));
    phase
        .wait_for(|phase| *phase == RouterPhase::Classifying)
        .await
        .expect("router alive");
    handle.shutdown().await;

    assert_eq!(*phase.borrow(), RouterPhase::Idle);
    assert_eq!(*store.get_state(), AppState::default());
}
