use aura_core::actions::Action;
use aura_core::mapper::Handoff;
use aura_core::state::AppState;
use aura_core::state::ToolTab;
use aura_exec::NoticeKind;
use aura_exec::RouterEvent;
use aura_exec::TurnOutcome;

/// One-line rendering of a router event, or `None` for events not worth printing.
pub fn event_line(event: &RouterEvent) -> Option<String> {
    match event {
        RouterEvent::Phase(_) => None,
        RouterEvent::Notice(notice) => {
            let tag = match notice.kind {
                NoticeKind::Configuration => "config",
                NoticeKind::Service => "error",
                NoticeKind::Decision => "skipped",
                NoticeKind::Internal => "bug",
            };
            Some(format!("[{tag}] {}", notice.message))
        }
        RouterEvent::Handoff(handoff) => Some(handoff_line(handoff)),
        RouterEvent::Applied { actions } => Some(format!("✓ {}", describe_actions(actions))),
    }
}

pub fn handoff_line(handoff: &Handoff) -> String {
    match handoff {
        Handoff::Conversation => "→ conversation".to_string(),
        Handoff::Search { query } => format!("→ search: {query}"),
        Handoff::ShowTool(tab) => format!("→ show {}", tab.label()),
    }
}

/// Outcomes the event stream does not already report.
pub fn outcome_line(outcome: &TurnOutcome) -> Option<String> {
    let line = match outcome {
        TurnOutcome::NoAction { handoff: None } => "nothing to do",
        TurnOutcome::Cancelled => "cancelled",
        TurnOutcome::Disabled => "routing disabled",
        TurnOutcome::Ignored => "empty utterance",
        TurnOutcome::Applied { .. }
        | TurnOutcome::NoAction { handoff: Some(_) }
        | TurnOutcome::Failed(_) => return None,
    };
    Some(line.to_string())
}

fn describe_actions(actions: &[Action]) -> String {
    actions
        .iter()
        .map(describe_action)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_action(action: &Action) -> String {
    match action {
        Action::AddTask(task) => format!("task added: {}", task.text),
        Action::ToggleTask(id) => format!("task toggled: {id}"),
        Action::DeleteTask(id) => format!("task deleted: {id}"),
        Action::AddNote(note) => format!("note added: {}", note.title),
        Action::AddEvent(event) => format!(
            "event added: {} ({} - {})",
            event.title,
            event.start.format("%Y-%m-%d %H:%M"),
            event.end.format("%H:%M")
        ),
        Action::UpdateMemory(_) => "memory updated".to_string(),
        other => other.label().to_string(),
    }
}

pub fn render_tool(state: &AppState, tab: ToolTab) -> Vec<String> {
    match tab {
        ToolTab::Tasks => render_tasks(state),
        ToolTab::Notes => state
            .notes
            .iter()
            .map(|note| format!("  {}  {}: {}", note.id, note.title, note.content))
            .collect(),
        ToolTab::Calendar => state
            .calendar_events
            .iter()
            .map(|event| {
                format!(
                    "  {}  {} {} - {}",
                    event.id,
                    event.title,
                    event.start.format("%Y-%m-%d %H:%M"),
                    event.end.format("%H:%M")
                )
            })
            .collect(),
    }
}

fn render_tasks(state: &AppState) -> Vec<String> {
    state
        .tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { "x" } else { " " };
            format!("  [{mark}] {}  {}", task.id, task.text)
        })
        .collect()
}

pub fn render_summary(state: &AppState) -> Vec<String> {
    let mut lines = Vec::new();
    let name = if state.memory.profile.name.is_empty() {
        "(unknown)"
    } else {
        state.memory.profile.name.as_str()
    };
    lines.push(format!("user: {name}"));
    lines.push(format!(
        "tasks: {} ({} open)",
        state.tasks.len(),
        state.open_task_count()
    ));
    lines.extend(render_tasks(state));
    lines.push(format!("notes: {}", state.notes.len()));
    lines.push(format!("events: {}", state.calendar_events.len()));
    lines.push(format!(
        "voice: {} at {:.1}x, theme: {}",
        state.settings.voice,
        state.settings.voice_speed,
        state.settings.theme.label()
    ));
    lines
}
