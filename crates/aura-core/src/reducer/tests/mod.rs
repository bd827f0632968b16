use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;

pub(super) use super::reduce;
pub(super) use super::reduce_in_place;
pub(super) use crate::actions::Action;
pub(super) use crate::state::AppState;
pub(super) use crate::state::CalendarEvent;
pub(super) use crate::state::MemoryPatch;
pub(super) use crate::state::MemoryTheme;
pub(super) use crate::state::Note;
pub(super) use crate::state::Panel;
pub(super) use crate::state::Preferences;
pub(super) use crate::state::Profile;
pub(super) use crate::state::Project;
pub(super) use crate::state::SettingsPatch;
pub(super) use crate::state::SettingsTheme;
pub(super) use crate::state::Task;
pub(super) use crate::state::ToolTab;


fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn task(id: &str, text: &str) -> Task {
    Task {
        id: id.to_string(),
        text: text.to_string(),
        completed: false,
        created_at: at(8),
    }
}

fn note(id: &str, title: &str, content: &str) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        tags: Vec::new(),
        created_at: at(9),
    }
}

fn event(id: &str, title: &str, start: u32, end: u32) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        title: title.to_string(),
        start: at(start),
        end: at(end),
    }
}

fn seeded() -> AppState {
    let mut state = AppState::default();
    state.tasks = vec![task("t-1", "buy milk"), task("t-2", "call mom")];
    state.notes = vec![note("n-1", "Ideas", "rust rewrite")];
    state.calendar_events = vec![event("e-1", "standup", 9, 10)];
    state.memory.profile = Profile {
        name: "Sam".to_string(),
        interests: vec!["chess".to_string()],
    };
    state
}

fn run(state: &mut AppState, action: Action) {
    *state = reduce(state, action);
}
