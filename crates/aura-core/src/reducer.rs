use tracing::error;
use tracing::warn;

use super::actions::Action;
use super::state::canonical_voice;
use super::state::clamp_to;
use super::state::AppState;
use super::state::CalendarEvent;
use super::state::MemoryPatch;
use super::state::Note;
use super::state::SettingsPatch;
use super::state::Task;
use super::state::VOICE_PITCH_RANGE;
use super::state::VOICE_SPEED_RANGE;

/// Pure transition: returns the next snapshot and leaves `state` untouched.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    reduce_in_place(&mut next, action);
    next
}

/// Applies `action` to an owned working copy. Used by the store to fold a
/// batch of actions into one snapshot without cloning between steps.
pub fn reduce_in_place(state: &mut AppState, action: Action) {
    match action {
        Action::AddTask(task) => add_task(state, task),
        Action::ToggleTask(id) => {
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                task.completed = !task.completed;
            }
        }
        Action::DeleteTask(id) => state.tasks.retain(|task| task.id != id),
        Action::AddNote(note) => add_note(state, note),
        Action::UpdateNote(note) => {
            if let Some(existing) = state.notes.iter_mut().find(|n| n.id == note.id) {
                *existing = note;
            }
        }
        Action::DeleteNote(id) => state.notes.retain(|note| note.id != id),
        Action::AddEvent(event) => add_event(state, event),
        Action::UpdateMemory(patch) => merge_memory(state, patch),
        Action::UpdateSettings(patch) => merge_settings(state, patch),
        Action::SetActivePanel(panel) => state.active_panel = panel,
        Action::SetActiveToolTab(tab) => state.active_tool_tab = tab,
        Action::LoadState(snapshot) => *state = *snapshot,
    }
}

fn add_task(state: &mut AppState, task: Task) {
    if state.contains_id(&task.id) {
        error!(id = %task.id, "refusing to add task with an identifier already in use");
        return;
    }
    state.tasks.push(task);
}

fn add_note(state: &mut AppState, note: Note) {
    if state.contains_id(&note.id) {
        error!(id = %note.id, "refusing to add note with an identifier already in use");
        return;
    }
    state.notes.push(note);
}

fn add_event(state: &mut AppState, event: CalendarEvent) {
    if state.contains_id(&event.id) {
        error!(id = %event.id, "refusing to add event with an identifier already in use");
        return;
    }
    state.calendar_events.push(event);
}

fn merge_memory(state: &mut AppState, patch: MemoryPatch) {
    let memory = &mut state.memory;
    if let Some(profile) = patch.profile {
        memory.profile = profile;
    }
    if let Some(preferences) = patch.preferences {
        memory.preferences = preferences;
    }
    if let Some(projects) = patch.projects {
        memory.projects = projects;
    }
    if let Some(past) = patch.past_conversations {
        memory.past_conversations = past;
    }
}

fn merge_settings(state: &mut AppState, patch: SettingsPatch) {
    let settings = &mut state.settings;
    if let Some(theme) = patch.theme {
        settings.theme = theme;
    }
    if let Some(style) = patch.avatar_style {
        settings.avatar_style = style;
    }
    if let Some(listening) = patch.continuous_listening {
        settings.continuous_listening = listening;
    }
    if let Some(voice) = patch.voice {
        match canonical_voice(&voice) {
            Some(known) => settings.voice = known.to_string(),
            None => warn!(voice = %voice, "ignoring unknown voice"),
        }
    }
    if let Some(speed) = patch.voice_speed {
        settings.voice_speed = clamp_to(VOICE_SPEED_RANGE, speed);
    }
    if let Some(pitch) = patch.voice_pitch {
        settings.voice_pitch = clamp_to(VOICE_PITCH_RANGE, pitch);
    }
}

#[cfg(test)]
mod tests;
