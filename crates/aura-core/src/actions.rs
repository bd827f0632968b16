use super::state::AppState;
use super::state::CalendarEvent;
use super::state::MemoryPatch;
use super::state::Note;
use super::state::Panel;
use super::state::SettingsPatch;
use super::state::Task;
use super::state::ToolTab;

/// The closed set of mutations the store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddTask(Task),
    ToggleTask(String),
    DeleteTask(String),
    AddNote(Note),
    UpdateNote(Note),
    DeleteNote(String),
    AddEvent(CalendarEvent),
    UpdateMemory(MemoryPatch),
    UpdateSettings(SettingsPatch),
    SetActivePanel(Option<Panel>),
    SetActiveToolTab(ToolTab),
    LoadState(Box<AppState>),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddTask(_) => "add_task",
            Self::ToggleTask(_) => "toggle_task",
            Self::DeleteTask(_) => "delete_task",
            Self::AddNote(_) => "add_note",
            Self::UpdateNote(_) => "update_note",
            Self::DeleteNote(_) => "delete_note",
            Self::AddEvent(_) => "add_event",
            Self::UpdateMemory(_) => "update_memory",
            Self::UpdateSettings(_) => "update_settings",
            Self::SetActivePanel(_) => "set_active_panel",
            Self::SetActiveToolTab(_) => "set_active_tool_tab",
            Self::LoadState(_) => "load_state",
        }
    }
}

/// Actions dispatched by the tools bar: pick the tab, then show the tools panel.
pub fn open_tool(tab: ToolTab) -> [Action; 2] {
    [
        Action::SetActiveToolTab(tab),
        Action::SetActivePanel(Some(Panel::Tasks)),
    ]
}
