use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub const VOICE_SPEED_RANGE: (f32, f32) = (0.5, 2.0);
pub const VOICE_PITCH_RANGE: (f32, f32) = (0.5, 2.0);

pub const KNOWN_VOICES: [&str; 5] = ["Zephyr", "Puck", "Charon", "Kore", "Fenrir"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTheme {
    #[default]
    Dark,
    Light,
    Cyberpunk,
}

impl MemoryTheme {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Cyberpunk => "cyberpunk",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            "cyberpunk" => Some(Self::Cyberpunk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: MemoryTheme,
    pub voice: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: MemoryTheme::Dark,
            voice: KNOWN_VOICES[0].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Memory {
    pub profile: Profile,
    pub preferences: Preferences,
    pub projects: Vec<Project>,
    pub past_conversations: Vec<String>,
}

/// Partial memory update. `Some` fields replace the whole sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_conversations: Option<Vec<String>>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none()
            && self.preferences.is_none()
            && self.projects.is_none()
            && self.past_conversations.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsTheme {
    Light,
    #[default]
    Dark,
    Cyberpunk,
    Holographic,
}

impl SettingsTheme {
    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Cyberpunk => "cyberpunk",
            Self::Holographic => "holographic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub theme: SettingsTheme,
    pub avatar_style: String,
    pub continuous_listening: bool,
    pub voice: String,
    pub voice_speed: f32,
    pub voice_pitch: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: SettingsTheme::Dark,
            avatar_style: "realistic".to_string(),
            continuous_listening: false,
            voice: KNOWN_VOICES[0].to_string(),
            voice_speed: 1.0,
            voice_pitch: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<SettingsTheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous_listening: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_pitch: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Tasks,
    Calendar,
    Notes,
    Search,
    Memory,
    Settings,
}

impl Panel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Calendar => "calendar",
            Self::Notes => "notes",
            Self::Search => "search",
            Self::Memory => "memory",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTab {
    #[default]
    Tasks,
    Calendar,
    Notes,
}

impl ToolTab {
    pub fn label(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Calendar => "calendar",
            Self::Notes => "notes",
        }
    }
}

/// The whole application snapshot. Only the store replaces it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppState {
    pub tasks: Vec<Task>,
    pub notes: Vec<Note>,
    pub calendar_events: Vec<CalendarEvent>,
    pub memory: Memory,
    pub settings: Settings,
    pub active_panel: Option<Panel>,
    pub active_tool_tab: ToolTab,
}

impl AppState {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&CalendarEvent> {
        self.calendar_events.iter().find(|event| event.id == id)
    }

    /// True when any entity collection already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.task(id).is_some() || self.note(id).is_some() || self.event(id).is_some()
    }

    pub fn open_task_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.completed).count()
    }
}

pub fn clamp_to(range: (f32, f32), value: f32) -> f32 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(range.0, range.1)
}

/// The canonical spelling of a known voice name, matched case-insensitively.
pub fn canonical_voice(input: &str) -> Option<&'static str> {
    let input = input.trim();
    KNOWN_VOICES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(input))
}
