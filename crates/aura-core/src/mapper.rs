//! Turns an untrusted [`RawDecision`] into store actions.
//!
//! Only routes listed in [`RouteRegistry`] are accepted, and every field a
//! route requires must be present and well formed. Nothing is defaulted: a
//! decision either maps completely or produces no actions at all.

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::actions::Action;
use crate::decision::PayloadField;
use crate::decision::RawDecision;
use crate::ids::EntityKind;
use crate::ids::IdGenerator;
use crate::state::canonical_voice;
use crate::state::AppState;
use crate::state::CalendarEvent;
use crate::state::MemoryPatch;
use crate::state::MemoryTheme;
use crate::state::Note;
use crate::state::Preferences;
use crate::state::Profile;
use crate::state::Project;
use crate::state::Task;
use crate::state::ToolTab;
use crate::taxonomy::RouteId;
use crate::taxonomy::RouteRegistry;
use crate::taxonomy::RouteSpec;

const NAIVE_TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no route for {agent}/{action}")]
    UnknownRoute { agent: String, action: String },
    #[error("{route} requires payload field `{field}`")]
    MissingField {
        route: &'static str,
        field: &'static str,
    },
    #[error("payload field `{field}` is not a timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("event ends ({end}) before it starts ({start})")]
    EventEndsBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("memory key `{0}` is not updatable")]
    UnknownMemoryKey(String),
    #[error("invalid value for memory key `{key}`: {value}")]
    InvalidMemoryValue { key: &'static str, value: String },
    #[error("generated identifier `{0}` is already in use")]
    IdCollision(String),
}

impl ValidationError {
    /// Identifier collisions are invariant violations, not bad model output.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::IdCollision(_))
    }
}

/// Non-state work a decision asks another collaborator to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    /// Leave the reply to the realtime voice session.
    Conversation,
    Search { query: String },
    ShowTool(ToolTab),
}

pub struct MapContext<'a> {
    pub ids: &'a dyn IdGenerator,
    pub now: DateTime<Utc>,
}

impl<'a> MapContext<'a> {
    pub fn new(ids: &'a dyn IdGenerator) -> Self {
        Self {
            ids,
            now: Utc::now(),
        }
    }
}

/// Collapses every validation failure to an empty action list.
pub fn map_to_actions(decision: &RawDecision, state: &AppState, ctx: &MapContext<'_>) -> Vec<Action> {
    match map_decision(decision, state, ctx) {
        Ok(actions) => actions,
        Err(err) if err.is_internal() => {
            error!(agent = %decision.agent, action = %decision.action, "{err}");
            Vec::new()
        }
        Err(err) => {
            warn!(agent = %decision.agent, action = %decision.action, "dropping decision: {err}");
            Vec::new()
        }
    }
}

pub fn map_decision(
    decision: &RawDecision,
    state: &AppState,
    ctx: &MapContext<'_>,
) -> Result<Vec<Action>, ValidationError> {
    let spec = route_for(decision)?;
    require_fields(spec, decision)?;
    let payload = &decision.payload;
    let field = |f: PayloadField| payload.get(f).unwrap_or_default();

    let actions = match spec.id {
        RouteId::AddTask => {
            let id = fresh_id(ctx, state, EntityKind::Task)?;
            vec![Action::AddTask(Task {
                id,
                text: field(PayloadField::Text).to_string(),
                completed: false,
                created_at: ctx.now,
            })]
        }
        RouteId::CompleteTask => vec![Action::ToggleTask(field(PayloadField::Id).to_string())],
        RouteId::DeleteTask => vec![Action::DeleteTask(field(PayloadField::Id).to_string())],
        RouteId::AddNote => {
            let id = fresh_id(ctx, state, EntityKind::Note)?;
            vec![Action::AddNote(Note {
                id,
                title: field(PayloadField::Title).to_string(),
                content: field(PayloadField::Text).to_string(),
                tags: Vec::new(),
                created_at: ctx.now,
            })]
        }
        RouteId::AddEvent => {
            let start = parse_timestamp(PayloadField::Start, field(PayloadField::Start))?;
            let end = parse_timestamp(PayloadField::End, field(PayloadField::End))?;
            if start > end {
                return Err(ValidationError::EventEndsBeforeStart { start, end });
            }
            let id = fresh_id(ctx, state, EntityKind::Event)?;
            vec![Action::AddEvent(CalendarEvent {
                id,
                title: field(PayloadField::Title).to_string(),
                start,
                end,
            })]
        }
        RouteId::UpdateMemory => {
            let patch = memory_patch(state, field(PayloadField::Key), field(PayloadField::Value))?;
            vec![Action::UpdateMemory(patch)]
        }
        RouteId::ListTasks
        | RouteId::ListNotes
        | RouteId::ListEvents
        | RouteId::Chat
        | RouteId::SearchQuery => Vec::new(),
    };

    debug!(
        agent = %decision.agent,
        action = %decision.action,
        produced = actions.len(),
        "mapped decision"
    );
    Ok(actions)
}

/// The collaborator handoff for a decision, if its route is a valid handoff.
pub fn handoff_for(decision: &RawDecision) -> Option<Handoff> {
    let spec = route_for(decision).ok()?;
    require_fields(spec, decision).ok()?;
    match spec.id {
        RouteId::Chat => Some(Handoff::Conversation),
        RouteId::SearchQuery => decision
            .payload
            .get(PayloadField::Text)
            .map(|query| Handoff::Search {
                query: query.to_string(),
            }),
        RouteId::ListTasks => Some(Handoff::ShowTool(ToolTab::Tasks)),
        RouteId::ListNotes => Some(Handoff::ShowTool(ToolTab::Notes)),
        RouteId::ListEvents => Some(Handoff::ShowTool(ToolTab::Calendar)),
        _ => None,
    }
}

fn route_for(decision: &RawDecision) -> Result<&'static RouteSpec, ValidationError> {
    RouteRegistry::lookup(&decision.agent, &decision.action).ok_or_else(|| {
        ValidationError::UnknownRoute {
            agent: decision.agent.clone(),
            action: decision.action.clone(),
        }
    })
}

fn require_fields(spec: &RouteSpec, decision: &RawDecision) -> Result<(), ValidationError> {
    for field in spec.required {
        if decision.payload.get(*field).is_none() {
            return Err(ValidationError::MissingField {
                route: spec.action,
                field: field.as_str(),
            });
        }
    }
    Ok(())
}

fn fresh_id(ctx: &MapContext<'_>, state: &AppState, kind: EntityKind) -> Result<String, ValidationError> {
    let id = ctx.ids.next_id(kind);
    if state.contains_id(&id) {
        return Err(ValidationError::IdCollision(id));
    }
    Ok(id)
}

pub fn parse_timestamp(field: PayloadField, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidTimestamp {
            field: field.as_str(),
            value: raw.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemoryKey {
    Name,
    Interests,
    Theme,
    Voice,
    Project,
}

impl MemoryKey {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" | "profile.name" => Some(Self::Name),
            "interests" | "interest" | "profile.interests" => Some(Self::Interests),
            "theme" | "preferences.theme" => Some(Self::Theme),
            "voice" | "preferences.voice" => Some(Self::Voice),
            "project" | "projects" => Some(Self::Project),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Interests => "interests",
            Self::Theme => "theme",
            Self::Voice => "voice",
            Self::Project => "project",
        }
    }
}

/// Builds the full replacement sub-record from the current snapshot, since
/// the reducer replaces memory sub-records wholesale.
fn memory_patch(state: &AppState, key: &str, value: &str) -> Result<MemoryPatch, ValidationError> {
    let key = MemoryKey::parse(key).ok_or_else(|| ValidationError::UnknownMemoryKey(key.to_string()))?;
    let invalid = || ValidationError::InvalidMemoryValue {
        key: key.as_str(),
        value: value.to_string(),
    };
    let memory = &state.memory;

    let patch = match key {
        MemoryKey::Name => MemoryPatch {
            profile: Some(Profile {
                name: value.to_string(),
                interests: memory.profile.interests.clone(),
            }),
            ..MemoryPatch::default()
        },
        MemoryKey::Interests => {
            let mut interests = memory.profile.interests.clone();
            let mut added = false;
            for interest in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                added = true;
                if !interests.iter().any(|known| known.eq_ignore_ascii_case(interest)) {
                    interests.push(interest.to_string());
                }
            }
            if !added {
                return Err(invalid());
            }
            MemoryPatch {
                profile: Some(Profile {
                    name: memory.profile.name.clone(),
                    interests,
                }),
                ..MemoryPatch::default()
            }
        }
        MemoryKey::Theme => MemoryPatch {
            preferences: Some(Preferences {
                theme: MemoryTheme::parse(value).ok_or_else(invalid)?,
                voice: memory.preferences.voice.clone(),
            }),
            ..MemoryPatch::default()
        },
        MemoryKey::Voice => {
            let voice = canonical_voice(value).ok_or_else(invalid)?;
            MemoryPatch {
                preferences: Some(Preferences {
                    theme: memory.preferences.theme,
                    voice: voice.to_string(),
                }),
                ..MemoryPatch::default()
            }
        }
        MemoryKey::Project => {
            let mut projects = memory.projects.clone();
            if !projects.iter().any(|p| p.name.eq_ignore_ascii_case(value)) {
                projects.push(Project {
                    name: value.to_string(),
                    goals: Vec::new(),
                });
            }
            MemoryPatch {
                projects: Some(projects),
                ..MemoryPatch::default()
            }
        }
    };
    Ok(patch)
}
