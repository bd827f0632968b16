use serde::Deserialize;
use serde::Serialize;

/// Unvalidated `(agent, action, payload)` triple as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawDecision {
    pub agent: String,
    pub action: String,
    #[serde(default)]
    pub payload: DecisionPayload,
}

impl RawDecision {
    pub fn new(agent: &str, action: &str, payload: DecisionPayload) -> Self {
        Self {
            agent: agent.to_string(),
            action: action.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadField {
    Id,
    Text,
    Title,
    Start,
    End,
    Key,
    Value,
}

impl PayloadField {
    pub const ALL: [PayloadField; 7] = [
        Self::Id,
        Self::Text,
        Self::Title,
        Self::Start,
        Self::End,
        Self::Key,
        Self::Value,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Text => "text",
            Self::Title => "title",
            Self::Start => "start",
            Self::End => "end",
            Self::Key => "key",
            Self::Value => "value",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Id => "ID of item to modify",
            Self::Text => "Content for task or note, or the search query",
            Self::Title => "Title for note or event",
            Self::Start => "ISO date string for event start",
            Self::End => "ISO date string for event end",
            Self::Key => "Key for memory update",
            Self::Value => "Value for memory update",
        }
    }
}

impl DecisionPayload {
    /// The trimmed field value, treating blank strings as absent.
    pub fn get(&self, field: PayloadField) -> Option<&str> {
        let raw = match field {
            PayloadField::Id => self.id.as_deref(),
            PayloadField::Text => self.text.as_deref(),
            PayloadField::Title => self.title.as_deref(),
            PayloadField::Start => self.start.as_deref(),
            PayloadField::End => self.end.as_deref(),
            PayloadField::Key => self.key.as_deref(),
            PayloadField::Value => self.value.as_deref(),
        };
        raw.map(str::trim).filter(|value| !value.is_empty())
    }
}
