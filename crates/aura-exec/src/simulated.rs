use std::sync::OnceLock;

use async_trait::async_trait;
use aura_core::decision::DecisionPayload;
use aura_core::decision::RawDecision;
use chrono::Duration;
use chrono::SecondsFormat;
use chrono::Utc;
use regex::Regex;

use crate::contracts::ClassifierError;
use crate::contracts::ContextSnapshot;
use crate::contracts::IntentClassifier;

#[derive(Debug, Clone, Copy)]
enum Rule {
    AddTask,
    CompleteTask,
    AddNote,
    AddEvent,
    RememberName,
    RememberInterest,
    Search,
    List,
}

const RULES: &[(&str, Rule)] = &[
    (
        r"(?i)^(?:remind me to|add (?:a )?task(?: to)?|todo:?)\s+(.+?)[.!]?$",
        Rule::AddTask,
    ),
    (
        r"(?i)^(?:mark|complete|finish|check off)\s+(.+?)(?:\s+(?:as\s+)?(?:done|complete))?[.!]?$",
        Rule::CompleteTask,
    ),
    (
        r"(?i)^(?:take a note|note|write down)(?: that)?:?\s+(.+?)[.!]?$",
        Rule::AddNote,
    ),
    (
        r"(?i)^(?:schedule|book|add (?:an )?event(?: for)?)\s+(.+?)[.!]?$",
        Rule::AddEvent,
    ),
    (r"(?i)^(?:my name is|call me)\s+(.+?)[.!]?$", Rule::RememberName),
    (r"(?i)^i(?:'m| am) interested in\s+(.+?)[.!]?$", Rule::RememberInterest),
    (r"(?i)^(?:search(?: for)?|look up)\s+(.+?)[.?!]?$", Rule::Search),
    (
        r"(?i)^(?:show|list|open)(?: me)?(?: my)?\s+(tasks|notes|calendar|events)[.!]?$",
        Rule::List,
    ),
];

fn compiled_rules() -> &'static [(Regex, Rule)] {
    static COMPILED: OnceLock<Vec<(Regex, Rule)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, rule)| Regex::new(pattern).ok().map(|re| (re, *rule)))
            .collect()
    })
}

/// Offline keyword classifier for running without network access.
///
/// Anything it does not recognise is treated as conversation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedClassifier;

#[async_trait]
impl IntentClassifier for SimulatedClassifier {
    async fn classify(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        Ok(classify_offline(utterance, context))
    }
}

pub fn classify_offline(utterance: &str, context: &ContextSnapshot) -> RawDecision {
    let utterance = utterance.trim();
    for (re, rule) in compiled_rules() {
        let Some(captures) = re.captures(utterance) else {
            continue;
        };
        let subject = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if let Some(decision) = decide(*rule, subject, context) {
            return decision;
        }
    }
    RawDecision::new("conversation", "chat", DecisionPayload::default())
}

fn decide(rule: Rule, subject: String, context: &ContextSnapshot) -> Option<RawDecision> {
    let decision = match rule {
        Rule::AddTask => RawDecision::new(
            "tasks",
            "add",
            DecisionPayload {
                text: Some(subject),
                ..DecisionPayload::default()
            },
        ),
        Rule::CompleteTask => {
            let needle = subject.to_lowercase();
            let task = context
                .tasks
                .iter()
                .rev()
                .find(|task| !task.completed && task.text.to_lowercase().contains(&needle))?;
            RawDecision::new(
                "tasks",
                "complete",
                DecisionPayload {
                    id: Some(task.id.clone()),
                    ..DecisionPayload::default()
                },
            )
        }
        Rule::AddNote => RawDecision::new(
            "notes",
            "add",
            DecisionPayload {
                title: Some(note_title(&subject)),
                text: Some(subject),
                ..DecisionPayload::default()
            },
        ),
        Rule::AddEvent => {
            let start = Utc::now() + Duration::hours(1);
            let end = start + Duration::hours(1);
            RawDecision::new(
                "calendar",
                "add",
                DecisionPayload {
                    title: Some(subject),
                    start: Some(start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    end: Some(end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ..DecisionPayload::default()
                },
            )
        }
        Rule::RememberName => memory_update("name", subject),
        Rule::RememberInterest => memory_update("interests", subject),
        Rule::Search => RawDecision::new(
            "search",
            "query",
            DecisionPayload {
                text: Some(subject),
                ..DecisionPayload::default()
            },
        ),
        Rule::List => {
            let agent = match subject.to_lowercase().as_str() {
                "tasks" => "tasks",
                "notes" => "notes",
                _ => "calendar",
            };
            RawDecision::new(agent, "list", DecisionPayload::default())
        }
    };
    Some(decision)
}

fn memory_update(key: &str, value: String) -> RawDecision {
    RawDecision::new(
        "memory",
        "update",
        DecisionPayload {
            key: Some(key.to_string()),
            value: Some(value),
            ..DecisionPayload::default()
        },
    )
}

fn note_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(5).collect();
    let title = words.join(" ");
    if text.split_whitespace().count() > words.len() {
        format!("{title}...")
    } else {
        title
    }
}
