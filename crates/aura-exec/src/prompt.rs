use aura_core::decision::PayloadField;
use aura_core::taxonomy::Agent;
use aura_core::taxonomy::RouteRegistry;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::contracts::ContextSnapshot;

/// The fixed routing instruction, generated from the route table so the model
/// is only ever offered routable pairs.
pub fn system_instruction() -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are the routing agent for a voice assistant.\n\
Analyze the user's latest utterance and decide which agent should handle it.\n\n",
    );

    for agent in Agent::ALL {
        prompt.push_str("- For ");
        prompt.push_str(agent.purpose());
        prompt.push_str(", use the \"");
        prompt.push_str(agent.as_str());
        prompt.push_str("\" agent. Actions:");
        for (idx, spec) in RouteRegistry::actions_for(agent).enumerate() {
            if idx > 0 {
                prompt.push(',');
            }
            prompt.push_str(" \"");
            prompt.push_str(spec.action);
            prompt.push_str("\" (");
            prompt.push_str(spec.hint);
            prompt.push(')');
        }
        prompt.push_str(".\n");
    }

    prompt.push_str(
        "\nRules:\n\
- Only reference task ids that appear in the provided context.\n\
- Timestamps are ISO 8601; resolve relative dates against the current time.\n\
- If the utterance is not a tool request, use conversation/chat.\n\
- Respond with a single JSON object and nothing else.\n",
    );
    prompt
}

/// The per-turn user message: current time, grounding context and the utterance.
pub fn user_turn(context: &ContextSnapshot, utterance: &str, now: DateTime<Utc>) -> String {
    let mut prompt = String::new();
    prompt.push_str("Current time: ");
    prompt.push_str(&now.to_rfc3339_opts(SecondsFormat::Secs, true));
    prompt.push_str("\n\nContext:\n");
    prompt.push_str(&context.to_json());
    prompt.push_str("\n\nUser utterance: \"");
    prompt.push_str(utterance);
    prompt.push('"');
    prompt
}

/// Structured-output schema constraining the reply to a routing decision.
pub fn response_schema() -> Value {
    let mut payload_props = Map::new();
    for field in PayloadField::ALL {
        payload_props.insert(
            field.as_str().to_string(),
            json!({ "type": "STRING", "description": field.description() }),
        );
    }
    let agents: Vec<&str> = Agent::ALL.iter().map(|agent| agent.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "agent": { "type": "STRING", "enum": agents },
            "action": { "type": "STRING" },
            "payload": { "type": "OBJECT", "properties": payload_props },
        },
        "required": ["agent", "action", "payload"],
    })
}
