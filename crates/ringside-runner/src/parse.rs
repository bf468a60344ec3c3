//! LLM response parsing into [`AgentActionResponse`].
//!
//! Models do not reliably return clean JSON, and not always in the shape
//! they were asked for. Text is recovered through several strategies, then
//! the object is normalised: the canonical
//! `{chosen_action, parameters, rationale}` shape is preferred, and the
//! per-role shapes (`chosen_action_id`, `call`, `reaction`, `commentary`,
//! `new_hints`, `action`) are mapped onto it.
//!
//! Nothing here checks the choice against the menu; the rulebook does that.

use ringside_types::{AgentActionResponse, Role};
use serde_json::{Map, Value};

use crate::error::RunnerError;

/// Parse raw model output into a response for an agent acting as `role`.
pub fn parse_response(raw: &str, role: Role) -> Result<AgentActionResponse, RunnerError> {
    let object = extract_object(raw)?;
    normalise(role, object)
}

/// Recover a JSON object from the text.
///
/// Tried in order:
/// 1. Direct parse
/// 2. Contents of a markdown code block
/// 3. Trailing commas stripped
/// 4. Code block contents with trailing commas stripped
/// 5. The outermost `{ ... }` span, with trailing commas stripped
fn extract_object(raw: &str) -> Result<Map<String, Value>, RunnerError> {
    let trimmed = raw.trim();
    let block = extract_json_from_codeblock(trimmed);

    let mut candidates: Vec<String> = vec![trimmed.to_owned()];
    if let Some(inner) = block {
        candidates.push(inner.to_owned());
    }
    candidates.push(strip_trailing_commas(trimmed));
    if let Some(inner) = block {
        candidates.push(strip_trailing_commas(inner));
    }
    if let Some(span) = outermost_braces(trimmed) {
        candidates.push(strip_trailing_commas(span));
    }

    candidates
        .iter()
        .find_map(|text| match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .ok_or_else(|| RunnerError::Parse(format!("no JSON object in response: {trimmed}")))
}

/// Map any accepted shape onto the canonical response.
fn normalise(
    role: Role,
    mut object: Map<String, Value>,
) -> Result<AgentActionResponse, RunnerError> {
    let rationale =
        take_text(&mut object, "rationale").or_else(|| take_text(&mut object, "reasoning"));

    if let Some(action) = take_text(&mut object, "chosen_action") {
        let parameters = match object.remove("parameters") {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(RunnerError::Parse(format!(
                    "parameters must be an object, got {other}"
                )));
            }
        };
        return Ok(AgentActionResponse {
            chosen_action: action_name(&action),
            parameters,
            rationale,
        });
    }

    let mut response = match role {
        Role::Participant => from_participant_shape(&mut object),
        Role::Referee => from_referee_shape(&mut object),
        Role::Crowd => from_crowd_shape(&mut object),
        Role::Announcer => from_announcer_shape(&mut object),
        Role::Promoter => from_promoter_shape(&mut object),
        Role::Backstage => from_backstage_shape(&mut object),
    }
    .or_else(|| {
        take_text(&mut object, "action_id")
            .or_else(|| take_text(&mut object, "action"))
            .map(|a| AgentActionResponse::new(action_name(&a)))
    })
    .ok_or_else(|| RunnerError::Parse(format!("no action named in {role} response")))?;

    if response.rationale.is_none() {
        response.rationale = rationale.or_else(|| take_text(&mut object, "description"));
    }
    Ok(response)
}

fn from_participant_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let action = take_text(object, "chosen_action_id")?;
    let mut response = AgentActionResponse::new(action_name(&action));
    move_param(object, "target_agent_id", &mut response, "target");
    move_param(object, "intensity", &mut response, "intensity");
    response.rationale = take_text(object, "commentary");
    Some(response)
}

fn from_referee_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let action = take_text(object, "call")?;
    let mut response = AgentActionResponse::new(action_name(&action));
    move_param(object, "target_agent_id", &mut response, "target");
    response.rationale = take_text(object, "reason");
    Some(response)
}

fn from_crowd_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let action = take_text(object, "reaction")?;
    let mut response = AgentActionResponse::new(action_name(&action));
    move_param(object, "heat_adjustment", &mut response, "heat_adjustment");
    move_param(object, "target_agent_id", &mut response, "target");
    Some(response)
}

fn from_announcer_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let commentary = take_text(object, "commentary")?;
    Some(AgentActionResponse::new("call_action").with_param("commentary", commentary))
}

fn from_promoter_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let hints = object.remove("new_hints")?;
    Some(AgentActionResponse::new("promoter_hint").with_param("new_hints", hints))
}

fn from_backstage_shape(object: &mut Map<String, Value>) -> Option<AgentActionResponse> {
    let action = take_text(object, "action")?;
    let mut response = AgentActionResponse::new(action_name(&action));
    response.rationale = take_text(object, "description");
    Some(response)
}

/// Remove `key` if it holds a non-blank string.
fn take_text(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn move_param(
    object: &mut Map<String, Value>,
    from: &str,
    response: &mut AgentActionResponse,
    to: &str,
) {
    if let Some(value) = object.remove(from).filter(|v| !v.is_null()) {
        response.parameters.insert(to.to_owned(), value);
    }
}

/// Models write `High Risk Move` or `high-risk-move`; the menu says
/// `high_risk_move`.
fn action_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Extract the contents of the first markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = text.get(start.checked_add(3)?..)?;
    let body_start = after.find('\n').map_or(0, |n| n.saturating_add(1));
    let body = after.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// The text from the first `{` to the last `}`.
fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Remove commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let mut lookahead = chars.clone();
            let next = lookahead.find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn canonical_shape() {
        let raw = r#"{"chosen_action": "grapple", "parameters": {"intensity": 7}, "rationale": "set up the finish"}"#;
        let response = parse_response(raw, Role::Participant).unwrap();
        assert_eq!(response.chosen_action, "grapple");
        assert_eq!(response.parameters.get("intensity"), Some(&serde_json::json!(7)));
        assert_eq!(response.rationale.as_deref(), Some("set up the finish"));
    }

    #[test]
    fn codeblock_with_trailing_comma() {
        let raw = "Here you go:\n```json\n{\"chosen_action\": \"count\", \"parameters\": {},}\n```";
        let response = parse_response(raw, Role::Referee).unwrap();
        assert_eq!(response.chosen_action, "count");
    }

    #[test]
    fn prose_around_the_object() {
        let raw = "I think the crowd boos. {\"chosen_action\": \"boo\", \"parameters\": {\"heat_adjustment\": -3}} That's it.";
        let response = parse_response(raw, Role::Crowd).unwrap();
        assert_eq!(response.chosen_action, "boo");
        assert_eq!(
            response.parameters.get("heat_adjustment"),
            Some(&serde_json::json!(-3))
        );
    }

    #[test]
    fn action_names_are_normalised() {
        let raw = r#"{"chosen_action": "High Risk Move"}"#;
        let response = parse_response(raw, Role::Participant).unwrap();
        assert_eq!(response.chosen_action, "high_risk_move");
    }

    #[test]
    fn participant_shape() {
        let raw = r#"{"event_id": "e1", "chosen_action_id": "kick", "target_agent_id": "abc", "intensity": 9, "commentary": "Take that!"}"#;
        let response = parse_response(raw, Role::Participant).unwrap();
        assert_eq!(response.chosen_action, "kick");
        assert_eq!(response.parameters.get("target"), Some(&serde_json::json!("abc")));
        assert_eq!(response.parameters.get("intensity"), Some(&serde_json::json!(9)));
        assert_eq!(response.rationale.as_deref(), Some("Take that!"));
    }

    #[test]
    fn referee_shape() {
        let raw = r#"{"call": "pinfall", "reason": "shoulders down for three"}"#;
        let response = parse_response(raw, Role::Referee).unwrap();
        assert_eq!(response.chosen_action, "pinfall");
        assert_eq!(response.rationale.as_deref(), Some("shoulders down for three"));
    }

    #[test]
    fn crowd_shape() {
        let raw = r#"{"reaction": "Cheer", "heat_adjustment": 6}"#;
        let response = parse_response(raw, Role::Crowd).unwrap();
        assert_eq!(response.chosen_action, "cheer");
        assert_eq!(
            response.parameters.get("heat_adjustment"),
            Some(&serde_json::json!(6))
        );
    }

    #[test]
    fn announcer_shape() {
        let raw = r#"{"commentary": "BAH GAWD!"}"#;
        let response = parse_response(raw, Role::Announcer).unwrap();
        assert_eq!(response.chosen_action, "call_action");
        assert_eq!(
            response.parameters.get("commentary"),
            Some(&serde_json::json!("BAH GAWD!"))
        );
    }

    #[test]
    fn promoter_shape() {
        let raw = r#"{"new_hints": {"main_event": "cage match"}}"#;
        let response = parse_response(raw, Role::Promoter).unwrap();
        assert_eq!(response.chosen_action, "promoter_hint");
        assert_eq!(
            response.parameters.get("new_hints"),
            Some(&serde_json::json!({"main_event": "cage match"}))
        );
    }

    #[test]
    fn backstage_shape() {
        let raw = r#"{"action": "scout", "description": "watching from the ramp"}"#;
        let response = parse_response(raw, Role::Backstage).unwrap();
        assert_eq!(response.chosen_action, "scout");
        assert_eq!(response.rationale.as_deref(), Some("watching from the ramp"));
    }

    #[test]
    fn generic_action_id_shape() {
        let raw = r#"{"action_id": "hold", "description": "Stub action", "meta": {}}"#;
        let response = parse_response(raw, Role::Promoter).unwrap();
        assert_eq!(response.chosen_action, "hold");
        assert_eq!(response.rationale.as_deref(), Some("Stub action"));
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        let raw = r#"{"chosen_action": "punch", "parameters": [1, 2]}"#;
        assert!(parse_response(raw, Role::Participant).is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_response("I refuse to answer.", Role::Crowd).is_err());
        assert!(parse_response("[\"cheer\"]", Role::Crowd).is_err());
        assert!(parse_response(r#"{"mood": "happy"}"#, Role::Crowd).is_err());
    }

    #[test]
    fn strip_trailing_commas_keeps_inner_commas() {
        assert_eq!(
            strip_trailing_commas("{\"a\": [1, 2,], \"b\": 3,\n}"),
            "{\"a\": [1, 2], \"b\": 3\n}"
        );
    }
}
