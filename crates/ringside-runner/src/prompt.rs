//! Prompt template loading and rendering via `minijinja`.
//!
//! The templates ship inside the binary. Operators can point
//! `llm.templates_dir` at a directory with their own `system.j2`,
//! `context.j2`, `actions.j2` and `response.j2` to tune agent behaviour
//! without recompiling.

use std::path::Path;

use minijinja::Environment;
use ringside_types::{AgentId, EventContext, MatchContext, PossibleAction, Role, StateSnapshot};
use serde::Serialize;

use crate::error::RunnerError;

const SYSTEM: &str = "system.j2";
const CONTEXT: &str = "context.j2";
const ACTIONS: &str = "actions.j2";
const RESPONSE: &str = "response.j2";

const TEMPLATES: [&str; 4] = [SYSTEM, CONTEXT, ACTIONS, RESPONSE];

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message: role preamble and persona.
    pub system: String,
    /// User message: match state, menu, hints and response format.
    pub user: String,
}

/// Everything the templates can see.
#[derive(Serialize)]
struct PromptPayload<'a> {
    preamble: String,
    role: Role,
    agent_name: &'a str,
    persona: &'a str,
    requesting_agent_id: AgentId,
    match_context: &'a MatchContext,
    state: &'a StateSnapshot,
    state_json: String,
    has_hints: bool,
    hints_json: String,
    available_actions: &'a [PossibleAction],
    example_action: &'a str,
    response_schema_json: String,
}

/// Renders decision contexts into prompts.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// A prompt engine using the built-in templates.
    pub fn builtin() -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        let sources = [
            (SYSTEM, include_str!("../templates/system.j2")),
            (CONTEXT, include_str!("../templates/context.j2")),
            (ACTIONS, include_str!("../templates/actions.j2")),
            (RESPONSE, include_str!("../templates/response.j2")),
        ];
        for (name, source) in sources {
            env.add_template(name, source)
                .map_err(|e| RunnerError::Template(format!("failed to add {name}: {e}")))?;
        }
        Ok(Self { env })
    }

    /// A prompt engine loading templates from `dir`. Every template must be
    /// present and parse.
    pub fn from_dir(dir: &Path) -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.to_path_buf()));
        for name in TEMPLATES {
            env.get_template(name).map_err(|e| {
                RunnerError::Template(format!(
                    "failed to load {name} from {}: {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(Self { env })
    }

    /// Render the prompt for one decision.
    pub fn render(&self, context: &EventContext) -> Result<RenderedPrompt, RunnerError> {
        let payload = PromptPayload {
            preamble: format!("You are acting as the {}. Respond accordingly.", context.role),
            role: context.role,
            agent_name: &context.agent_name,
            persona: &context.persona,
            requesting_agent_id: context.requesting_agent_id,
            match_context: &context.match_context,
            state: &context.state_snapshot,
            state_json: serde_json::to_string_pretty(&context.state_snapshot)?,
            has_hints: !context.promoter_hints.is_empty(),
            hints_json: serde_json::to_string_pretty(&context.promoter_hints)?,
            available_actions: &context.available_actions,
            example_action: context
                .available_actions
                .first()
                .map_or("", |a| a.name.as_str()),
            response_schema_json: serde_json::to_string_pretty(&response_schema(context.role))?,
        };

        let system = self.render_one(SYSTEM, &payload)?;
        let sections = [CONTEXT, ACTIONS, RESPONSE]
            .into_iter()
            .map(|name| self.render_one(name, &payload))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RenderedPrompt {
            system: system.trim().to_owned(),
            user: sections.join("\n\n"),
        })
    }

    fn render_one(&self, name: &str, payload: &PromptPayload<'_>) -> Result<String, RunnerError> {
        self.env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing {name}: {e}")))?
            .render(payload)
            .map_err(|e| RunnerError::Template(format!("{name} render failed: {e}")))
    }
}

/// JSON schema of the canonical response, with the parameters that matter
/// for `role`.
pub fn response_schema(role: Role) -> serde_json::Value {
    let params = match role {
        Role::Promoter => serde_json::json!({
            "new_hints": {"type": "object", "description": "guidance for everyone else"},
            "topic": {"type": "string", "description": "what the promo is about"}
        }),
        Role::Participant => serde_json::json!({
            "target": {"type": "string", "description": "wrestler id"},
            "intensity": {"type": "integer", "minimum": 1, "maximum": 10}
        }),
        Role::Referee => serde_json::json!({
            "target": {"type": "string", "description": "wrestler id"}
        }),
        Role::Crowd => serde_json::json!({
            "heat_adjustment": {"type": "integer", "minimum": -10, "maximum": 10},
            "target": {"type": "string", "description": "wrestler id"},
            "feud": {"type": "string", "description": "feud id"}
        }),
        Role::Announcer => serde_json::json!({
            "commentary": {"type": "string"}
        }),
        Role::Backstage => serde_json::json!({}),
    };
    serde_json::json!({
        "type": "object",
        "required": ["chosen_action"],
        "properties": {
            "chosen_action": {
                "type": "string",
                "description": "name of one offered action"
            },
            "parameters": {"type": "object", "properties": params},
            "rationale": {"type": "string"}
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ringside_core::testing::sample_context;

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let unique = format!(
            "ringside_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn builtin_prompt_names_the_role_and_menu() {
        let engine = PromptEngine::builtin().unwrap();
        let ctx = sample_context(Role::Referee);
        let prompt = engine.render(&ctx).unwrap();

        assert!(prompt.system.starts_with("You are acting as the referee."));
        assert!(prompt.system.contains(&ctx.agent_name));
        assert!(prompt.user.contains("- check_gear:"));
        assert!(prompt.user.contains("- warn:"));
        assert!(prompt.user.contains("Crowd heat: 50"));
        assert!(prompt.user.contains("\"chosen_action\""));
    }

    #[test]
    fn integer_ranges_are_spelled_out() {
        let engine = PromptEngine::builtin().unwrap();
        let prompt = engine.render(&sample_context(Role::Crowd)).unwrap();
        assert!(prompt.user.contains("heat_adjustment (integer -10..10, required)"));
    }

    #[test]
    fn hints_are_rendered_when_present() {
        let engine = PromptEngine::builtin().unwrap();
        let mut ctx = sample_context(Role::Announcer);
        let bare = engine.render(&ctx).unwrap();
        assert!(bare.user.contains("None."));

        ctx.promoter_hints
            .insert("storyline".to_owned(), serde_json::json!("title shot"));
        let hinted = engine.render(&ctx).unwrap();
        assert!(hinted.user.contains("title shot"));
    }

    #[test]
    fn templates_load_from_a_directory() {
        let dir = temp_dir("templates");
        std::fs::write(dir.join(SYSTEM), "{{ preamble }} Custom.").ok();
        std::fs::write(dir.join(CONTEXT), "heat={{ state.heat }}").ok();
        std::fs::write(
            dir.join(ACTIONS),
            "{% for a in available_actions %}{{ a.name }};{% endfor %}",
        )
        .ok();
        std::fs::write(dir.join(RESPONSE), "json please").ok();

        let engine = PromptEngine::from_dir(&dir).unwrap();
        let prompt = engine.render(&sample_context(Role::Backstage)).unwrap();
        assert_eq!(
            prompt.system,
            "You are acting as the backstage. Respond accordingly. Custom."
        );
        assert_eq!(prompt.user, "heat=50\n\nscout;stand_by;\n\njson please");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_template_returns_error() {
        let dir = temp_dir("missing_templates");
        std::fs::write(dir.join(SYSTEM), "only this one").ok();
        assert!(PromptEngine::from_dir(&dir).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn schema_lists_role_parameters() {
        let schema = response_schema(Role::Crowd);
        let params = schema
            .pointer("/properties/parameters/properties")
            .unwrap();
        assert!(params.get("heat_adjustment").is_some());
        assert!(response_schema(Role::Backstage)
            .pointer("/properties/parameters/properties/heat_adjustment")
            .is_none());
    }
}
