//! Prompt template loading and rendering via `minijinja`.
//!
//! Every template ships inside the binary so the engine works without any
//! files on disk. Operators can tune agent behavior without recompiling by
//! pointing [`PromptEngine::from_dir`] at a directory: any `<name>.j2` file
//! found there replaces the built-in template of the same name.

use std::path::Path;

use minijinja::Environment;
use tracing::debug;

use crate::error::LlmError;

/// Built-in templates: `(name, source)`.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("agent_system", include_str!("../templates/agent_system.j2")),
    ("decision", include_str!("../templates/decision.j2")),
    ("reply", include_str!("../templates/reply.j2")),
    ("feedback", include_str!("../templates/feedback.j2")),
    ("rewrite_system", include_str!("../templates/rewrite_system.j2")),
    ("rewrite_role", include_str!("../templates/rewrite_role.j2")),
    ("rewrite_attributes", include_str!("../templates/rewrite_attributes.j2")),
    (
        "research_query_system",
        include_str!("../templates/research_query_system.j2"),
    ),
    ("research_query", include_str!("../templates/research_query.j2")),
    (
        "research_report_system",
        include_str!("../templates/research_report_system.j2"),
    ),
    ("research_report", include_str!("../templates/research_report.j2")),
];

/// The prompts the simulation knows how to render.
///
/// Each kind pairs a system template with a user template; both are
/// rendered against the same context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// An agent choosing its next action.
    AgentDecision,
    /// An agent answering a direct message.
    AgentReply,
    /// An agent describing how a BUY or SKIP turned out.
    ActionFeedback,
    /// Rewriting an agent's description into a simulation role.
    RewriteRole,
    /// Narrating an agent's attributes in second person.
    RewriteAttributes,
    /// Turning product information into a web search query.
    ResearchQuery,
    /// Writing a competitor report from search results.
    ResearchReport,
}

impl PromptKind {
    /// Names of the `(system, user)` templates for this kind.
    pub const fn templates(self) -> (&'static str, &'static str) {
        match self {
            Self::AgentDecision => ("agent_system", "decision"),
            Self::AgentReply => ("agent_system", "reply"),
            Self::ActionFeedback => ("agent_system", "feedback"),
            Self::RewriteRole => ("rewrite_system", "rewrite_role"),
            Self::RewriteAttributes => ("rewrite_system", "rewrite_attributes"),
            Self::ResearchQuery => ("research_query_system", "research_query"),
            Self::ResearchReport => ("research_report_system", "research_report"),
        }
    }
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message framing the model's role.
    pub system: String,
    /// User message carrying the task and its context.
    pub user: String,
}

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create an engine with only the built-in templates.
    pub fn builtin() -> Result<Self, LlmError> {
        let mut env = Environment::new();
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(*name, *source)
                .map_err(|e| LlmError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Create an engine whose templates may be overridden from `dir`.
    ///
    /// A missing directory or a missing file falls back to the built-in
    /// template; an unreadable or unparsable file is an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        let mut engine = Self::builtin()?;
        for (name, _) in BUILTIN_TEMPLATES {
            let path = dir.join(format!("{name}.j2"));
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| {
                LlmError::Template(format!("failed to read {}: {e}", path.display()))
            })?;
            engine
                .env
                .add_template_owned(*name, source)
                .map_err(|e| LlmError::Template(format!("failed to add {name} template: {e}")))?;
            debug!(template = name, path = %path.display(), "loaded template override");
        }
        Ok(engine)
    }

    /// Render the system and user messages for `kind`.
    pub fn render(
        &self,
        kind: PromptKind,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, LlmError> {
        let (system_name, user_name) = kind.templates();
        Ok(RenderedPrompt {
            system: self.render_one(system_name, context)?,
            user: self.render_one(user_name, context)?,
        })
    }

    fn render_one(&self, name: &str, context: &serde_json::Value) -> Result<String, LlmError> {
        self.env
            .get_template(name)
            .map_err(|e| LlmError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map(|text| text.trim().to_owned())
            .map_err(|e| LlmError::Template(format!("{name} render failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn decision_context() -> serde_json::Value {
        serde_json::json!({
            "environment": "A tuition market in Kuala Lumpur.",
            "description": "You are in a simulation with other agents as Aina.",
            "memory": ["Cycle 1 start"],
            "agents": ["(agent_id:2,name:Ben)"],
            "products": ["(product_id:1,name:Course,description:Exam prep,price:RM350.00)"],
            "actions": ["BUY to buy a product", "SKIP to skip this cycle"],
        })
    }

    #[test]
    fn builtin_decision_prompt_renders() {
        let engine = PromptEngine::builtin().unwrap();
        let prompt = engine
            .render(PromptKind::AgentDecision, &decision_context())
            .unwrap();

        assert!(prompt.system.starts_with("A tuition market"));
        assert!(prompt.system.contains("as Aina"));
        assert!(prompt.user.contains("Cycle 1 start"));
        assert!(prompt.user.contains("All agents: [(agent_id:2,name:Ben)]"));
        assert!(prompt.user.contains("price:RM350.00"));
        assert!(prompt.user.contains("\"target_id\""));
    }

    #[test]
    fn feedback_prompt_depends_on_product() {
        let engine = PromptEngine::builtin().unwrap();
        let bought = engine
            .render(
                PromptKind::ActionFeedback,
                &serde_json::json!({"memory": [], "product": "Course"}),
            )
            .unwrap();
        assert!(bought.user.contains("You just bought Course"));

        let skipped = engine
            .render(
                PromptKind::ActionFeedback,
                &serde_json::json!({"memory": [], "product": null}),
            )
            .unwrap();
        assert!(skipped.user.contains("not to buy anything"));
    }

    #[test]
    fn report_prompt_lists_results() {
        let engine = PromptEngine::builtin().unwrap();
        let prompt = engine
            .render(
                PromptKind::ResearchReport,
                &serde_json::json!({
                    "name": "Course",
                    "description": "Exam prep",
                    "price": "RM350.00",
                    "query": "exam prep course malaysia",
                    "results": [{"title": "Rival", "snippet": "cheaper", "link": "https://rival.example"}],
                }),
            )
            .unwrap();
        assert!(prompt.user.contains("- Rival: cheaper (https://rival.example)"));
        assert!(prompt.system.contains("Cite"));
    }

    #[test]
    fn directory_overrides_replace_builtin() {
        let unique = format!(
            "marcom_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("agent_system.j2"), "Custom frame for {{ description }}").ok();

        let engine = PromptEngine::from_dir(&dir).unwrap();
        let prompt = engine
            .render(PromptKind::AgentDecision, &decision_context())
            .unwrap();
        assert!(prompt.system.starts_with("Custom frame for You are"));
        assert!(prompt.user.contains("Available actions"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_directory_falls_back_to_builtin() {
        let engine = PromptEngine::from_dir("/nonexistent/marcom/templates");
        assert!(engine.is_ok());
    }
}
