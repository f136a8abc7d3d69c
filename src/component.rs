use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::platform::ChatContext;

/// Descriptive metadata for a registered component.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// The `(success, message)` pair a component hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    pub success: bool,
    pub report: String,
}

impl ExecResult {
    pub fn ok(report: impl Into<String>) -> Self {
        Self {
            success: true,
            report: report.into(),
        }
    }

    pub fn failed(report: impl Into<String>) -> Self {
        Self {
            success: false,
            report: report.into(),
        }
    }
}

/// How the host decides whether an action fires for a group message.
///
/// The keywords are a cheap pre-filter; on a hit the judge model is asked
/// with the action exposed as a tool, and only a tool call executes it.
pub struct ActivationSpec {
    pub keywords: Vec<String>,
    pub judge_prompt: String,
    /// JSON schema of the parameters the judge must supply.
    pub parameters: Value,
    /// Usage notes appended to the judge prompt.
    pub require: &'static [&'static str],
}

/// An autonomous component the model may invoke against chat content.
#[async_trait]
pub trait Action: Send + Sync {
    fn info(&self) -> ComponentInfo;

    fn activation(&self) -> &ActivationSpec;

    /// Runs the action with judge-supplied parameters.
    async fn execute(&self, ctx: &ChatContext, params: Value) -> ExecResult;
}

/// An operator-facing slash command.
#[async_trait]
pub trait Command: Send + Sync {
    fn info(&self) -> ComponentInfo;

    /// Runs the command if `text` matches its grammar. `None` means the
    /// message is not for this command and stays visible to later handlers;
    /// `Some` means the message was intercepted and handled.
    async fn run(&self, ctx: &ChatContext, text: &str) -> Option<ExecResult>;
}

/// Explicit plugin table built once at startup. Components are plain trait
/// objects; there is no discovery beyond what gets registered here.
#[derive(Default)]
pub struct ComponentRegistry {
    actions: Vec<Arc<dyn Action>>,
    commands: Vec<Arc<dyn Command>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(&mut self, action: Arc<dyn Action>) {
        let info = action.info();
        info!("Registered action: {} — {}", info.name, info.description);
        self.actions.push(action);
    }

    pub fn register_command(&mut self, command: Arc<dyn Command>) {
        let info = command.info();
        info!("Registered command: {} — {}", info.name, info.description);
        self.commands.push(command);
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopAction {
        spec: ActivationSpec,
    }

    #[async_trait]
    impl Action for NoopAction {
        fn info(&self) -> ComponentInfo {
            ComponentInfo {
                name: "noop",
                description: "does nothing",
            }
        }

        fn activation(&self) -> &ActivationSpec {
            &self.spec
        }

        async fn execute(&self, _ctx: &ChatContext, _params: Value) -> ExecResult {
            ExecResult::ok("noop")
        }
    }

    #[test]
    fn registry_tracks_registered_components() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.is_empty());

        registry.register_action(Arc::new(NoopAction {
            spec: ActivationSpec {
                keywords: vec!["x".to_string()],
                judge_prompt: String::new(),
                parameters: json!({}),
                require: &[],
            },
        }));

        assert_eq!(registry.actions().len(), 1);
        assert!(registry.commands().is_empty());
        assert!(!registry.is_empty());
    }
}
