pub mod onebot;

use std::sync::Arc;

use async_trait::async_trait;

/// A chat message event received from the protocol adapter
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Platform identifier (e.g., "qq")
    pub platform: String,
    /// Platform-specific user ID as string
    pub user_id: String,
    /// Display name of the sender (group card first, then nickname)
    pub user_name: String,
    /// Group ID, absent for direct chats
    pub group_id: Option<String>,
    /// The message text
    pub text: String,
}

/// Outbound reply seam. Each invocation gets a sink already bound to the
/// chat the triggering message came from.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
}

/// Per-invocation context handed to components. Lives for exactly one
/// execution and owns no state beyond these identifiers.
#[derive(Clone)]
pub struct ChatContext {
    pub platform: String,
    pub user_id: String,
    pub user_name: String,
    pub group_id: Option<String>,
    pub replies: Arc<dyn ReplySink>,
}

impl ChatContext {
    pub fn from_event(event: &ChatEvent, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            platform: event.platform.clone(),
            user_id: event.user_id.clone(),
            user_name: event.user_name.clone(),
            group_id: event.group_id.clone(),
            replies,
        }
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }
}
