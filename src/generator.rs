use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::llm::{ChatMessage, LlmClient};

/// Persona paraphrase collaborator for the autonomous action path.
///
/// `None` means "use the raw text". The rewrite is a garnish and must
/// never block a removal, so every failure shape degrades to `None`.
#[async_trait]
pub trait ReplyRewriter: Send + Sync {
    async fn rewrite(&self, raw_reply: &str, reason: &str) -> Option<String>;
}

/// Asks the configured chat model to restate the reply in the bot's voice.
pub struct LlmRewriter {
    llm: Arc<LlmClient>,
}

impl LlmRewriter {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ReplyRewriter for LlmRewriter {
    async fn rewrite(&self, raw_reply: &str, reason: &str) -> Option<String> {
        let messages = [
            ChatMessage::system(
                "你是群里的机器人群友。把下面这句话换成你自己的口吻说出来，\
                 保持原意，不要添加额外内容，只输出改写后的句子。",
            ),
            ChatMessage::user(format!("原句：{raw_reply}\n情境：{reason}")),
        ];

        match self.llm.chat(&messages, &[]).await {
            Ok(response) => {
                let content = response.content.unwrap_or_default();
                let content = content.trim();
                if content.is_empty() {
                    None
                } else {
                    Some(content.to_string())
                }
            }
            Err(err) => {
                warn!("Reply rewrite failed, falling back to raw text: {err:#}");
                None
            }
        }
    }
}
