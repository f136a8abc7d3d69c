use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::component::{Action, Command, ComponentRegistry, ExecResult};
use crate::config::{ActivationMode, Config};
use crate::llm::{ChatMessage, FunctionDefinition, LlmClient, ToolDefinition};
use crate::platform::onebot::{OneBotClient, OneBotReplySink};
use crate::platform::{ChatContext, ChatEvent};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub registry: ComponentRegistry,
    pub llm: Arc<LlmClient>,
    pub onebot: Arc<OneBotClient>,
}

/// Handle one chat event on its own task: commands may intercept the
/// message; otherwise group messages are screened for autonomous actions.
pub async fn handle_event(state: Arc<AppState>, event: ChatEvent) {
    let prefix = &state.config.logging.prefix;
    if state.config.logging.include_user_info {
        info!(
            "{} message from {} ({}): {}",
            prefix, event.user_name, event.user_id, event.text
        );
    } else {
        debug!("{} message received", prefix);
    }

    let sink = Arc::new(OneBotReplySink::for_event(state.onebot.clone(), &event));
    let ctx = ChatContext::from_event(&event, sink);

    // Commands first; the first match intercepts the message.
    for command in state.registry.commands() {
        if let Some(result) = command.run(&ctx, &event.text).await {
            log_outcome(&state.config, command.info().name, &result);
            return;
        }
    }

    // Autonomous actions only ever fire in group chats.
    if !ctx.is_group() {
        return;
    }

    for action in state.registry.actions() {
        let spec = action.activation();
        let screened = match state.config.smart_remove.activation_mode {
            ActivationMode::Keyword => keyword_hit(&spec.keywords, &event.text),
            ActivationMode::Judge => true,
        };
        if !screened {
            continue;
        }

        match judge(&state.llm, action.as_ref(), &event).await {
            Ok(Some(params)) => {
                let result = action.execute(&ctx, params).await;
                log_outcome(&state.config, action.info().name, &result);
            }
            Ok(None) => {
                debug!("{} judge declined action {}", prefix, action.info().name);
            }
            // The autonomous path never surfaces transport noise into chat.
            Err(err) => {
                error!(
                    "{} judge round failed for {}: {:#}",
                    prefix,
                    action.info().name,
                    err
                );
            }
        }
    }
}

/// Case-insensitive containment against the activation keyword list.
fn keyword_hit(keywords: &[String], text: &str) -> bool {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// One tool-call round: the action is exposed as a tool and only an
/// explicit call with parameters executes it.
async fn judge(
    llm: &LlmClient,
    action: &dyn Action,
    event: &ChatEvent,
) -> anyhow::Result<Option<Value>> {
    let info = action.info();
    let spec = action.activation();

    let mut prompt = spec.judge_prompt.clone();
    if !spec.require.is_empty() {
        prompt.push_str("\n\n使用时机：\n");
        for note in spec.require {
            prompt.push_str(&format!("- {note}\n"));
        }
    }

    let messages = [
        ChatMessage::system(prompt),
        ChatMessage::user(format!(
            "{}（{}）说：{}",
            event.user_name, event.user_id, event.text
        )),
    ];
    let tools = [ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: info.name.to_string(),
            description: info.description.to_string(),
            parameters: spec.parameters.clone(),
        },
    }];

    let response = llm.chat(&messages, &tools).await?;
    let Some(tool_calls) = response.tool_calls else {
        return Ok(None);
    };
    for tool_call in &tool_calls {
        if tool_call.function.name == info.name {
            let params: Value = serde_json::from_str(&tool_call.function.arguments)
                .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
            return Ok(Some(params));
        }
    }
    Ok(None)
}

fn log_outcome(config: &Config, name: &str, result: &ExecResult) {
    let prefix = &config.logging.prefix;
    if config.logging.include_action_info {
        info!(
            "{} {} finished: success={} report={}",
            prefix, name, result.success, result.report
        );
    } else {
        info!("{} {} finished: success={}", prefix, name, result.success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let list = keywords(&["踢人", "kick"]);
        assert!(keyword_hit(&list, "请把他踢人出去"));
        assert!(keyword_hit(&list, "KICK him"));
        assert!(!keyword_hit(&list, "大家好"));
    }

    #[test]
    fn empty_keyword_list_never_hits() {
        assert!(!keyword_hit(&[], "kick"));
    }
}
