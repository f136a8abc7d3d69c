use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::component::{Action, ActivationSpec, ComponentInfo, ExecResult};
use crate::config::Config;
use crate::error::ModerationError;
use crate::generator::ReplyRewriter;
use crate::moderation::dispatch::RemovalDispatcher;
use crate::moderation::engine::{self, Gate, RemovalFlow};
use crate::moderation::identity::{PersonLookup, TargetResolver};
use crate::moderation::templates;
use crate::platform::ChatContext;

pub const ACTION_NAME: &str = "remove_user";

/// Usage notes handed to the judge model alongside the policy prompt.
const ACTION_REQUIRE: &[&str] = &[
    "当有人严重违反群规时使用",
    "当有人发了擦边，或者色情内容时使用",
    "当有人要求踢出自己时使用",
    "如果某人已经被踢出群聊了，就不要再次操作",
];

/// The autonomous removal surface. The judge model decides when it fires
/// and supplies `target`/`reason`; execution gates on the group allow-list.
pub struct RemoveUserAction {
    log_prefix: String,
    allowed_groups: Vec<String>,
    templates: Vec<String>,
    default_reason: String,
    reject_add_request: bool,
    resolver: TargetResolver,
    dispatcher: Arc<dyn RemovalDispatcher>,
    rewriter: Arc<dyn ReplyRewriter>,
    spec: ActivationSpec,
}

impl RemoveUserAction {
    pub fn new(
        config: &Config,
        lookup: Arc<dyn PersonLookup>,
        dispatcher: Arc<dyn RemovalDispatcher>,
        rewriter: Arc<dyn ReplyRewriter>,
    ) -> Self {
        let spec = ActivationSpec {
            keywords: config.smart_remove.activation_keywords.clone(),
            judge_prompt: config.smart_remove.judge_prompt.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "踢人对象，必填，输入你要踢出的对象的名字，请仔细思考不要弄错对象"
                    },
                    "reason": {
                        "type": "string",
                        "description": "踢人理由，可选"
                    }
                },
                "required": ["target"]
            }),
            require: ACTION_REQUIRE,
        };

        Self {
            log_prefix: config.logging.prefix.clone(),
            allowed_groups: config.permissions.allowed_groups.clone(),
            templates: config.removal.templates.clone(),
            default_reason: config.removal.default_reason.clone(),
            reject_add_request: config.removal.reject_add_request,
            resolver: TargetResolver::ByName(lookup),
            dispatcher,
            rewriter,
            spec,
        }
    }

    /// The action path never propagates emit failures; a lost reply is
    /// logged and the outcome stands.
    async fn send(&self, ctx: &ChatContext, text: &str) {
        if let Err(err) = ctx.replies.send_text(text).await {
            error!("{} failed to send reply: {:#}", self.log_prefix, err);
        }
    }
}

#[async_trait]
impl Action for RemoveUserAction {
    fn info(&self) -> ComponentInfo {
        ComponentInfo {
            name: ACTION_NAME,
            description: "智能踢人系统，基于LLM判断是否需要踢人",
        }
    }

    fn activation(&self) -> &ActivationSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &ChatContext, params: Value) -> ExecResult {
        info!("{} executing smart remove action", self.log_prefix);

        let target = params
            .get("target")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let Some(target) = target else {
            let err = ModerationError::MissingTarget;
            error!("{} {}", self.log_prefix, err);
            self.send(ctx, &err.user_message()).await;
            return ExecResult::failed(err.to_string());
        };

        let reason = params
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_reason)
            .to_string();

        let flow = RemovalFlow {
            log_prefix: &self.log_prefix,
            gate: Gate::Group {
                allowed: &self.allowed_groups,
            },
            resolver: &self.resolver,
            dispatcher: self.dispatcher.as_ref(),
            reject_add_request: self.reject_add_request,
        };

        match engine::run_removal(&flow, ctx, &target).await {
            Ok(member_id) => {
                let raw = templates::compose(&self.templates, &target, &reason);
                let message = self
                    .rewriter
                    .rewrite(&raw, &reason)
                    .await
                    .unwrap_or(raw);
                self.send(ctx, &message).await;
                info!(
                    "{} removed {}({}), reason: {}",
                    self.log_prefix, target, member_id, reason
                );
                ExecResult::ok(format!("成功踢出 {target}"))
            }
            Err(err) => {
                warn!("{} smart remove failed: {}", self.log_prefix, err);
                let text = match &err {
                    ModerationError::PermissionDenied(_) => {
                        let raw = format!("我想踢出{target}，但是我没有权限");
                        self.rewriter
                            .rewrite(&raw, "表达自己没有在这个群踢人的能力")
                            .await
                            .unwrap_or(raw)
                    }
                    ModerationError::MissingContext(_) => {
                        "执行踢人动作失败（群ID缺失）".to_string()
                    }
                    ModerationError::Dispatch(_) => "执行踢人动作失败".to_string(),
                    other => other.user_message(),
                };
                self.send(ctx, &text).await;
                ExecResult::failed(err.to_string())
            }
        }
    }
}
