use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::component::{Command, ComponentInfo, ExecResult};
use crate::config::Config;
use crate::error::ModerationError;
use crate::moderation::dispatch::RemovalDispatcher;
use crate::moderation::engine::{self, Gate, RemovalFlow};
use crate::moderation::identity::{PersonLookup, TargetResolver};
use crate::moderation::templates;
use crate::platform::ChatContext;

/// What the target token of a verb may look like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetGrammar {
    /// Any display name.
    FreeText,
    /// A platform member id, digits only.
    Numeric,
}

/// One operator removal command. Both verbs share this shape and differ
/// only in target grammar, resolver and dispatcher, so they are one type
/// constructed two ways.
pub struct ModCommand {
    info: ComponentInfo,
    verb: &'static str,
    grammar: TargetGrammar,
    log_prefix: String,
    allowed_users: Vec<String>,
    templates: Vec<String>,
    default_reason: String,
    reject_add_request: bool,
    resolver: TargetResolver,
    dispatcher: Arc<dyn RemovalDispatcher>,
}

impl ModCommand {
    /// `/remove <用户名> [理由]`: name-based removal through the command bus.
    pub fn remove_user(
        config: &Config,
        lookup: Arc<dyn PersonLookup>,
        dispatcher: Arc<dyn RemovalDispatcher>,
    ) -> Self {
        Self {
            info: ComponentInfo {
                name: "remove_user_command",
                description: "踢人命令，手动执行踢人操作",
            },
            verb: "/remove",
            grammar: TargetGrammar::FreeText,
            log_prefix: config.logging.prefix.clone(),
            allowed_users: config.permissions.allowed_users.clone(),
            templates: config.removal.templates.clone(),
            default_reason: config.removal.command_default_reason.clone(),
            reject_add_request: config.removal.reject_add_request,
            resolver: TargetResolver::ByName(lookup),
            dispatcher,
        }
    }

    /// `/kick <QQ号> [理由]`: the id-addressed variant going straight at
    /// the admin endpoint.
    pub fn kick(config: &Config, dispatcher: Arc<dyn RemovalDispatcher>) -> Self {
        Self {
            info: ComponentInfo {
                name: "kick_command",
                description: "按QQ号踢人，直接调用管理接口",
            },
            verb: "/kick",
            grammar: TargetGrammar::Numeric,
            log_prefix: config.logging.prefix.clone(),
            allowed_users: config.permissions.allowed_users.clone(),
            templates: config.removal.templates.clone(),
            default_reason: config.removal.command_default_reason.clone(),
            reject_add_request: config.removal.reject_add_request,
            resolver: TargetResolver::DirectId,
            dispatcher,
        }
    }

    /// `<verb> <target> [reason…]`; anything else is not this command.
    fn parse<'t>(&self, text: &'t str) -> Option<(&'t str, Option<&'t str>)> {
        let rest = text.strip_prefix(self.verb)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let target = parts.next().filter(|t| !t.is_empty())?;
        if self.grammar == TargetGrammar::Numeric
            && !target.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let reason = parts.next().map(str::trim).filter(|r| !r.is_empty());
        Some((target, reason))
    }

    fn denial_text(&self, err: &ModerationError, target: &str) -> String {
        match (err, self.grammar) {
            (ModerationError::TargetNotFound(_), TargetGrammar::FreeText) => format!(
                "找不到用户 {target} 的ID，请输入person_name进行踢人，而不是qq号或者昵称"
            ),
            _ => err.user_message(),
        }
    }

    async fn try_execute(
        &self,
        ctx: &ChatContext,
        target: &str,
        reason: Option<&str>,
    ) -> anyhow::Result<ExecResult> {
        let flow = RemovalFlow {
            log_prefix: &self.log_prefix,
            gate: Gate::User {
                allowed: &self.allowed_users,
            },
            resolver: &self.resolver,
            dispatcher: self.dispatcher.as_ref(),
            reject_add_request: self.reject_add_request,
        };

        match engine::run_removal(&flow, ctx, target).await {
            Ok(member_id) => {
                let reason = reason.unwrap_or(&self.default_reason);
                let message = templates::compose(&self.templates, target, reason);
                ctx.replies.send_text(&message).await?;
                info!(
                    "{} {} removed {}({})",
                    self.log_prefix, self.verb, target, member_id
                );
                Ok(ExecResult::ok(format!("成功踢出 {target}")))
            }
            Err(err) => {
                warn!("{} {} failed: {}", self.log_prefix, self.verb, err);
                let notice = format!("❌ {}", self.denial_text(&err, target));
                ctx.replies.send_text(&notice).await?;
                Ok(ExecResult::failed(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl Command for ModCommand {
    fn info(&self) -> ComponentInfo {
        self.info.clone()
    }

    async fn run(&self, ctx: &ChatContext, text: &str) -> Option<ExecResult> {
        let (target, reason) = self.parse(text)?;

        // Outer boundary: whatever goes wrong past parsing is caught here,
        // logged, and turned into a generic visible error.
        let result = match self.try_execute(ctx, target, reason).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "{} {} failed unexpectedly: {:#}",
                    self.log_prefix, self.verb, err
                );
                let fault = ModerationError::from(err);
                if let Err(send_err) = ctx
                    .replies
                    .send_text(&format!("❌ {}", fault.user_message()))
                    .await
                {
                    error!(
                        "{} failed to send error notice: {:#}",
                        self.log_prefix, send_err
                    );
                }
                ExecResult::failed(fault.to_string())
            }
        };
        Some(result)
    }
}
