use tracing::{info, warn};

use crate::error::ModerationError;
use crate::platform::ChatContext;

/// True when the allow-list authorizes `platform:subject_id`.
///
/// An empty list authorizes everyone; the fail-open default is documented
/// behavior, not an oversight. A non-empty list requires an exact match.
pub fn allow_list_permits(
    log_prefix: &str,
    platform: &str,
    subject_id: &str,
    allow_list: &[String],
) -> bool {
    if allow_list.is_empty() {
        info!("{log_prefix} allow-list is empty, authorizing {platform}:{subject_id}");
        return true;
    }
    let key = format!("{platform}:{subject_id}");
    if allow_list.iter().any(|entry| *entry == key) {
        info!("{log_prefix} {key} is on the allow-list");
        true
    } else {
        warn!("{log_prefix} {key} is not on the allow-list");
        false
    }
}

/// Gate for the autonomous action path: group chats only, then the group
/// allow-list. Direct chats get their own denial reason.
pub fn check_group(
    log_prefix: &str,
    ctx: &ChatContext,
    allowed_groups: &[String],
) -> Result<(), ModerationError> {
    let Some(group_id) = ctx.group_id.as_deref() else {
        return Err(ModerationError::PermissionDenied(
            "踢人动作只能在群聊中使用".to_string(),
        ));
    };
    if allow_list_permits(log_prefix, &ctx.platform, group_id, allowed_groups) {
        Ok(())
    } else {
        Err(ModerationError::PermissionDenied(
            "当前群组没有使用踢人动作的权限".to_string(),
        ))
    }
}

/// Gate for the command path: the invoking user's allow-list.
pub fn check_user(
    log_prefix: &str,
    ctx: &ChatContext,
    allowed_users: &[String],
) -> Result<(), ModerationError> {
    if allow_list_permits(log_prefix, &ctx.platform, &ctx.user_id, allowed_users) {
        Ok(())
    } else {
        Err(ModerationError::PermissionDenied(
            "你没有使用踢人命令的权限".to_string(),
        ))
    }
}
