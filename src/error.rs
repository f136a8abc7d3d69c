use thiserror::Error;

/// Classification of everything that can go wrong while removing a member.
///
/// Every variant is recoverable: it is logged where it is detected, turned
/// into one chat-visible message, and reported back to the host as a failed
/// result. Nothing here ever takes the process down.
#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no removal target was given")]
    MissingTarget,

    #[error("could not resolve '{0}' to a member id")]
    TargetNotFound(String),

    #[error("missing context: {0}")]
    MissingContext(&'static str),

    #[error("removal dispatch failed: {0}")]
    Dispatch(String),

    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

impl ModerationError {
    /// The chat-visible message for this failure. Dispatch and fault details
    /// stay in the logs; the chat only sees the generic text.
    pub fn user_message(&self) -> String {
        match self {
            ModerationError::PermissionDenied(reason) => reason.clone(),
            ModerationError::MissingTarget => "没有指定踢人对象呢~".to_string(),
            ModerationError::TargetNotFound(target) => {
                format!("找不到 {target} 这个人呢~")
            }
            ModerationError::MissingContext(_) => "无法获取群聊ID".to_string(),
            ModerationError::Dispatch(_) => "发送踢人命令失败".to_string(),
            ModerationError::Unexpected(detail) => {
                format!("踢人命令错误: {detail}")
            }
        }
    }
}

impl From<anyhow::Error> for ModerationError {
    fn from(err: anyhow::Error) -> Self {
        ModerationError::Unexpected(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_not_found_names_the_target() {
        let err = ModerationError::TargetNotFound("李四".to_string());
        assert_eq!(err.user_message(), "找不到 李四 这个人呢~");
    }

    #[test]
    fn dispatch_detail_stays_out_of_chat() {
        let err = ModerationError::Dispatch("connect timeout".to_string());
        assert!(!err.user_message().contains("timeout"));
    }

    #[test]
    fn permission_denial_reason_is_shown_verbatim() {
        let err = ModerationError::PermissionDenied("你没有使用踢人命令的权限".to_string());
        assert_eq!(err.user_message(), "你没有使用踢人命令的权限");
    }
}
