use tracing::info;

use crate::error::ModerationError;
use crate::moderation::dispatch::{RemovalDispatcher, RemovalRequest};
use crate::moderation::identity::TargetResolver;
use crate::moderation::permissions;
use crate::platform::ChatContext;

/// Which allow-list gates an invocation.
pub enum Gate<'a> {
    /// Command path: the invoking user must be allowed.
    User { allowed: &'a [String] },
    /// Action path: group chats only, and the group must be allowed.
    Group { allowed: &'a [String] },
}

impl Gate<'_> {
    fn check(&self, log_prefix: &str, ctx: &ChatContext) -> Result<(), ModerationError> {
        match self {
            Gate::User { allowed } => permissions::check_user(log_prefix, ctx, allowed),
            Gate::Group { allowed } => permissions::check_group(log_prefix, ctx, allowed),
        }
    }
}

/// Everything a surface binds before running one removal.
pub struct RemovalFlow<'a> {
    pub log_prefix: &'a str,
    pub gate: Gate<'a>,
    pub resolver: &'a TargetResolver,
    pub dispatcher: &'a dyn RemovalDispatcher,
    pub reject_add_request: bool,
}

/// The permission-gated removal flow shared by the action and both
/// commands: PERMISSION_CHECK → TARGET_RESOLUTION → DISPATCH. Each stage
/// either advances or returns its terminal error; no stage is revisited.
/// Emitting the outcome message stays with the caller, which knows its
/// surface's voice.
///
/// Returns the resolved member id on success.
pub async fn run_removal(
    flow: &RemovalFlow<'_>,
    ctx: &ChatContext,
    target: &str,
) -> Result<String, ModerationError> {
    flow.gate.check(flow.log_prefix, ctx)?;

    let group_id = ctx
        .group_id
        .as_deref()
        .ok_or(ModerationError::MissingContext("group id"))?;

    let member_id = flow.resolver.resolve(group_id, target).await?;

    let request = RemovalRequest {
        platform: ctx.platform.clone(),
        group_id: group_id.to_string(),
        user_id: member_id.clone(),
        reject_add_request: flow.reject_add_request,
    };
    flow.dispatcher.dispatch(&request).await?;

    info!(
        "{} removed {}({}) from group {}",
        flow.log_prefix, target, member_id, request.group_id
    );
    Ok(member_id)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::moderation::identity::PersonLookup;
    use crate::platform::ReplySink;

    struct NullSink;

    #[async_trait]
    impl ReplySink for NullSink {
        async fn send_text(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    struct OneEntryLookup;

    #[async_trait]
    impl PersonLookup for OneEntryLookup {
        async fn user_id_by_name(&self, _group_id: &str, name: &str) -> Result<Option<String>> {
            Ok((name == "张三").then(|| "123456".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        requests: Mutex<Vec<RemovalRequest>>,
    }

    #[async_trait]
    impl RemovalDispatcher for RecordingDispatcher {
        async fn dispatch(&self, request: &RemovalRequest) -> Result<(), ModerationError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn ctx(group_id: Option<&str>) -> ChatContext {
        ChatContext {
            platform: "qq".to_string(),
            user_id: "777".to_string(),
            user_name: "operator".to_string(),
            group_id: group_id.map(str::to_string),
            replies: Arc::new(NullSink),
        }
    }

    fn flow<'a>(
        gate: Gate<'a>,
        resolver: &'a TargetResolver,
        dispatcher: &'a RecordingDispatcher,
    ) -> RemovalFlow<'a> {
        RemovalFlow {
            log_prefix: "[test]",
            gate,
            resolver,
            dispatcher,
            reject_add_request: true,
        }
    }

    #[tokio::test]
    async fn happy_path_dispatches_the_resolved_member() {
        let resolver = TargetResolver::ByName(Arc::new(OneEntryLookup));
        let dispatcher = RecordingDispatcher::default();
        let flow = flow(Gate::User { allowed: &[] }, &resolver, &dispatcher);

        let member_id = run_removal(&flow, &ctx(Some("20002")), "张三").await.unwrap();
        assert_eq!(member_id, "123456");

        let requests = dispatcher.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![RemovalRequest {
                platform: "qq".to_string(),
                group_id: "20002".to_string(),
                user_id: "123456".to_string(),
                reject_add_request: true,
            }]
        );
    }

    #[tokio::test]
    async fn denied_caller_never_reaches_the_dispatcher() {
        let resolver = TargetResolver::ByName(Arc::new(OneEntryLookup));
        let dispatcher = RecordingDispatcher::default();
        let allowed = vec!["qq:999".to_string()];
        let flow = flow(Gate::User { allowed: &allowed }, &resolver, &dispatcher);

        let err = run_removal(&flow, &ctx(Some("20002")), "张三").await.unwrap_err();
        assert!(matches!(err, ModerationError::PermissionDenied(_)));
        assert!(dispatcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_never_reaches_the_dispatcher() {
        let resolver = TargetResolver::ByName(Arc::new(OneEntryLookup));
        let dispatcher = RecordingDispatcher::default();
        let flow = flow(Gate::User { allowed: &[] }, &resolver, &dispatcher);

        let err = run_removal(&flow, &ctx(Some("20002")), "李四").await.unwrap_err();
        assert!(matches!(err, ModerationError::TargetNotFound(_)));
        assert!(dispatcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_group_is_its_own_terminal_state() {
        let resolver = TargetResolver::DirectId;
        let dispatcher = RecordingDispatcher::default();
        let flow = flow(Gate::User { allowed: &[] }, &resolver, &dispatcher);

        let err = run_removal(&flow, &ctx(None), "123456").await.unwrap_err();
        assert!(matches!(err, ModerationError::MissingContext(_)));
        assert!(dispatcher.requests.lock().unwrap().is_empty());
    }
}
