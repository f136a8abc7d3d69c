use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::ModerationError;
use crate::platform::onebot::OneBotClient;

/// One removal, fully specified. Sent exactly once; never retried. A
/// transient failure is reported to the chat and the operator may re-invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalRequest {
    pub platform: String,
    pub group_id: String,
    pub user_id: String,
    pub reject_add_request: bool,
}

/// The side-effecting seam. Two interchangeable implementations cover the
/// two shapes the host offers: the internal command bus and the direct
/// admin HTTP endpoint.
#[async_trait]
pub trait RemovalDispatcher: Send + Sync {
    async fn dispatch(&self, request: &RemovalRequest) -> Result<(), ModerationError>;
}

/// Command tags the group command bus understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupCommand {
    Remove,
}

impl GroupCommand {
    pub fn tag(self) -> &'static str {
        match self {
            GroupCommand::Remove => "GROUP_REMOVE",
        }
    }
}

/// Internal dispatch surface the host offers plugins. Returns plain
/// success; the detail of how the command reaches the platform is the
/// bus implementation's business.
#[async_trait]
pub trait GroupCommandBus: Send + Sync {
    async fn command_to_group(
        &self,
        command: GroupCommand,
        platform: &str,
        group_id: &str,
        member_id: &str,
    ) -> anyhow::Result<bool>;
}

/// The production bus: maps bus commands onto the admin endpoint, the
/// same indirection the host's send API performs.
pub struct AdminApiBus {
    client: Arc<OneBotClient>,
    reject_add_request: bool,
}

impl AdminApiBus {
    pub fn new(client: Arc<OneBotClient>, reject_add_request: bool) -> Self {
        Self {
            client,
            reject_add_request,
        }
    }
}

#[async_trait]
impl GroupCommandBus for AdminApiBus {
    async fn command_to_group(
        &self,
        command: GroupCommand,
        _platform: &str,
        group_id: &str,
        member_id: &str,
    ) -> anyhow::Result<bool> {
        match command {
            GroupCommand::Remove => {
                self.client
                    .set_group_kick(group_id, member_id, self.reject_add_request)
                    .await?;
                Ok(true)
            }
        }
    }
}

/// Removal via the internal command bus.
pub struct GroupCommandDispatcher {
    bus: Arc<dyn GroupCommandBus>,
}

impl GroupCommandDispatcher {
    pub fn new(bus: Arc<dyn GroupCommandBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl RemovalDispatcher for GroupCommandDispatcher {
    async fn dispatch(&self, request: &RemovalRequest) -> Result<(), ModerationError> {
        let sent = self
            .bus
            .command_to_group(
                GroupCommand::Remove,
                &request.platform,
                &request.group_id,
                &request.user_id,
            )
            .await
            .map_err(|err| ModerationError::Dispatch(format!("{err:#}")))?;
        if sent {
            info!(
                "Sent {} for member {} in group {}",
                GroupCommand::Remove.tag(),
                request.user_id,
                request.group_id
            );
            Ok(())
        } else {
            Err(ModerationError::Dispatch(format!(
                "command bus refused {}",
                GroupCommand::Remove.tag()
            )))
        }
    }
}

/// Removal via a direct POST to the admin endpoint.
pub struct HttpKickDispatcher {
    client: Arc<OneBotClient>,
}

impl HttpKickDispatcher {
    pub fn new(client: Arc<OneBotClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemovalDispatcher for HttpKickDispatcher {
    async fn dispatch(&self, request: &RemovalRequest) -> Result<(), ModerationError> {
        self.client
            .set_group_kick(
                &request.group_id,
                &request.user_id,
                request.reject_add_request,
            )
            .await
            .map_err(|err| ModerationError::Dispatch(format!("{err:#}")))?;
        info!(
            "Kicked member {} from group {} via admin endpoint",
            request.user_id, request.group_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header;
    use axum::routing::post;
    use axum::Router;

    use super::*;
    use crate::config::ApiConfig;

    /// Serves a fixed JSON body for `/set_group_kick` on an ephemeral port.
    async fn admin_stub(body: &'static str) -> String {
        let app = Router::new().route(
            "/set_group_kick",
            post(move || async move { ([(header::CONTENT_TYPE, "application/json")], body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String) -> Arc<OneBotClient> {
        Arc::new(
            OneBotClient::new(&ApiConfig {
                base_url,
                timeout_secs: 2,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn http_dispatch_succeeds_on_ok_body() {
        let base_url = admin_stub(r#"{"status":"ok","retcode":0}"#).await;
        let dispatcher = HttpKickDispatcher::new(client_for(base_url));
        assert!(dispatcher.dispatch(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn http_dispatch_fails_on_failed_body_despite_http_200() {
        let base_url = admin_stub(r#"{"status":"failed","retcode":1}"#).await;
        let dispatcher = HttpKickDispatcher::new(client_for(base_url));
        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, ModerationError::Dispatch(_)));
    }

    #[tokio::test]
    async fn http_dispatch_fails_when_the_endpoint_is_unreachable() {
        // Nothing listens here; the transport error must come back as a
        // dispatch failure, not a panic.
        let dispatcher = HttpKickDispatcher::new(client_for("http://127.0.0.1:9".to_string()));
        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, ModerationError::Dispatch(_)));
    }

    fn request() -> RemovalRequest {
        RemovalRequest {
            platform: "qq".to_string(),
            group_id: "20002".to_string(),
            user_id: "123456".to_string(),
            reject_add_request: false,
        }
    }

    enum BusBehavior {
        Accept,
        Refuse,
        Fail,
    }

    struct FakeBus {
        behavior: BusBehavior,
    }

    #[async_trait]
    impl GroupCommandBus for FakeBus {
        async fn command_to_group(
            &self,
            command: GroupCommand,
            _platform: &str,
            _group_id: &str,
            _member_id: &str,
        ) -> anyhow::Result<bool> {
            assert_eq!(command.tag(), "GROUP_REMOVE");
            match self.behavior {
                BusBehavior::Accept => Ok(true),
                BusBehavior::Refuse => Ok(false),
                BusBehavior::Fail => anyhow::bail!("adapter unreachable"),
            }
        }
    }

    #[tokio::test]
    async fn bus_acceptance_is_success() {
        let dispatcher = GroupCommandDispatcher::new(Arc::new(FakeBus {
            behavior: BusBehavior::Accept,
        }));
        assert!(dispatcher.dispatch(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn bus_refusal_is_a_dispatch_failure() {
        let dispatcher = GroupCommandDispatcher::new(Arc::new(FakeBus {
            behavior: BusBehavior::Refuse,
        }));
        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, ModerationError::Dispatch(_)));
    }

    #[tokio::test]
    async fn bus_transport_errors_are_dispatch_failures() {
        let dispatcher = GroupCommandDispatcher::new(Arc::new(FakeBus {
            behavior: BusBehavior::Fail,
        }));
        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        match err {
            ModerationError::Dispatch(detail) => assert!(detail.contains("unreachable")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
