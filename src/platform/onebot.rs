use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::bot::{self, AppState};
use crate::config::ApiConfig;
use crate::platform::{ChatEvent, ReplySink};

/// Response envelope of the admin HTTP API.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default = "missing_retcode")]
    pub retcode: i64,
    #[serde(default)]
    pub data: Value,
}

fn missing_retcode() -> i64 {
    -1
}

impl ApiResponse {
    /// Unambiguous success: body status `"ok"` and return code `0`.
    /// Anything else, including a well-formed "failed" body, is not.
    pub fn is_ok(&self) -> bool {
        self.status == "ok" && self.retcode == 0
    }
}

/// A group member as reported by `get_group_member_list`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMember {
    user_id: Value,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
}

impl GroupMember {
    pub fn user_id(&self) -> Option<String> {
        id_string(&self.user_id)
    }

    /// Display name: group card first, then nickname.
    pub fn display_name(&self) -> &str {
        if self.card.is_empty() {
            &self.nickname
        } else {
            &self.card
        }
    }
}

/// HTTP client for the protocol adapter's admin API. All calls share one
/// bounded timeout; a slow adapter delays the single reply, nothing more.
pub struct OneBotClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl OneBotClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    async fn call(&self, endpoint: &str, body: Value) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("Calling admin API: {}", url);

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {endpoint} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Admin API {endpoint} returned HTTP {status}");
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .with_context(|| format!("Malformed response from {endpoint}"))?;

        if !api_response.is_ok() {
            anyhow::bail!(
                "Admin API {endpoint} reported status '{}' retcode {}",
                api_response.status,
                api_response.retcode
            );
        }

        Ok(api_response)
    }

    pub async fn send_group_msg(&self, group_id: &str, text: &str) -> Result<()> {
        self.call(
            "send_group_msg",
            json!({ "group_id": group_id, "message": text }),
        )
        .await
        .map(|_| ())
    }

    pub async fn send_private_msg(&self, user_id: &str, text: &str) -> Result<()> {
        self.call(
            "send_private_msg",
            json!({ "user_id": user_id, "message": text }),
        )
        .await
        .map(|_| ())
    }

    /// The irreversible one. Success criterion is the strict triple:
    /// HTTP 2xx, body status "ok", retcode 0.
    pub async fn set_group_kick(
        &self,
        group_id: &str,
        user_id: &str,
        reject_add_request: bool,
    ) -> Result<()> {
        self.call(
            "set_group_kick",
            json!({
                "group_id": group_id,
                "user_id": user_id,
                "reject_add_request": reject_add_request,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn get_group_member_list(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let response = self
            .call("get_group_member_list", json!({ "group_id": group_id }))
            .await?;
        let members: Vec<GroupMember> = serde_json::from_value(response.data)
            .context("Malformed member list from get_group_member_list")?;
        Ok(members)
    }
}

/// Where a reply goes back to.
#[derive(Debug, Clone)]
pub enum ReplyTarget {
    Group(String),
    Private(String),
}

pub struct OneBotReplySink {
    client: Arc<OneBotClient>,
    target: ReplyTarget,
}

impl OneBotReplySink {
    pub fn new(client: Arc<OneBotClient>, target: ReplyTarget) -> Self {
        Self { client, target }
    }

    pub fn for_event(client: Arc<OneBotClient>, event: &ChatEvent) -> Self {
        let target = match &event.group_id {
            Some(group_id) => ReplyTarget::Group(group_id.clone()),
            None => ReplyTarget::Private(event.user_id.clone()),
        };
        Self::new(client, target)
    }
}

#[async_trait::async_trait]
impl ReplySink for OneBotReplySink {
    async fn send_text(&self, text: &str) -> Result<()> {
        match &self.target {
            ReplyTarget::Group(group_id) => self.client.send_group_msg(group_id, text).await,
            ReplyTarget::Private(user_id) => self.client.send_private_msg(user_id, text).await,
        }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Turns a raw adapter event into a `ChatEvent`. Non-message events and
/// messages without text yield `None`.
pub fn parse_event(raw: &Value) -> Option<ChatEvent> {
    if raw.get("post_type").and_then(Value::as_str) != Some("message") {
        return None;
    }

    let user_id = id_string(raw.get("user_id")?)?;
    let group_id = match raw.get("message_type").and_then(Value::as_str) {
        Some("group") => Some(id_string(raw.get("group_id")?)?),
        _ => None,
    };

    let text = raw
        .get("raw_message")
        .and_then(Value::as_str)
        .or_else(|| raw.get("message").and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }

    let sender = raw.get("sender");
    let card = sender
        .and_then(|s| s.get("card"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let nickname = sender
        .and_then(|s| s.get("nickname"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let user_name = if card.is_empty() { nickname } else { card }.to_string();

    Some(ChatEvent {
        platform: "qq".to_string(),
        user_id,
        user_name,
        group_id,
        text,
    })
}

/// Run the event webhook server. The protocol adapter POSTs every event
/// here; each message event is handled on its own task.
pub async fn run(state: Arc<AppState>, listen_addr: &str) -> Result<()> {
    let app = Router::new()
        .route("/", post(receive_event))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind event server to {listen_addr}"))?;

    info!("Listening for chat events on {}", listen_addr);
    axum::serve(listener, app)
        .await
        .context("Event server failed")?;
    Ok(())
}

async fn receive_event(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<Value>,
) -> StatusCode {
    match parse_event(&raw) {
        Some(event) => {
            tokio::spawn(async move {
                bot::handle_event(state, event).await;
            });
        }
        None => {
            debug!(
                "Ignoring non-message event: {:?}",
                raw.get("post_type").and_then(|v| v.as_str())
            );
        }
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_ok_status_and_zero_retcode() {
        let ok: ApiResponse = serde_json::from_str(r#"{"status":"ok","retcode":0}"#).unwrap();
        assert!(ok.is_ok());

        // HTTP 200 with a failed body is still a failure.
        let failed: ApiResponse =
            serde_json::from_str(r#"{"status":"failed","retcode":1}"#).unwrap();
        assert!(!failed.is_ok());

        let wrong_code: ApiResponse =
            serde_json::from_str(r#"{"status":"ok","retcode":100}"#).unwrap();
        assert!(!wrong_code.is_ok());

        let empty: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_ok());
    }

    #[test]
    fn group_message_event_is_parsed() {
        let raw = json!({
            "post_type": "message",
            "message_type": "group",
            "user_id": 10001,
            "group_id": 20002,
            "raw_message": "/remove 张三 违规",
            "sender": { "nickname": "张三", "card": "群名片" }
        });
        let event = parse_event(&raw).unwrap();
        assert_eq!(event.platform, "qq");
        assert_eq!(event.user_id, "10001");
        assert_eq!(event.group_id.as_deref(), Some("20002"));
        assert_eq!(event.user_name, "群名片");
        assert_eq!(event.text, "/remove 张三 违规");
    }

    #[test]
    fn private_message_has_no_group() {
        let raw = json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": "10001",
            "raw_message": "hello",
            "sender": { "nickname": "someone" }
        });
        let event = parse_event(&raw).unwrap();
        assert!(event.group_id.is_none());
        assert_eq!(event.user_name, "someone");
    }

    #[test]
    fn non_message_events_are_ignored() {
        let raw = json!({ "post_type": "meta_event", "meta_event_type": "heartbeat" });
        assert!(parse_event(&raw).is_none());

        let no_text = json!({
            "post_type": "message",
            "message_type": "group",
            "user_id": 1,
            "group_id": 2,
            "raw_message": ""
        });
        assert!(parse_event(&no_text).is_none());
    }

    #[test]
    fn member_ids_normalize_to_strings() {
        let member: GroupMember = serde_json::from_value(json!({
            "user_id": 123456,
            "nickname": "李四",
            "card": ""
        }))
        .unwrap();
        assert_eq!(member.user_id().as_deref(), Some("123456"));
        assert_eq!(member.display_name(), "李四");
    }
}
