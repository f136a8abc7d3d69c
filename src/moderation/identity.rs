use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ModerationError;
use crate::platform::onebot::OneBotClient;

/// Identity lookup collaborator: display name → platform member id.
#[async_trait]
pub trait PersonLookup: Send + Sync {
    async fn user_id_by_name(&self, group_id: &str, name: &str) -> Result<Option<String>>;
}

/// Resolves names against the live group member list, matching the group
/// card first and the nickname second.
pub struct GroupMemberLookup {
    client: Arc<OneBotClient>,
}

impl GroupMemberLookup {
    pub fn new(client: Arc<OneBotClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PersonLookup for GroupMemberLookup {
    async fn user_id_by_name(&self, group_id: &str, name: &str) -> Result<Option<String>> {
        let members = self.client.get_group_member_list(group_id).await?;
        debug!("Resolving '{}' against {} group members", name, members.len());
        let found = members
            .iter()
            .find(|m| m.display_name() == name)
            .or_else(|| members.iter().find(|m| m.nickname == name));
        Ok(found.and_then(|m| m.user_id()))
    }
}

/// How a target token becomes the member id the dispatcher needs.
pub enum TargetResolver {
    /// Display name, resolved through an identity lookup.
    ByName(Arc<dyn PersonLookup>),
    /// The token already is the platform member id.
    DirectId,
}

impl TargetResolver {
    pub async fn resolve(
        &self,
        group_id: &str,
        target: &str,
    ) -> Result<String, ModerationError> {
        match self {
            TargetResolver::ByName(lookup) => {
                let user_id = match lookup.user_id_by_name(group_id, target).await {
                    Ok(id) => id,
                    Err(err) => {
                        warn!("Identity lookup for '{}' failed: {:#}", target, err);
                        None
                    }
                };
                match user_id {
                    // "unknown" is the lookup backend's miss sentinel.
                    Some(id) if !id.is_empty() && id != "unknown" => Ok(id),
                    _ => Err(ModerationError::TargetNotFound(target.to_string())),
                }
            }
            TargetResolver::DirectId => {
                if !target.is_empty() && target.chars().all(|c| c.is_ascii_digit()) {
                    Ok(target.to_string())
                } else {
                    Err(ModerationError::TargetNotFound(target.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapLookup {
        entries: HashMap<String, String>,
    }

    impl MapLookup {
        fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                entries: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PersonLookup for MapLookup {
        async fn user_id_by_name(&self, _group_id: &str, name: &str) -> Result<Option<String>> {
            Ok(self.entries.get(name).cloned())
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl PersonLookup for FailingLookup {
        async fn user_id_by_name(&self, _group_id: &str, _name: &str) -> Result<Option<String>> {
            anyhow::bail!("member list unavailable")
        }
    }

    #[tokio::test]
    async fn known_name_resolves() {
        let resolver = TargetResolver::ByName(MapLookup::new(&[("张三", "123456")]));
        assert_eq!(resolver.resolve("g", "张三").await.unwrap(), "123456");
    }

    #[tokio::test]
    async fn unknown_name_is_a_resolution_failure() {
        let resolver = TargetResolver::ByName(MapLookup::new(&[]));
        let err = resolver.resolve("g", "李四").await.unwrap_err();
        assert!(matches!(err, ModerationError::TargetNotFound(name) if name == "李四"));
    }

    #[tokio::test]
    async fn unknown_sentinel_counts_as_a_miss() {
        let resolver = TargetResolver::ByName(MapLookup::new(&[("张三", "unknown")]));
        assert!(resolver.resolve("g", "张三").await.is_err());
    }

    #[tokio::test]
    async fn lookup_errors_become_resolution_failures() {
        let resolver = TargetResolver::ByName(Arc::new(FailingLookup));
        let err = resolver.resolve("g", "张三").await.unwrap_err();
        assert!(matches!(err, ModerationError::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn direct_id_passes_numeric_tokens_through() {
        let resolver = TargetResolver::DirectId;
        assert_eq!(resolver.resolve("g", "123456").await.unwrap(), "123456");
        assert!(resolver.resolve("g", "张三").await.is_err());
        assert!(resolver.resolve("g", "").await.is_err());
    }
}
