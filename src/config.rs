use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_config_version")]
    pub config_version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComponentsConfig {
    #[serde(default = "default_true")]
    pub enable_smart_remove: bool,
    #[serde(default)]
    pub enable_remove_command: bool,
    #[serde(default)]
    pub enable_kick_command: bool,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            enable_smart_remove: true,
            enable_remove_command: false,
            enable_kick_command: false,
        }
    }
}

/// Allow-lists of `"platform:id"` entries. An empty list disables the
/// check entirely and authorizes everyone.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherKind {
    /// Route the removal through the host's group command bus.
    #[default]
    Command,
    /// POST directly to the admin endpoint.
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemovalConfig {
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
    #[serde(default = "default_reason")]
    pub default_reason: String,
    #[serde(default = "default_command_reason")]
    pub command_default_reason: String,
    #[serde(default)]
    pub reject_add_request: bool,
    #[serde(default)]
    pub dispatcher: DispatcherKind,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            default_reason: default_reason(),
            command_default_reason: default_command_reason(),
            reject_add_request: false,
            dispatcher: DispatcherKind::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeywordSensitivity {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// Cheap keyword pre-filter; only hits reach the judge model.
    #[default]
    Keyword,
    /// Every group message goes to the judge model.
    Judge,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmartRemoveConfig {
    #[serde(default)]
    pub activation_mode: ActivationMode,
    #[serde(default = "default_activation_keywords")]
    pub activation_keywords: Vec<String>,
    #[serde(default = "default_judge_prompt")]
    pub judge_prompt: String,
    /// Reserved knob; parsed but not yet consulted.
    #[serde(default = "default_true")]
    pub strict_mode: bool,
    /// Reserved knob; parsed but not yet consulted.
    #[serde(default)]
    pub keyword_sensitivity: KeywordSensitivity,
}

impl Default for SmartRemoveConfig {
    fn default() -> Self {
        Self {
            activation_mode: ActivationMode::default(),
            activation_keywords: default_activation_keywords(),
            judge_prompt: default_judge_prompt(),
            strict_mode: true,
            keyword_sensitivity: KeywordSensitivity::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Address the event webhook server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout(),
            access_token: None,
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_prefix")]
    pub prefix: String,
    #[serde(default = "default_true")]
    pub include_user_info: bool,
    #[serde(default = "default_true")]
    pub include_action_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            prefix: default_log_prefix(),
            include_user_info: true,
            include_action_info: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub components: ComponentsConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub removal: RemovalConfig,
    #[serde(default)]
    pub smart_remove: SmartRemoveConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_templates() -> Vec<String> {
    [
        "好的，已将 {target} 移出群聊，理由：{reason}",
        "收到，对 {target} 执行踢人操作，因为{reason}",
        "明白了，移除 {target}，原因是{reason}",
        "哇哈哈哈哈哈，已将 {target} 踢出群聊，理由：{reason}",
        "哎呦我去，对 {target} 执行踢人操作，因为{reason}",
        "{target}，你完蛋了，我要把你踢出群聊，原因：{reason}",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_reason() -> String {
    "违反群规".to_string()
}

fn default_command_reason() -> String {
    "管理员操作".to_string()
}

fn default_activation_keywords() -> Vec<String> {
    ["踢人", "remove", "kick", "移出"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_judge_prompt() -> String {
    "你是有温度的赛博群友，而非机械执法程序。踢人决策需综合聊天语境和群组氛围判断。\n\
     判定是否需要使用踢人动作。\n\
     踢人动作的严格条件：\n\n\
     使用踢人的情况：\n\
     1. 用户发送严重违规内容（色情、暴力、政治敏感等）\n\
     2. 恶意刷屏或垃圾信息轰炸\n\
     3. 用户主动明确要求被踢出群聊\n\
     4. 严重违反群规的行为\n\
     5. 恶意攻击他人或群组管理\n\n\
     绝对不要使用的情况：\n\
     1. 正常的观点表达\n\
     2. 情绪化表达但无恶意\n\
     3. 开玩笑或调侃，除非过分\n\
     4. 单纯的意见分歧或争论\n\
     5. 对方的权限比你高或相同"
        .to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_api_timeout() -> u64 {
    5
}

fn default_listen_addr() -> String {
    "127.0.0.1:8719".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_prefix() -> String {
    "[RemoveUserPlugin]".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// One-shot validation so the rest of the program can trust the table.
    pub fn validate(&self) -> Result<()> {
        for entry in self
            .permissions
            .allowed_users
            .iter()
            .chain(self.permissions.allowed_groups.iter())
        {
            if !entry.contains(':') {
                bail!("Allow-list entry '{entry}' is not of the form 'platform:id'");
            }
        }
        if self.removal.templates.is_empty() {
            bail!("[removal].templates must contain at least one template");
        }
        if self.api.timeout_secs == 0 {
            bail!("[api].timeout_secs must be at least 1");
        }
        if self.llm.model.is_empty() {
            bail!("[llm].model must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse("[llm]\nmodel = \"test-model\"\n");
        assert!(!config.plugin.enabled);
        assert!(config.components.enable_smart_remove);
        assert!(!config.components.enable_remove_command);
        assert!(config.permissions.allowed_users.is_empty());
        assert_eq!(config.removal.templates.len(), 6);
        assert_eq!(config.removal.default_reason, "违反群规");
        assert_eq!(config.removal.dispatcher, DispatcherKind::Command);
        assert_eq!(config.api.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.logging.prefix, "[RemoveUserPlugin]");
        config.validate().unwrap();
    }

    #[test]
    fn malformed_allow_list_entry_is_rejected() {
        let config = parse("[llm]\nmodel = \"m\"\n[permissions]\nallowed_users = [\"123456\"]\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_templates_are_rejected() {
        let config = parse("[llm]\nmodel = \"m\"\n[removal]\ntemplates = []\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn dispatcher_kind_parses_http() {
        let config = parse("[llm]\nmodel = \"m\"\n[removal]\ndispatcher = \"http\"\n");
        assert_eq!(config.removal.dispatcher, DispatcherKind::Http);
    }

    #[test]
    fn llm_base_url_falls_back_by_provider() {
        let config = parse("[llm]\nprovider = \"ollama\"\nmodel = \"m\"\n");
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434/v1");
    }
}
