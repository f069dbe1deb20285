/// Config schema types (telegram, provider, rate limit, memory, outbound, workers).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a Telegram chat. \
     Keep responses concise and well-formatted for mobile reading. \
     Use Telegram-compatible markdown when helpful.";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub memory: MemoryConfig,
    pub outbound: OutboundConfig,
    pub workers: WorkerConfig,
}

/// Telegram bot connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to getUpdates (seconds).
    pub poll_timeout_secs: u32,

    /// Register the command list with Telegram on startup for client autocomplete.
    pub register_commands: bool,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("register_commands", &self.register_commands)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            register_commands: true,
        }
    }
}

/// Completion engine (Anthropic Messages API).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,

    /// Model ID, e.g. "claude-sonnet-4-5".
    pub model: String,

    pub base_url: String,

    pub max_tokens: u32,

    pub system_prompt: String,

    /// HTTP timeout for one completion request (seconds).
    pub request_timeout_secs: u64,

    /// Tools executed on the provider's side. They are forwarded verbatim and
    /// listed by `/tools`; the relay never sees tool calls.
    pub server_tools: Vec<ServerToolConfig>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("server_tools", &self.server_tools)
            .finish_non_exhaustive()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: "claude-sonnet-4-5".into(),
            base_url: "https://api.anthropic.com".into(),
            max_tokens: 4096,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            request_timeout_secs: 120,
            server_tools: Vec::new(),
        }
    }
}

/// A provider-side tool, e.g. `{ type = "web_search_20250305", name = "web_search" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerToolConfig {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-conversation admission control: `capacity` messages per `window_secs`,
/// refilled continuously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum turns (user + assistant) kept per conversation.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 20 }
    }
}

/// Markup dialect applied to outbound chunks before the first send attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterKind {
    /// Pass text through untouched and send it as Telegram legacy Markdown.
    #[default]
    Markdown,
    /// Render a Markdown subset to Telegram HTML.
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Maximum UTF-16 code units per outgoing message (Telegram counts length this way).
    pub max_message_len: usize,
    pub formatter: FormatterKind,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            max_message_len: 4096,
            formatter: FormatterKind::default(),
        }
    }
}

/// Ordering of work units that belong to the same conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Every admitted message runs independently; replies to back-to-back
    /// messages may arrive out of order.
    #[default]
    Concurrent,
    /// Messages of one conversation run one at a time, in admission order.
    PerConversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Units allowed to run at the same time.
    pub max_concurrent: usize,
    /// Admitted messages waiting for a worker before new ones are turned away.
    pub queue_depth: usize,
    pub ordering: OrderingMode,
    /// How long shutdown waits for in-flight units before abandoning them.
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            queue_depth: 256,
            ordering: OrderingMode::default(),
            shutdown_grace_secs: 30,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
