//! Semantic validation of a loaded [`RelayConfig`].
//!
//! Parsing already rejects malformed files; this pass catches values that
//! parse fine but cannot work (zero-sized buckets, zero workers, ...).

use secrecy::ExposeSecret;

use crate::schema::RelayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "rate_limit.capacity"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }
}

/// Check a loaded config. Errors make the relay refuse to start.
#[must_use]
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_secret(&mut result, "telegram.token", config.telegram.token.expose_secret());
    check_secret(&mut result, "provider.api_key", config.provider.api_key.expose_secret());

    if config.telegram.poll_timeout_secs == 0 {
        result.warning(
            "telegram.poll_timeout_secs",
            "0 disables long polling and busy-loops getUpdates",
        );
    }

    let base_url = config.provider.base_url.as_str();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        result.error("provider.base_url", format!("not an http(s) URL: {base_url:?}"));
    }
    if config.provider.model.trim().is_empty() {
        result.error("provider.model", "must not be empty");
    }
    if config.provider.max_tokens == 0 {
        result.error("provider.max_tokens", "must be at least 1");
    }
    if config.provider.request_timeout_secs == 0 {
        result.error("provider.request_timeout_secs", "must be at least 1");
    }
    for tool in &config.provider.server_tools {
        if tool.tool_type.is_empty() || tool.name.is_empty() {
            result.error("provider.server_tools", "every tool needs a type and a name");
        }
    }

    if config.rate_limit.capacity == 0 {
        result.error("rate_limit.capacity", "must be at least 1");
    }
    if config.rate_limit.window_secs == 0 {
        result.error("rate_limit.window_secs", "must be at least 1");
    }

    if config.memory.max_turns == 0 {
        result.error("memory.max_turns", "must be at least 1");
    } else if config.memory.max_turns % 2 == 1 {
        result.warning(
            "memory.max_turns",
            "odd value; turns are stored in user/assistant pairs so the oldest pair is split on eviction",
        );
    }

    if config.outbound.max_message_len == 0 {
        result.error("outbound.max_message_len", "must be at least 1");
    } else if config.outbound.max_message_len > 4096 {
        result.warning(
            "outbound.max_message_len",
            "Telegram rejects messages longer than 4096 UTF-16 code units",
        );
    }

    if config.workers.max_concurrent == 0 {
        result.error("workers.max_concurrent", "must be at least 1");
    }
    if config.workers.queue_depth == 0 {
        result.error("workers.queue_depth", "must be at least 1");
    }

    result
}

fn check_secret(result: &mut ValidationResult, path: &'static str, value: &str) {
    if value.is_empty() {
        result.error(path, "not set");
    } else if value.contains("${") {
        result.error(path, "contains an unresolved ${...} placeholder");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {rstest::rstest, secrecy::Secret};

    use {
        super::*,
        crate::schema::{ProviderConfig, TelegramConfig},
    };

    fn valid() -> RelayConfig {
        RelayConfig {
            telegram: TelegramConfig {
                token: Secret::new("123:ABC".into()),
                ..Default::default()
            },
            provider: ProviderConfig {
                api_key: Secret::new("sk-ant-test".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_with_secrets_are_clean() {
        let result = validate(&valid());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn missing_secrets_are_errors() {
        let result = validate(&RelayConfig::default());
        assert!(result.has_errors());
        let paths: Vec<_> = result.diagnostics.iter().map(|d| d.path).collect();
        assert!(paths.contains(&"telegram.token"));
        assert!(paths.contains(&"provider.api_key"));
    }

    #[test]
    fn unresolved_placeholder_is_reported() {
        let mut cfg = valid();
        cfg.telegram.token = Secret::new("${TELEGRAM_BOT_TOKEN}".into());
        let result = validate(&cfg);
        assert_eq!(result.count(Severity::Error), 1);
        assert!(result.diagnostics[0].message.contains("placeholder"));
    }

    #[rstest]
    #[case::capacity("rate_limit.capacity")]
    #[case::window("rate_limit.window_secs")]
    #[case::turns("memory.max_turns")]
    #[case::chunk("outbound.max_message_len")]
    #[case::workers("workers.max_concurrent")]
    #[case::queue("workers.queue_depth")]
    fn zero_values_are_errors(#[case] path: &'static str) {
        let mut cfg = valid();
        match path {
            "rate_limit.capacity" => cfg.rate_limit.capacity = 0,
            "rate_limit.window_secs" => cfg.rate_limit.window_secs = 0,
            "memory.max_turns" => cfg.memory.max_turns = 0,
            "outbound.max_message_len" => cfg.outbound.max_message_len = 0,
            "workers.max_concurrent" => cfg.workers.max_concurrent = 0,
            "workers.queue_depth" => cfg.workers.queue_depth = 0,
            _ => unreachable!(),
        }
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, path);
        assert_eq!(result.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn oversized_chunks_warn() {
        let mut cfg = valid();
        cfg.outbound.max_message_len = 5000;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Warning,
            path: "memory.max_turns",
            message: "odd value".into(),
        };
        assert_eq!(d.to_string(), "warning: memory.max_turns: odd value");
    }
}
