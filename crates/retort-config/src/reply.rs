use serde::Deserialize;
use tracing::Level;

/// Reply-pipeline configuration
#[derive(Debug, Deserialize)]
pub struct ReplyConfig {
    /// Log levels per category
    #[serde(default)]
    pub log: LogLevels,
    /// Whether serialized errors carry their captured stack
    #[serde(default)]
    pub include_stack: bool,
    /// Default locale for serialization-time translation
    #[serde(default)]
    pub locale: Option<String>,
    /// Whether reply data runs through the sanitize handler
    #[serde(default = "default_sanitize_data")]
    pub sanitize_data: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            log: LogLevels::default(),
            include_stack: false,
            locale: None,
            sanitize_data: true,
        }
    }
}

const fn default_sanitize_data() -> bool {
    true
}

/// Per-category log levels; an unset category is silent
///
/// Values are `tracing` level names (`trace`, `debug`, `info`, `warn`,
/// `error`).
#[derive(Debug, Deserialize)]
pub struct LogLevels {
    #[serde(default = "default_request_level")]
    pub request: Option<String>,
    #[serde(default = "default_reply_level")]
    pub reply: Option<String>,
    #[serde(default = "default_error_level")]
    pub error: Option<String>,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            request: default_request_level(),
            reply: default_reply_level(),
            error: default_error_level(),
        }
    }
}

impl LogLevels {
    /// Parsed level for request logging
    #[must_use]
    pub fn request_level(&self) -> Option<Level> {
        parse_level(self.request.as_deref())
    }

    /// Parsed level for reply logging
    #[must_use]
    pub fn reply_level(&self) -> Option<Level> {
        parse_level(self.reply.as_deref())
    }

    /// Parsed level for error logging
    #[must_use]
    pub fn error_level(&self) -> Option<Level> {
        parse_level(self.error.as_deref())
    }
}

fn parse_level(value: Option<&str>) -> Option<Level> {
    value.and_then(|raw| raw.parse().ok())
}

fn default_request_level() -> Option<String> {
    Some("trace".to_owned())
}

fn default_reply_level() -> Option<String> {
    Some("trace".to_owned())
}

fn default_error_level() -> Option<String> {
    Some("error".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_levels_match_production_noise() {
        let levels = LogLevels::default();
        assert_eq!(levels.request_level(), Some(Level::TRACE));
        assert_eq!(levels.reply_level(), Some(Level::TRACE));
        assert_eq!(levels.error_level(), Some(Level::ERROR));
    }

    #[test]
    fn invalid_level_string_is_silent() {
        let levels = LogLevels {
            request: Some("shout".to_owned()),
            reply: None,
            error: None,
        };
        assert_eq!(levels.request_level(), None);
    }
}
