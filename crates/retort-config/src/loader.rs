use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result. Unknown keys are ignored so
    /// configs written for newer versions still load.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if a configured log level is not a valid `tracing`
    /// level name or the health path is malformed
    pub fn validate(&self) -> anyhow::Result<()> {
        for (category, value) in [
            ("request", &self.reply.log.request),
            ("reply", &self.reply.log.reply),
            ("error", &self.reply.log.error),
        ] {
            if let Some(raw) = value
                && raw.parse::<tracing::Level>().is_err()
            {
                anyhow::bail!("reply.log.{category} is not a valid log level: `{raw}`");
            }
        }

        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with `/`");
        }

        Ok(())
    }
}
