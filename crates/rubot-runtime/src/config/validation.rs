//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, PollingConfig, RubotConfig, WebhookConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RubotConfig) -> ConfigResult<()> {
    validate_bot(&config.bot)?;
    validate_polling(&config.polling)?;
    validate_webhook(&config.webhook)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_bot(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    validate_url(&bot.base_url)?;
    if bot.timeout_ms == 0 {
        return Err(ConfigError::validation("Timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.poll_interval_ms == 0 {
        return Err(ConfigError::validation(
            "Poll interval must be greater than 0",
        ));
    }
    if polling.limit == Some(0) {
        return Err(ConfigError::validation("Poll limit must be greater than 0"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

/// Validates the webhook receiver settings.
pub fn validate_webhook(webhook: &WebhookConfig) -> ConfigResult<()> {
    validate_port(webhook.port)?;
    validate_path(&webhook.path)?;
    if let Some(url) = &webhook.public_url {
        validate_url(url)?;
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }
    Ok(())
}

fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation("Path must start with '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RubotConfig {
        let mut config = RubotConfig::default();
        config.bot.token = "token".into();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = validate_config(&RubotConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "bot.token"));
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let mut config = valid();
        config.bot.base_url = "ftp://botapi.rubika.ir".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = valid();
        config.polling.poll_interval_ms = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("rubot.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_webhook_port_and_path() {
        let mut config = valid();
        config.webhook.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));

        let webhook = WebhookConfig {
            path: "hook".into(),
            ..Default::default()
        };
        assert!(validate_webhook(&webhook).is_err());
    }
}
