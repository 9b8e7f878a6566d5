//! Layered publish configuration for the command line
//!
//! Lowest to highest precedence: config file, `PUBSUB_*` environment
//! variables, `--set key=value` pairs.

use anyhow::Context;
use config::{Config, Environment, File};
use pubsub_loadtest_core::config::PublishConfig;
use std::path::Path;
use tracing::debug;

/// Prefix for environment variables (`PUBSUB_PROJECT_ID`, ...)
pub const ENV_PREFIX: &str = "PUBSUB";

/// Build and validate the publish configuration
pub fn load(
    path: Option<&Path>,
    overrides: &[(String, String)],
    env_prefix: &str,
) -> anyhow::Result<PublishConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        debug!(path = %path.display(), "Loading config file");
        builder = builder.add_source(File::from(path));
    }

    builder = builder.add_source(Environment::with_prefix(env_prefix).try_parsing(true));

    for (key, value) in overrides {
        builder = builder
            .set_override(key.as_str(), value.as_str())
            .with_context(|| format!("invalid override for '{}'", key))?;
    }

    let config: PublishConfig = builder
        .build()
        .context("failed to assemble configuration")?
        .try_deserialize()
        .context("failed to decode configuration")?;

    config.validate()?;
    Ok(config)
}

/// Parse a `KEY=VALUE` argument
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_loadtest_core::config::DeliveryMode;
    use std::io::Write;

    const TEST_PREFIX: &str = "PUBSUB_LOADTEST_CLI_TEST_UNSET";

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("project_id=proj-1").unwrap(),
            ("project_id".to_string(), "proj-1".to_string())
        );
        assert_eq!(
            parse_key_value("endpoint=http://h:1/?a=b").unwrap().1,
            "http://h:1/?a=b"
        );
        assert!(parse_key_value("no-separator").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let file = toml_file(
            r#"
project_id = "proj-1"
endpoint = "localhost:8085"
no_authentication = true
delivery = "fire_and_forget"
timeout_secs = 5

[attributes]
source = "cli"
"#,
        );

        let config = load(Some(file.path()), &[], TEST_PREFIX).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("proj-1"));
        assert!(config.no_authentication);
        assert_eq!(config.delivery, DeliveryMode::FireAndForget);
        assert_eq!(config.timeout_secs, Some(5));
        assert_eq!(config.attributes["source"], "cli");
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = toml_file("project_id = \"from-file\"\n");
        let overrides = vec![
            ("project_id".to_string(), "from-flag".to_string()),
            ("disable_telemetry".to_string(), "true".to_string()),
        ];

        let config = load(Some(file.path()), &overrides, TEST_PREFIX).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("from-flag"));
        assert!(config.disable_telemetry);
    }

    #[test]
    fn test_missing_project_rejected() {
        let overrides = vec![("endpoint".to_string(), "localhost:8085".to_string())];
        let err = load(None, &overrides, TEST_PREFIX).unwrap_err();
        assert!(err.to_string().contains("project_id"));
    }
}
