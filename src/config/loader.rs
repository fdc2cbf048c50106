use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::GatewayConfig;

/// Load configuration from a file using the config crate.
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub fn load_config(config_path: &str) -> Result<GatewayConfig> {
    let path = Path::new(config_path);

    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Yaml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", path.display()))?;

    let gateway_config: GatewayConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))?;

    Ok(gateway_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
filter_scan:
  directories:
    - "filters/pre"
    - "filters/route"
    - "filters/post"
  poll_interval_secs: 2
debug:
  routing: true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.filter_scan.directories.len(), 3);
        assert_eq!(config.filter_scan.poll_interval_secs, 2);
        assert_eq!(config.filter_scan.script_suffix, ".rhai");
        assert!(config.debug.routing);
        assert!(!config.debug.request);
    }

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
[filter_scan]
directories = ["filters/pre"]
script_suffix = ".pylon"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.filter_scan.directories, vec!["filters/pre"]);
        assert_eq!(config.filter_scan.script_suffix, ".pylon");
        assert_eq!(config.filter_scan.poll_interval_secs, 5);
    }
}
