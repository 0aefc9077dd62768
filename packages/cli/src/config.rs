use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stencil_binder::BindOptions;

pub const DEFAULT_CONFIG_NAME: &str = "stencil.config.json";

/// Stencil configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory searched when no paths are given
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// Glob patterns, relative to the searched directory
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default)]
    pub keep_comments: bool,

    /// Warn about markup the binder never reads
    #[serde(default = "default_report_unused")]
    pub report_unused: bool,
}

fn default_src_dir() -> String {
    ".".to_string()
}

fn default_include() -> Vec<String> {
    vec!["**/*.stencil".to_string()]
}

fn default_report_unused() -> bool {
    true
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_src_dir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.src_dir)
    }

    pub fn bind_options(&self) -> BindOptions {
        BindOptions {
            keep_comments: self.keep_comments,
            report_unused: self.report_unused,
            ..BindOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            include: default_include(),
            keep_comments: false,
            report_unused: default_report_unused(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "srcDir": "patterns",
            "include": ["widgets/*.stencil", "bars/**/*.stencil"],
            "keepComments": true,
            "reportUnused": false
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.src_dir, "patterns");
        assert_eq!(config.include, vec!["widgets/*.stencil", "bars/**/*.stencil"]);
        assert!(config.keep_comments);
        assert!(!config.report_unused);

        let options = config.bind_options();
        assert!(options.keep_comments);
        assert!(!options.report_unused);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "srcDir": "ui" }"#).unwrap();
        assert_eq!(config.src_dir, "ui");
        assert_eq!(config.include, vec!["**/*.stencil"]);
        assert!(config.report_unused);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.get_src_dir(Path::new("/work")), PathBuf::from("/work/."));
        assert_eq!(config.bind_options(), BindOptions::default());
    }
}
