use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::site::SiteConfig;

pub const DEFAULT_USER_AGENT: &str = "wikiclean/0.3";
pub const DEFAULT_CONFIG_PATH: &str = ".wikiclean/config.toml";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_PAGES_PER_QUERY: usize = 50;
pub const DEFAULT_BOT_COMMENT: &str = "Automatic cleanup";
pub const DEFAULT_NOBOT_TEMPLATES: &[&str] = &["Bots", "Nobots"];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikicleanConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub bot: BotSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub max_pages_per_query: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OrchestratorSection {
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotSection {
    pub comment: Option<String>,
    #[serde(default)]
    pub nobot_templates: Vec<String>,
}

impl WikicleanConfig {
    /// Resolve the wiki API URL: env WIKI_API_URL > config > None.
    pub fn api_url(&self) -> Option<String> {
        env_override("WIKI_API_URL").or_else(|| self.wiki.api_url.clone())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve worker count: env WIKICLEAN_WORKERS > config > 4. Never zero.
    pub fn workers(&self) -> usize {
        env_override("WIKICLEAN_WORKERS")
            .and_then(|value| value.parse::<usize>().ok())
            .or(self.orchestrator.workers)
            .unwrap_or(DEFAULT_WORKERS)
            .max(1)
    }

    pub fn max_pages_per_query(&self) -> usize {
        self.wiki
            .max_pages_per_query
            .unwrap_or(DEFAULT_MAX_PAGES_PER_QUERY)
            .max(1)
    }

    pub fn bot_comment(&self) -> &str {
        self.bot.comment.as_deref().unwrap_or(DEFAULT_BOT_COMMENT)
    }

    pub fn nobot_templates(&self) -> Vec<String> {
        if self.bot.nobot_templates.is_empty() {
            return DEFAULT_NOBOT_TEMPLATES
                .iter()
                .map(|name| name.to_string())
                .collect();
        }
        self.bot.nobot_templates.clone()
    }
}

/// Load and parse the configuration file. Returns defaults if it doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikicleanConfig> {
    if !config_path.exists() {
        return Ok(WikicleanConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WikicleanConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    validate(&parsed).with_context(|| format!("invalid configuration in {}", config_path.display()))?;
    Ok(parsed)
}

fn validate(config: &WikicleanConfig) -> Result<()> {
    if config.orchestrator.workers == Some(0) {
        bail!("[orchestrator] workers must be at least 1");
    }
    if config.wiki.max_pages_per_query == Some(0) {
        bail!("[wiki] max_pages_per_query must be at least 1");
    }
    for namespace in &config.site.namespaces {
        if namespace.id != 0 && namespace.name.trim().is_empty() {
            bail!("namespace {} has an empty name", namespace.id);
        }
    }
    Ok(())
}

pub(crate) fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn env_value_u64(key: &str, default: u64) -> u64 {
    env_override(key)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_value_usize(key: &str, default: usize) -> usize {
    env_override(key)
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::NS_CATEGORY;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_no_api_url() {
        let config = WikicleanConfig::default();
        assert!(config.wiki.api_url.is_none());
        assert_eq!(config.max_pages_per_query(), DEFAULT_MAX_PAGES_PER_QUERY);
        assert_eq!(config.bot_comment(), DEFAULT_BOT_COMMENT);
        assert_eq!(config.nobot_templates(), vec!["Bots", "Nobots"]);
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, WikicleanConfig::default());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[wiki]
api_url = "https://example.wiki/w/api.php"
user_agent = "test-agent/1.0"
max_pages_per_query = 20

[orchestrator]
workers = 8

[site]
interwikis = ["commons"]
languages = ["en", "fr"]

[[site.namespaces]]
id = 14
name = "Kategorie"
aliases = ["Category"]

[bot]
comment = "Cleanup"
nobot_templates = ["Nobots", "In use"]
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.wiki.api_url.as_deref(),
            Some("https://example.wiki/w/api.php")
        );
        assert_eq!(config.max_pages_per_query(), 20);
        assert_eq!(config.orchestrator.workers, Some(8));
        assert_eq!(config.site.languages, vec!["en", "fr"]);
        assert!(config.site.is_namespace(NS_CATEGORY, "Category"));
        assert_eq!(config.bot_comment(), "Cleanup");
        assert_eq!(config.nobot_templates(), vec!["Nobots", "In use"]);
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[orchestrator]\nworkers = 2\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.wiki.api_url.is_none());
        assert_eq!(config.site, SiteConfig::default());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[wiki\napi_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn load_config_rejects_zero_workers() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[orchestrator]\nworkers = 0\n").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(format!("{error:#}").contains("workers must be at least 1"));
    }
}
