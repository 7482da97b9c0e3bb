//! Configuration, credentials and date bounds.
//!
//! Settings come from an optional YAML file (`.uplink/config.yaml` by
//! default) with every field defaulted; command-line flags override them.
//! Credentials are read from the environment, optionally seeded from an
//! env file whose entries never shadow variables the process already has.

use crate::client::RetryPolicy;
use crate::client::retry::DEFAULT_BASE_BACKOFF;
use crate::error::{ConfigError, Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration directory
pub const CONFIG_DIR_NAME: &str = ".uplink";

/// Name of the configuration file inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Format of date bounds on the command line
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Tracker base URL variable
pub const ENV_BASE_URL: &str = "JIRA_BASE_URL";

/// Account email variable
pub const ENV_EMAIL: &str = "JIRA_EMAIL";

/// API token variable
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";

/// Variable naming an env file to seed credentials from
pub const ENV_FILE: &str = "ENV_FILE";

/// Default target namespace
pub const DEFAULT_NAMESPACE: &str = "ITPT";

/// Default mainline branch for merge dates
pub const DEFAULT_TARGET_BRANCH: &str = "master";

/// Tool settings, as stored in `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UplinkConfig {
    /// Namespace an ancestor must belong to
    pub namespace: String,
    /// Maximum BFS depth
    pub max_depth: usize,
    /// Branch whose merges count as mainline integration
    pub target_branch: String,
    /// Remote API settings
    pub http: HttpSettings,
    /// Roots enriched concurrently
    pub concurrency: usize,
    /// Character bound of exported description summaries
    pub description_max_len: usize,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_depth: 5,
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            http: HttpSettings::default(),
            concurrency: 1,
            description_max_len: 280,
        }
    }
}

/// Remote API section of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial backoff in seconds
    pub backoff_secs: f64,
    /// Search page size
    pub page_size: usize,
    /// Page cap per search, 0 for none
    pub max_pages: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_retries: 5,
            backoff_secs: 2.0,
            page_size: 100,
            max_pages: 0,
        }
    }
}

impl HttpSettings {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy built from these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = Duration::try_from_secs_f64(self.backoff_secs).unwrap_or(DEFAULT_BASE_BACKOFF);
        RetryPolicy::new(self.max_retries, backoff)
    }
}

impl UplinkConfig {
    /// Default config file location below `base_dir`.
    #[must_use]
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// I/O errors, [`ConfigError::InvalidFile`] for malformed YAML and
    /// [`ConfigError::InvalidValue`] for unusable settings.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Rejects settings no run could use.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |field, message: &str| ConfigError::InvalidValue {
            field,
            message: message.to_string(),
        };
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.http.page_size == 0 {
            return Err(invalid("http.page-size", "must be at least 1"));
        }
        if !self.http.backoff_secs.is_finite() || self.http.backoff_secs < 0.0 {
            return Err(invalid("http.backoff-secs", "must be a non-negative number"));
        }
        Ok(())
    }
}

/// Account used against the tracker API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Account email
    pub email: String,
    /// API token
    pub api_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Environment variables, with env file entries layered underneath.
///
/// The process environment is captured once at construction; a variable
/// present there, even if empty, wins over the env file.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    process: HashMap<String, String>,
    file: HashMap<String, String>,
}

impl Environment {
    /// Builds an environment from explicit layers.
    #[must_use]
    pub fn from_parts(process: HashMap<String, String>, file: HashMap<String, String>) -> Self {
        Self { process, file }
    }

    /// Captures the process environment and, if `env_file` is given (or
    /// `ENV_FILE` is set), the entries of that file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EnvFileNotFound`] when the named file does not exist,
    /// [`ConfigError::InvalidEnvFile`] when it cannot be parsed, or an I/O
    /// error reading it.
    pub async fn load(env_file: Option<&Path>) -> Result<Self> {
        let process: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        let named = env_file
            .map(Path::to_path_buf)
            .or_else(|| process.get(ENV_FILE).filter(|p| !p.is_empty()).map(PathBuf::from));

        let file = match named {
            Some(path) => {
                if !tokio::fs::try_exists(&path).await? {
                    return Err(Error::Config(ConfigError::EnvFileNotFound(path)));
                }
                let content = tokio::fs::read_to_string(&path).await?;
                let entries = parse_env_file(&content).map_err(|e| ConfigError::InvalidEnvFile {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                tracing::debug!(path = %path.display(), entries = entries.len(), "loaded env file");
                entries
            }
            None => HashMap::new(),
        };

        Ok(Self { process, file })
    }

    /// Value of `name`, process first, then env file.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.process
            .get(name)
            .or_else(|| self.file.get(name))
            .map(String::as_str)
    }

    /// Reads tracker credentials.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingEnv`] listing every unset or empty variable.
    pub fn credentials(&self) -> std::result::Result<Credentials, ConfigError> {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| {
            let value = self.get(name).map(str::trim).unwrap_or_default();
            if value.is_empty() {
                missing.push(name);
            }
            value.to_string()
        };
        let base_url = read(ENV_BASE_URL).trim_end_matches('/').to_string();
        let email = read(ENV_EMAIL);
        let api_token = read(ENV_API_TOKEN);

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }
        Ok(Credentials {
            base_url,
            email,
            api_token,
        })
    }
}

/// Parses env file content with dotenv quoting and comment rules.
///
/// Entries are collected without touching the process environment; the
/// first occurrence of a key wins.
///
/// # Errors
///
/// The first line dotenvy cannot parse.
pub fn parse_env_file(content: &str) -> std::result::Result<HashMap<String, String>, dotenvy::Error> {
    let mut entries = HashMap::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        let (key, value) = item?;
        entries.entry(key).or_insert(value);
    }
    Ok(entries)
}

/// Parses an optional `YYYY/MM/DD` bound; blank input means no bound.
///
/// # Errors
///
/// [`ConfigError::InvalidDate`] for anything else.
pub fn parse_date(value: &str) -> std::result::Result<Option<NaiveDate>, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|source| ConfigError::InvalidDate {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = UplinkConfig::default();
        assert_eq!(config.namespace, "ITPT");
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.target_branch, "master");
        assert_eq!(config.http.timeout(), Duration::from_secs(60));
        assert_eq!(config.http.retry_policy().max_retries(), 5);
        assert_eq!(config.http.retry_policy().base_backoff(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        tokio::fs::write(&path, "namespace: OPS\nhttp:\n  max-retries: 2\n")
            .await
            .unwrap();

        let config = UplinkConfig::load(&path).await.unwrap();
        assert_eq!(config.namespace, "OPS");
        assert_eq!(config.http.max_retries, 2);
        assert_eq!(config.http.page_size, 100);
        assert_eq!(config.max_depth, 5);
    }

    #[tokio::test]
    async fn malformed_yaml_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        tokio::fs::write(&path, "max-depth: [not a number\n").await.unwrap();

        let err = UplinkConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidFile { .. })));
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        tokio::fs::write(&path, "concurrency: 0\n").await.unwrap();

        let err = UplinkConfig::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue { field: "concurrency", .. })
        ));
    }

    #[test]
    fn env_file_parsing() {
        let entries = parse_env_file(
            "# comment\n\nJIRA_EMAIL=\"me@example.com\"\nJIRA_API_TOKEN='t0k=en'\nJIRA_EMAIL=second@example.com\n",
        )
        .unwrap();
        assert_eq!(entries.get("JIRA_EMAIL").map(String::as_str), Some("me@example.com"));
        assert_eq!(entries.get("JIRA_API_TOKEN").map(String::as_str), Some("t0k=en"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn unparseable_env_line_is_an_error() {
        assert!(parse_env_file("JIRA_EMAIL=me@example.com\nnot a pair\n").is_err());
    }

    #[tokio::test]
    async fn named_env_file_entries_are_layered_under_the_process() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tracker.env");
        tokio::fs::write(&path, "UPLINK_ENV_FILE_ONLY_MARKER=\"from file\"\n")
            .await
            .unwrap();

        let env = Environment::load(Some(path.as_path())).await.unwrap();
        assert_eq!(env.get("UPLINK_ENV_FILE_ONLY_MARKER"), Some("from file"));
    }

    #[tokio::test]
    async fn malformed_env_file_names_the_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.env");
        tokio::fs::write(&path, "not a pair\n").await.unwrap();

        let err = Environment::load(Some(path.as_path())).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidEnvFile { path: ref p, .. }) if *p == path
        ));
    }

    #[test]
    fn process_environment_wins_over_env_file() {
        let env = Environment::from_parts(
            vars(&[("JIRA_EMAIL", "")]),
            vars(&[
                ("JIRA_EMAIL", "file@example.com"),
                ("JIRA_BASE_URL", "https://tracker.example.com/"),
                ("JIRA_API_TOKEN", "secret"),
            ]),
        );

        // Present-but-empty in the process still shadows the file.
        let err = env.credentials().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref names) if names == &vec!["JIRA_EMAIL"]));
    }

    #[test]
    fn credentials_trim_trailing_slash() {
        let env = Environment::from_parts(
            HashMap::new(),
            vars(&[
                ("JIRA_EMAIL", "me@example.com"),
                ("JIRA_BASE_URL", "https://tracker.example.com/"),
                ("JIRA_API_TOKEN", "secret"),
            ]),
        );
        let credentials = env.credentials().unwrap();
        assert_eq!(credentials.base_url, "https://tracker.example.com");
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn all_missing_credentials_are_listed() {
        let err = Environment::default().credentials().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref names) if names.len() == 3));
    }

    #[tokio::test]
    async fn named_env_file_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.env");
        let err = Environment::load(Some(missing.as_path())).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EnvFileNotFound(_))));
    }

    #[rstest]
    #[case("2024/03/01", Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))]
    #[case("  2024/12/31 ", Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()))]
    #[case("", None)]
    fn valid_dates(#[case] raw: &str, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_date(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("2024-03-01")]
    #[case("2024/13/01")]
    #[case("yesterday")]
    fn invalid_dates(#[case] raw: &str) {
        assert!(matches!(parse_date(raw), Err(ConfigError::InvalidDate { .. })));
    }
}
