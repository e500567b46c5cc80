//! Feed configuration: validated per-feed settings plus an optional TOML
//! feed-list loader.
//!
//! A `FeedConfig` is constructed once from persisted configuration and
//! never mutated. Construction validates the feed URL up front — a feed
//! that cannot be fetched safely is rejected at setup time, never
//! silently defaulted.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read feeds file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in feeds file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Feeds file exceeds the maximum allowed size.
    #[error("Feeds file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),

    #[error("Duplicate feed id: {0}")]
    DuplicateId(i64),
}

/// Validates a feed URL: must parse as an absolute URL with an http or
/// https scheme. Loopback and private addresses are deliberately allowed —
/// pollers are routinely pointed at intranet feeds.
pub fn validate_feed_url(url_str: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(url_str)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedScheme(scheme.to_owned())),
    }
}

// ============================================================================
// FeedConfig
// ============================================================================

/// Immutable, validated description of one feed source.
///
/// Owned by configuration storage and read-only to the poller. `id` is
/// stable for the lifetime of the feed and keys the caller's state and
/// seen-set stores.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub id: i64,
    /// Absolute http/https URL, validated at construction.
    pub url: String,
    /// Optional human-readable label.
    pub name: Option<String>,
    /// Disabled feeds are kept in configuration but skipped by poll passes.
    pub enabled: bool,
    /// Per-request transport timeout.
    pub timeout_seconds: u64,
    /// Transport-level retry budget for transient failures (429/5xx).
    pub retries: u32,
    /// Desired cadence between polls; interpreted by the external scheduler.
    pub polling_interval_seconds: u64,
    /// Extra request headers, in declaration order.
    pub headers: Vec<(String, String)>,
    /// Opaque options forwarded to the feed parser.
    pub parser_options: HashMap<String, String>,
    /// Optional proxy URL for the transport.
    pub proxy: Option<String>,
}

impl FeedConfig {
    /// Builds a config with default cadence/transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] or
    /// [`ConfigError::UnsupportedScheme`] when `url` is not an absolute
    /// http/https URL.
    pub fn new(id: i64, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        validate_feed_url(&url)?;
        let defaults = FeedDefaults::default();
        Ok(Self {
            id,
            url,
            name: None,
            enabled: true,
            timeout_seconds: defaults.timeout_seconds,
            retries: defaults.retries,
            polling_interval_seconds: defaults.polling_interval_seconds,
            headers: Vec::new(),
            parser_options: HashMap::new(),
            proxy: None,
        })
    }
}

// ============================================================================
// Feeds file (TOML)
// ============================================================================

/// Defaults applied to feeds that omit transport/cadence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedDefaults {
    pub timeout_seconds: u64,
    pub retries: u32,
    pub polling_interval_seconds: u64,
}

impl Default for FeedDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retries: 3,
            polling_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    id: i64,
    url: String,
    name: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    timeout_seconds: Option<u64>,
    retries: Option<u32>,
    polling_interval_seconds: Option<u64>,
    /// Ordered pairs: `headers = [["User-Agent", "feedpoll/0.1"]]`
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    parser_options: HashMap<String, String>,
    proxy: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedsFileRaw {
    defaults: FeedDefaults,
    feeds: Vec<FeedEntry>,
}

/// Loads and validates a TOML feed list.
///
/// - Missing file → `Ok(vec![])`
/// - Empty file → `Ok(vec![])`
/// - Invalid TOML, invalid URL, or duplicate id → `Err(ConfigError)`
pub fn load_feeds(path: &Path) -> Result<Vec<FeedConfig>, ConfigError> {
    // Cap the file size before reading: a corrupted or hostile feeds file
    // should not exhaust memory.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_FILE_SIZE => {
            return Err(ConfigError::TooLarge(format!(
                "Feeds file is {} bytes (max {} bytes)",
                meta.len(),
                MAX_FILE_SIZE
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No feeds file found, no feeds configured");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ConfigError::Io(e)),
        Ok(_) => {}
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        tracing::debug!(path = %path.display(), "Feeds file is empty, no feeds configured");
        return Ok(Vec::new());
    }

    // Warn about top-level typos without rejecting the file
    if let Ok(raw) = content.parse::<toml::Table>() {
        for key in raw.keys() {
            if key != "defaults" && key != "feeds" {
                tracing::warn!(key = %key, "Unknown key in feeds file, ignoring");
            }
        }
    }

    let raw: FeedsFileRaw = toml::from_str(&content)?;
    let defaults = raw.defaults;

    let mut seen_ids = std::collections::HashSet::new();
    let mut configs = Vec::with_capacity(raw.feeds.len());
    for entry in raw.feeds {
        validate_feed_url(&entry.url)?;
        if !seen_ids.insert(entry.id) {
            return Err(ConfigError::DuplicateId(entry.id));
        }
        configs.push(FeedConfig {
            id: entry.id,
            url: entry.url,
            name: entry.name,
            enabled: entry.enabled,
            timeout_seconds: entry.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            retries: entry.retries.unwrap_or(defaults.retries),
            polling_interval_seconds: entry
                .polling_interval_seconds
                .unwrap_or(defaults.polling_interval_seconds),
            headers: entry.headers,
            parser_options: entry.parser_options,
            proxy: entry.proxy,
        });
    }

    tracing::info!(path = %path.display(), feeds = configs.len(), "Loaded feed configuration");
    Ok(configs)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_feeds_file(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feedpoll_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_new_validates_url() {
        assert!(FeedConfig::new(1, "https://example.com/feed.xml").is_ok());
        assert!(FeedConfig::new(1, "http://example.com/feed.xml").is_ok());
    }

    #[test]
    fn test_new_applies_defaults() {
        let config = FeedConfig::new(1, "https://example.com/feed.xml").unwrap();
        let defaults = FeedDefaults::default();
        assert_eq!(config.timeout_seconds, defaults.timeout_seconds);
        assert_eq!(config.retries, defaults.retries);
        assert_eq!(
            config.polling_interval_seconds,
            defaults.polling_interval_seconds
        );
        assert!(config.enabled);
    }

    #[test]
    fn test_new_rejects_bad_scheme() {
        let err = FeedConfig::new(1, "ftp://example.com/feed.xml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
        let err = FeedConfig::new(1, "file:///etc/passwd").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_new_rejects_unparseable_url() {
        let err = FeedConfig::new(1, "not a url at all").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_loopback_urls_accepted() {
        // Poll targets may be local mock servers or intranet feeds
        assert!(FeedConfig::new(1, "http://127.0.0.1:8080/feed").is_ok());
        assert!(FeedConfig::new(2, "http://localhost/feed").is_ok());
    }

    #[test]
    fn test_missing_file_yields_no_feeds() {
        let path = Path::new("/tmp/feedpoll_test_nonexistent_feeds.toml");
        assert!(load_feeds(path).unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_yields_no_feeds() {
        let path = temp_feeds_file("empty", "   \n");
        assert!(load_feeds(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_applies_defaults() {
        let path = temp_feeds_file(
            "defaults",
            r#"
[defaults]
timeout_seconds = 10
retries = 1

[[feeds]]
id = 1
url = "https://example.com/a.xml"

[[feeds]]
id = 2
url = "https://example.com/b.xml"
timeout_seconds = 60
"#,
        );
        let feeds = load_feeds(&path).unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].timeout_seconds, 10);
        assert_eq!(feeds[0].retries, 1);
        // polling interval falls back to the built-in default
        assert_eq!(feeds[0].polling_interval_seconds, 300);
        assert_eq!(feeds[1].timeout_seconds, 60);
        assert!(feeds[0].enabled);
    }

    #[test]
    fn test_load_full_entry() {
        let path = temp_feeds_file(
            "full",
            r#"
[[feeds]]
id = 7
url = "https://example.com/feed.xml"
name = "Example"
enabled = false
retries = 0
proxy = "http://proxy.internal:3128"
headers = [["User-Agent", "feedpoll/0.1"], ["Accept", "application/rss+xml"]]

[feeds.parser_options]
lenient = "true"
"#,
        );
        let feeds = load_feeds(&path).unwrap();
        assert_eq!(feeds.len(), 1);
        let feed = &feeds[0];
        assert_eq!(feed.id, 7);
        assert_eq!(feed.name.as_deref(), Some("Example"));
        assert!(!feed.enabled);
        assert_eq!(feed.retries, 0);
        assert_eq!(feed.proxy.as_deref(), Some("http://proxy.internal:3128"));
        assert_eq!(
            feed.headers,
            vec![
                ("User-Agent".to_string(), "feedpoll/0.1".to_string()),
                ("Accept".to_string(), "application/rss+xml".to_string()),
            ]
        );
        assert_eq!(feed.parser_options.get("lenient").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_load_rejects_invalid_url() {
        let path = temp_feeds_file(
            "bad_url",
            r#"
[[feeds]]
id = 1
url = "gopher://example.com/feed"
"#,
        );
        assert!(matches!(
            load_feeds(&path).unwrap_err(),
            ConfigError::UnsupportedScheme(_)
        ));
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let path = temp_feeds_file(
            "dup_id",
            r#"
[[feeds]]
id = 1
url = "https://example.com/a.xml"

[[feeds]]
id = 1
url = "https://example.com/b.xml"
"#,
        );
        assert!(matches!(
            load_feeds(&path).unwrap_err(),
            ConfigError::DuplicateId(1)
        ));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let path = temp_feeds_file("bad_toml", "this is not [valid toml");
        assert!(matches!(
            load_feeds(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = temp_feeds_file("too_large", &"#".repeat(1_048_577));
        assert!(matches!(
            load_feeds(&path).unwrap_err(),
            ConfigError::TooLarge(_)
        ));
    }
}
