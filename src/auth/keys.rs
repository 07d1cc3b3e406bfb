//! API key loading and validation.
//!
//! Keys come from an ordered chain of sources: a JSON key file first, then a
//! comma-separated environment variable. The first source that yields at
//! least one key wins. An empty result from every source disables
//! authentication entirely, which is logged loudly at startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Immutable set of valid API keys, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ApiKeySet {
    keys: HashSet<String>,
}

impl ApiKeySet {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.trim().is_empty())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.keys.contains(candidate)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// The last four characters of a key, safe to write to logs.
pub fn key_suffix(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

/// A single place keys may come from. Sources are tried in order and the
/// first non-empty result wins.
pub trait KeySource {
    fn describe(&self) -> String;
    fn load(&self) -> Option<Vec<String>>;
}

#[derive(Deserialize)]
struct KeyFile {
    #[serde(default)]
    valid_keys: Vec<String>,
}

/// JSON file source: `{"valid_keys": ["key-1", "key-2"]}`.
pub struct JsonFileKeySource {
    path: PathBuf,
}

impl JsonFileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeySource for JsonFileKeySource {
    fn describe(&self) -> String {
        format!("key file {}", self.path.display())
    }

    fn load(&self) -> Option<Vec<String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "API key file {} not found, trying next source",
                    self.path.display()
                );
                return None;
            }
            Err(e) => {
                log::warn!("Failed to read API key file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<KeyFile>(&raw) {
            Ok(file) if !file.valid_keys.is_empty() => Some(file.valid_keys),
            Ok(_) => {
                log::info!(
                    "API key file {} contains no keys, trying next source",
                    self.path.display()
                );
                None
            }
            Err(e) => {
                log::warn!(
                    "Malformed API key file {}: {}. Falling back to next source",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

/// Environment source: a comma-separated list in a single variable.
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl KeySource for EnvKeySource {
    fn describe(&self) -> String {
        format!("environment variable {}", self.var)
    }

    fn load(&self) -> Option<Vec<String>> {
        let raw = std::env::var(&self.var).ok()?;
        let keys: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(keys)
        }
    }
}

/// The production chain: key file first, environment fallback.
pub fn default_sources(keys_file: &Path, env_var: &str) -> Vec<Box<dyn KeySource>> {
    vec![
        Box::new(JsonFileKeySource::new(keys_file)),
        Box::new(EnvKeySource::new(env_var)),
    ]
}

/// Walk the source chain and build the key set. Running with zero keys is
/// allowed but disables authentication, so it is logged as a warning.
pub fn load_api_keys(sources: &[Box<dyn KeySource>]) -> ApiKeySet {
    for source in sources {
        if let Some(keys) = source.load() {
            let set = ApiKeySet::from_keys(keys);
            if !set.is_empty() {
                log::info!("Loaded {} API keys from {}", set.len(), source.describe());
                return set;
            }
        }
    }

    log::warn!("No API keys found in any source; authentication is disabled");
    ApiKeySet::empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct StaticSource(Vec<String>);

    impl KeySource for StaticSource {
        fn describe(&self) -> String {
            "static".to_string()
        }
        fn load(&self) -> Option<Vec<String>> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.clone())
            }
        }
    }

    #[test]
    fn membership_check() {
        let keys = ApiKeySet::from_keys(["alpha", "beta"]);
        assert!(keys.is_valid("alpha"));
        assert!(!keys.is_valid("gamma"));
        assert!(!keys.is_valid(""));
    }

    #[test]
    fn blank_keys_are_dropped() {
        let keys = ApiKeySet::from_keys(["", "  ", "real-key"]);
        assert_eq!(keys.len(), 1);
        assert!(keys.is_valid("real-key"));
    }

    #[test]
    fn first_non_empty_source_wins() {
        let sources: Vec<Box<dyn KeySource>> = vec![
            Box::new(StaticSource(vec![])),
            Box::new(StaticSource(vec!["from-second".to_string()])),
            Box::new(StaticSource(vec!["from-third".to_string()])),
        ];
        let keys = load_api_keys(&sources);
        assert!(keys.is_valid("from-second"));
        assert!(!keys.is_valid("from-third"));
    }

    #[test]
    fn exhausted_chain_yields_empty_set() {
        let sources: Vec<Box<dyn KeySource>> =
            vec![Box::new(StaticSource(vec![])), Box::new(StaticSource(vec![]))];
        let keys = load_api_keys(&sources);
        assert!(keys.is_empty());
    }

    #[test]
    fn json_file_source_reads_valid_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"valid_keys": ["k1", "k2"]}}"#).unwrap();

        let source = JsonFileKeySource::new(file.path());
        let keys = source.load().unwrap();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn malformed_json_file_falls_through() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let source = JsonFileKeySource::new(file.path());
        assert!(source.load().is_none());
    }

    #[test]
    fn missing_file_falls_through() {
        let source = JsonFileKeySource::new("/nonexistent/api_keys.json");
        assert!(source.load().is_none());
    }

    #[test]
    fn env_source_splits_on_commas() {
        let var = "TEST_API_KEYS_SPLIT";
        std::env::set_var(var, "one, two ,three,");
        let source = EnvKeySource::new(var);
        let keys = source.load().unwrap();
        assert_eq!(keys, vec!["one", "two", "three"]);
        std::env::remove_var(var);
    }

    #[test]
    fn key_suffix_keeps_last_four() {
        assert_eq!(key_suffix("secret-key-1234"), "1234");
        assert_eq!(key_suffix("abc"), "abc");
    }
}
