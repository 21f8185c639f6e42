use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use nyaya_core::{Roster, RosterVariant};
use nyaya_service::ServiceConfig;
use url::Url;

/// Streaming endpoint, relative to the service URL.
const ANALYZE_SEGMENTS: [&str; 2] = ["ws", "analyze"];

/// Runtime configuration. Built from defaults, then environment, then CLI
/// flags.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub service_url: String,
    pub roster: RosterVariant,
    pub request_timeout: Duration,
    /// Holds the anomaly journal.
    pub home: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8000".into(),
            roster: RosterVariant::Standard,
            request_timeout: Duration::from_secs(120),
            home: home_dir().join(".nyaya"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply `NYAYA_*` overrides from `lookup` on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("NYAYA_SERVICE_URL").filter(|v| !v.trim().is_empty()) {
            config.service_url = url.trim().to_string();
        }
        if let Some(roster) = lookup("NYAYA_ROSTER") {
            config.roster = roster
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid NYAYA_ROSTER")?;
        }
        if let Some(secs) = lookup("NYAYA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid NYAYA_REQUEST_TIMEOUT_SECS: {secs}"))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(home) = lookup("NYAYA_HOME").filter(|v| !v.trim().is_empty()) {
            config.home = PathBuf::from(home);
        }
        Ok(config)
    }

    pub fn roster(&self) -> Roster {
        Roster::for_variant(self.roster)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.home.join("journal.db")
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            base_url: self.service_url.clone(),
            request_timeout: self.request_timeout,
        }
    }

    /// The streaming endpoint: the service URL with a `ws`/`wss` scheme and
    /// `ws/analyze` appended to its path. Query parameters are kept.
    pub fn ws_endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(self.service_url.trim())
            .with_context(|| format!("invalid service URL: {}", self.service_url))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => bail!("unsupported service URL scheme: {other}"),
        };
        url.set_scheme(scheme)
            .map_err(|()| anyhow!("cannot use {scheme} for {}", self.service_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("service URL cannot carry a path: {}", self.service_url))?
            .pop_if_empty()
            .extend(ANALYZE_SEGMENTS);
        url.set_fragment(None);
        Ok(url)
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.service_url, "http://localhost:8000");
        assert_eq!(config.roster, RosterVariant::Standard);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.journal_path().ends_with(".nyaya/journal.db"));
        assert_eq!(config.roster().len(), 4);
    }

    #[test]
    fn env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NYAYA_SERVICE_URL", "https://bench.example.org"),
            ("NYAYA_ROSTER", "extended"),
            ("NYAYA_REQUEST_TIMEOUT_SECS", "30"),
            ("NYAYA_HOME", "/var/lib/nyaya"),
        ]))
        .unwrap();
        assert_eq!(config.service_url, "https://bench.example.org");
        assert_eq!(config.roster().len(), 5);
        assert_eq!(config.service_config().request_timeout, Duration::from_secs(30));
        assert_eq!(config.journal_path(), PathBuf::from("/var/lib/nyaya/journal.db"));
    }

    #[test]
    fn bad_env_values_are_errors() {
        assert!(AppConfig::from_lookup(lookup(&[("NYAYA_ROSTER", "six")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("NYAYA_REQUEST_TIMEOUT_SECS", "soon")])).is_err());
    }

    fn endpoint(service_url: &str) -> Result<String> {
        let config = AppConfig {
            service_url: service_url.into(),
            ..AppConfig::default()
        };
        config.ws_endpoint().map(String::from)
    }

    #[test]
    fn ws_endpoint_follows_scheme() {
        assert_eq!(
            AppConfig::default().ws_endpoint().unwrap().as_str(),
            "ws://localhost:8000/ws/analyze"
        );
        assert_eq!(
            endpoint("https://bench.example.org/").unwrap(),
            "wss://bench.example.org/ws/analyze"
        );
        assert_eq!(
            endpoint("wss://bench.example.org:9443").unwrap(),
            "wss://bench.example.org:9443/ws/analyze"
        );

        assert!(endpoint("ftp://bench.example.org").is_err());
        assert!(endpoint("localhost:8000").is_err());
        assert!(endpoint("not a url").is_err());
    }

    #[test]
    fn ws_endpoint_keeps_query_and_base_path() {
        assert_eq!(
            endpoint("http://bench.example.org:8000/?tenant=gov").unwrap(),
            "ws://bench.example.org:8000/ws/analyze?tenant=gov"
        );
        assert_eq!(
            endpoint("https://gov.example.org/bench/").unwrap(),
            "wss://gov.example.org/bench/ws/analyze"
        );
        assert_eq!(
            endpoint("http://gov.example.org/bench?tenant=gov#top").unwrap(),
            "ws://gov.example.org/bench/ws/analyze?tenant=gov"
        );
    }
}
