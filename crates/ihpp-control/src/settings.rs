//! Proxy settings snapshot

use serde::{Deserialize, Serialize};

/// Settings of one proxy instance
///
/// This is both the record stored under `proxies` in the config file and
/// the snapshot serialized into a config row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    /// Address the proxy listens on (e.g. "127.0.0.1:20003")
    pub listen: String,

    /// Upstream URL requests are forwarded to
    pub target: String,

    /// Truncate request/response bodies in captured sessions
    #[serde(default)]
    pub truncate_log_body: bool,
}

impl ProxyEntry {
    pub fn new(listen: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            target: target.into(),
            truncate_log_body: false,
        }
    }

    pub fn with_truncate_log_body(mut self, truncate: bool) -> Self {
        self.truncate_log_body = truncate;
        self
    }

    /// Canonical JSON form stored in config rows
    pub fn to_snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_snapshot_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse the `LISTEN=TARGET` form used on the command line
    pub fn parse_flag(value: &str) -> Option<Self> {
        let (listen, target) = value.split_once('=')?;
        let (listen, target) = (listen.trim(), target.trim());
        if listen.is_empty() || target.is_empty() {
            return None;
        }
        Some(Self::new(listen, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_is_stable() {
        let entry = ProxyEntry::new("127.0.0.1:8080", "http://localhost:3000");
        let json = entry.to_snapshot_json().unwrap();
        assert_eq!(
            json,
            r#"{"listen":"127.0.0.1:8080","target":"http://localhost:3000","truncate_log_body":false}"#
        );
        assert_eq!(ProxyEntry::from_snapshot_json(&json).unwrap(), entry);
    }

    #[test]
    fn test_truncate_defaults_to_false() {
        let entry = ProxyEntry::from_snapshot_json(r#"{"listen":":1","target":"http://x"}"#).unwrap();
        assert!(!entry.truncate_log_body);
    }

    #[test]
    fn test_parse_flag() {
        let entry = ProxyEntry::parse_flag("127.0.0.1:8080=http://localhost:3000").unwrap();
        assert_eq!(entry.listen, "127.0.0.1:8080");
        assert_eq!(entry.target, "http://localhost:3000");

        assert!(ProxyEntry::parse_flag("no-separator").is_none());
        assert!(ProxyEntry::parse_flag("=http://x").is_none());
    }
}
