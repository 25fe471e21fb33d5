//! Remote service configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the remote service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL the resource and health paths are appended to
    pub base_url: String,

    /// Path segment of the resource collection
    pub resource_path: String,

    /// Path probed by the liveness check
    pub health_path: String,

    /// Per-attempt request timeout in seconds
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Seconds between liveness probes
    pub probe_interval_secs: u64,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            resource_path: "resource".to_string(),
            health_path: "health".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            probe_interval_secs: 30,
            token: None,
        }
    }
}

impl RemoteConfig {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Interval between liveness probes
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Health path split into URL segments
    pub fn health_segments(&self) -> Vec<&str> {
        self.health_path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl ConfigSection for RemoteConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.base_url, "remote.base_url"),
            Validator::path_segment(&self.resource_path, "remote.resource_path"),
            Validator::in_range(self.timeout_secs, 1, 600, "remote.timeout_secs"),
            Validator::in_range(
                self.connect_timeout_secs,
                1,
                120,
                "remote.connect_timeout_secs",
            ),
            Validator::in_range(
                self.probe_interval_secs,
                1,
                3600,
                "remote.probe_interval_secs",
            ),
        ];

        if self.health_segments().is_empty() {
            results.push(Err(ValidationError::with_value(
                "remote.health_path",
                "must name at least one path segment",
                &self.health_path,
            )));
        }

        if let Some(token) = &self.token {
            results.push(Validator::not_empty(token, "remote.token"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.resource_path = other.resource_path;
        self.health_path = other.health_path;
        self.timeout_secs = other.timeout_secs;
        self.connect_timeout_secs = other.connect_timeout_secs;
        self.probe_interval_secs = other.probe_interval_secs;
        if other.token.is_some() {
            self.token = other.token;
        }
    }

    fn section_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RemoteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = RemoteConfig {
            base_url: "localhost".to_string(),
            resource_path: "a/b".to_string(),
            timeout_secs: 0,
            ..Default::default()
        };

        let errors = config.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["remote.base_url", "remote.resource_path", "remote.timeout_secs"]
        );
    }

    #[test]
    fn test_health_segments() {
        let config = RemoteConfig {
            health_path: "/status/live/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.health_segments(), vec!["status", "live"]);

        let config = RemoteConfig {
            health_path: "/".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_keeps_token_when_other_has_none() {
        let mut base = RemoteConfig {
            token: Some("secret".to_string()),
            ..Default::default()
        };
        base.merge(RemoteConfig {
            timeout_secs: 5,
            ..Default::default()
        });

        assert_eq!(base.token.as_deref(), Some("secret"));
        assert_eq!(base.timeout_secs, 5);
    }
}
