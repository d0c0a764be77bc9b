//! Environment-derived settings, resolved once at startup.

use anyhow::{Result, anyhow};
use reqwest::Url;
use std::sync::OnceLock;

use crate::config::Config;

/// Backend origin used when the client runs on a development host.
pub const LOCAL_BACKEND_ORIGIN: &str = "http://127.0.0.1:18181";

/// Environment variable carrying an explicit base URL.
pub const API_BASE_ENV: &str = "AIREMOVER_API_BASE";

static GLOBAL: OnceLock<Settings> = OnceLock::new();

/// Read-only view of where requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    page_origin: String,
    base_url: String,
}

impl Settings {
    /// Build settings for a page origin and an optional explicit base.
    pub fn new(page_origin: &str, override_url: Option<&str>) -> Result<Self> {
        let origin = Url::parse(page_origin)
            .map_err(|e| anyhow!("invalid site origin '{page_origin}': {e}"))?;
        let hostname = origin.host_str().unwrap_or_default();
        Ok(Self {
            page_origin: trim_slash(page_origin).to_string(),
            base_url: resolve_base_url(hostname, override_url),
        })
    }

    /// Resolve from config, letting the environment override take priority.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let env_override = std::env::var(API_BASE_ENV).ok();
        let override_url = env_override
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(Some(cfg.api.base_url.as_str()).filter(|s| !s.trim().is_empty()));
        Self::new(&cfg.site.origin, override_url)
    }

    /// The resolved base; empty means same-origin.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_origin(&self) -> &str {
        &self.page_origin
    }

    /// Origin requests are actually sent to.
    pub fn effective_origin(&self) -> &str {
        if self.base_url.is_empty() {
            &self.page_origin
        } else {
            &self.base_url
        }
    }

    /// Absolute URL for an API path such as `/api/dewatermark`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.effective_origin(), path)
    }

    /// Leave absolute URLs alone and prefix relative ones with the origin.
    pub fn resolve_result_url(&self, processed_url: &str) -> String {
        if Url::parse(processed_url).is_ok() {
            processed_url.to_string()
        } else {
            format!("{}{}", self.effective_origin(), processed_url)
        }
    }
}

/// Pick the backend base: explicit override, then development host, then same-origin.
pub fn resolve_base_url(hostname: &str, override_url: Option<&str>) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|s| !s.is_empty()) {
        return trim_slash(url).to_string();
    }
    if hostname == "localhost" || hostname == "127.0.0.1" {
        return LOCAL_BACKEND_ORIGIN.to_string();
    }
    String::new()
}

/// Install the process-wide settings. The first call wins.
pub fn install(settings: Settings) -> &'static Settings {
    GLOBAL.get_or_init(|| settings)
}

fn trim_slash(s: &str) -> &str {
    s.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_hosts_use_local_backend() {
        assert_eq!(resolve_base_url("localhost", None), LOCAL_BACKEND_ORIGIN);
        assert_eq!(resolve_base_url("127.0.0.1", None), LOCAL_BACKEND_ORIGIN);
    }

    #[test]
    fn test_other_hosts_are_same_origin() {
        assert_eq!(resolve_base_url("www.airemover.im", None), "");
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            resolve_base_url("localhost", Some("https://api.x.test/")),
            "https://api.x.test"
        );
        // A blank override is ignored.
        assert_eq!(resolve_base_url("localhost", Some("  ")), LOCAL_BACKEND_ORIGIN);
    }

    #[test]
    fn test_endpoint_url_same_origin() {
        let s = Settings::new("https://www.airemover.im/", None).unwrap();
        assert_eq!(s.base_url(), "");
        assert_eq!(
            s.endpoint_url("/api/remove-background"),
            "https://www.airemover.im/api/remove-background"
        );
    }

    #[test]
    fn test_result_url_resolution() {
        let s = Settings::new("https://site.test", Some("https://x.test")).unwrap();
        assert_eq!(
            s.resolve_result_url("/files/abc.png"),
            "https://x.test/files/abc.png"
        );
        assert_eq!(
            s.resolve_result_url("https://file.302.ai/out.png"),
            "https://file.302.ai/out.png"
        );
    }

    #[test]
    fn test_invalid_origin_is_error() {
        assert!(Settings::new("not a url", None).is_err());
    }
}
