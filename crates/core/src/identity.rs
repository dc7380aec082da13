//! Agent Identity Resolution
//!
//! Works out which agent the client should ask for. The static default comes
//! from [`AppConfig`]; the URL `mode` parameter can swap it for the review coach.

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// The query parameter that carries the session mode.
pub const MODE_PARAM: &str = "mode";
/// The mode value that switches to the review agent.
pub const REVIEW_MODE: &str = "review";
/// The agent dispatched for review sessions.
pub const REVIEW_AGENT_NAME: &str = "review-coach";

/// Static application configuration, owned by whoever mounts the app.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub company_name: String,
    pub page_title: String,
    pub page_description: String,
    pub start_button_text: String,
    pub supports_chat_input: bool,
    pub supports_video_input: bool,
    pub supports_screen_share: bool,
    pub is_pre_connect_buffer_enabled: bool,
    /// The agent to dispatch by default. Empty means no explicit dispatch.
    pub agent_name: String,
    /// Identifies the sandbox when connection details come from a sandbox endpoint.
    pub sandbox_id: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            company_name: "Coach".to_string(),
            page_title: "Weekly Coach".to_string(),
            page_description: "A short weekly focus check with your voice coach".to_string(),
            start_button_text: "Start session".to_string(),
            supports_chat_input: true,
            supports_video_input: false,
            supports_screen_share: false,
            is_pre_connect_buffer_enabled: true,
            agent_name: String::new(),
            sandbox_id: None,
        }
    }
}

/// Returns the agent name to use for the given mode.
pub fn resolve_agent_name(mode: Option<&str>, default_agent_name: &str) -> String {
    if mode == Some(REVIEW_MODE) {
        REVIEW_AGENT_NAME.to_string()
    } else {
        default_agent_name.to_string()
    }
}

/// Extracts the first `mode` query parameter from a page URL.
pub fn mode_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == MODE_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// [`AppConfig`] with the agent name replaced by the effective one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub app: AppConfig,
}

impl EffectiveConfig {
    pub fn resolve(app_config: &AppConfig, mode: Option<&str>) -> Self {
        let agent_name = resolve_agent_name(mode, &app_config.agent_name);
        Self::with_agent_name(app_config, agent_name)
    }

    pub fn with_agent_name(app_config: &AppConfig, agent_name: String) -> Self {
        Self {
            app: AppConfig {
                agent_name,
                ..app_config.clone()
            },
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.app.agent_name
    }

    /// The agent name, or `None` when it is empty.
    pub fn dispatch_agent_name(&self) -> Option<&str> {
        Some(self.agent_name()).filter(|name| !name.is_empty())
    }

    pub fn sandbox_id(&self) -> Option<&str> {
        self.app.sandbox_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_agent_name_review_mode() {
        assert_eq!(resolve_agent_name(Some("review"), "support-bot"), "review-coach");
        assert_eq!(resolve_agent_name(Some("review"), ""), "review-coach");
    }

    #[test]
    fn test_resolve_agent_name_other_modes_keep_default() {
        for mode in [None, Some(""), Some("Review"), Some("review "), Some("coach")] {
            assert_eq!(resolve_agent_name(mode, "support-bot"), "support-bot");
        }
        assert_eq!(resolve_agent_name(None, ""), "");
    }

    #[test]
    fn test_mode_from_url() {
        let url = Url::parse("http://localhost:3000/?mode=review&mode=other").unwrap();
        assert_eq!(mode_from_url(&url), Some("review".to_string()));

        let url = Url::parse("http://localhost:3000/?foo=bar").unwrap();
        assert_eq!(mode_from_url(&url), None);

        let url = Url::parse("http://localhost:3000/?mode=").unwrap();
        assert_eq!(mode_from_url(&url), Some(String::new()));
    }

    #[test]
    fn test_effective_config_overrides_only_agent_name() {
        let app = AppConfig {
            agent_name: "support-bot".to_string(),
            sandbox_id: Some("sbx-1".to_string()),
            ..Default::default()
        };

        let review = EffectiveConfig::resolve(&app, Some("review"));
        assert_eq!(review.agent_name(), "review-coach");
        assert_eq!(review.sandbox_id(), Some("sbx-1"));
        assert_eq!(review.app.page_title, app.page_title);

        let default = EffectiveConfig::resolve(&app, None);
        assert_eq!(default.agent_name(), "support-bot");
        assert_eq!(default.app, app);
    }

    #[test]
    fn test_dispatch_agent_name_filters_empty() {
        let empty = EffectiveConfig::resolve(&AppConfig::default(), None);
        assert_eq!(empty.dispatch_agent_name(), None);

        let named = EffectiveConfig::with_agent_name(&AppConfig::default(), "x".to_string());
        assert_eq!(named.dispatch_agent_name(), Some("x"));
    }
}
