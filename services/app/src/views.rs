//! Presentation leaves mounted by the composition root.

use coach_core::{AppConfig, ConnectionState};

/// Which screen the view controller shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Welcome {
        start_button_text: String,
    },
    Session {
        supports_chat_input: bool,
        supports_video_input: bool,
        supports_screen_share: bool,
    },
}

/// Routes between the welcome and session views. Keyed by config and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewController {
    pub app_config: AppConfig,
    pub mode: Option<String>,
}

impl ViewController {
    pub fn new(app_config: AppConfig, mode: Option<String>) -> Self {
        Self { app_config, mode }
    }

    pub fn view(&self, state: ConnectionState) -> View {
        match state {
            ConnectionState::Disconnected => View::Welcome {
                start_button_text: self.app_config.start_button_text.clone(),
            },
            ConnectionState::Connecting | ConnectionState::Connected => View::Session {
                supports_chat_input: self.app_config.supports_chat_input,
                supports_video_input: self.app_config.supports_video_input,
                supports_screen_share: self.app_config.supports_screen_share,
            },
        }
    }
}

/// Affordance that unlocks audio playback after a user gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAudioButton {
    pub label: &'static str,
}

impl Default for StartAudioButton {
    fn default() -> Self {
        Self {
            label: "Start Audio",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_follows_connection_state() {
        let controller = ViewController::new(
            AppConfig {
                start_button_text: "Begin check-in".to_string(),
                supports_video_input: true,
                ..Default::default()
            },
            Some("review".to_string()),
        );

        assert_eq!(
            controller.view(ConnectionState::Disconnected),
            View::Welcome {
                start_button_text: "Begin check-in".to_string()
            }
        );
        let expected = View::Session {
            supports_chat_input: true,
            supports_video_input: true,
            supports_screen_share: false,
        };
        assert_eq!(controller.view(ConnectionState::Connecting), expected);
        assert_eq!(controller.view(ConnectionState::Connected), expected);
    }

    #[test]
    fn test_start_audio_label() {
        assert_eq!(StartAudioButton::default().label, "Start Audio");
    }
}
