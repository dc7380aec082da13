//! The toast/notification surface.
//!
//! Effects push [`Notification`]s through a [`Notifier`]; whoever owns the
//! receiving end presents them.

use tokio::sync::mpsc;
use tracing::warn;

/// A warning toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

/// Sending half of the notification surface.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn warning(&self, title: impl Into<String>, description: impl Into<String>) {
        let notification = Notification {
            title: title.into(),
            description: description.into(),
        };
        if self.tx.send(notification).is_err() {
            warn!("Notification dropped: surface is no longer mounted.");
        }
    }
}

pub fn notification_channel() -> (Notifier, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, rx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub name: &'static str,
    pub weight: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastIcons {
    pub warning: Icon,
}

/// Presentation bindings for the toast surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toaster {
    pub position: &'static str,
    pub class_name: &'static str,
    pub style: Vec<(&'static str, &'static str)>,
    pub icons: ToastIcons,
}

impl Default for Toaster {
    fn default() -> Self {
        Self {
            position: "top-center",
            class_name: "toaster group",
            style: vec![
                ("--normal-bg", "var(--popover)"),
                ("--normal-text", "var(--popover-foreground)"),
                ("--normal-border", "var(--border)"),
            ],
            icons: ToastIcons {
                warning: Icon {
                    name: "warning",
                    weight: "bold",
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_delivers_warnings() {
        let (notifier, mut rx) = notification_channel();
        notifier.warning("Session ended", "agent crashed");

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification {
                title: "Session ended".to_string(),
                description: "agent crashed".to_string(),
            }
        );
    }

    #[test]
    fn test_notifier_survives_dropped_surface() {
        let (notifier, rx) = notification_channel();
        drop(rx);
        notifier.warning("Session ended", "nobody is listening");
    }

    #[test]
    fn test_toaster_bindings() {
        let toaster = Toaster::default();
        assert_eq!(toaster.position, "top-center");
        assert_eq!(toaster.class_name, "toaster group");
        assert_eq!(toaster.style[0], ("--normal-bg", "var(--popover)"));
        assert_eq!(toaster.icons.warning.weight, "bold");
    }
}
