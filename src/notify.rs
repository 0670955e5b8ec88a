//! System notifications.

use notify_rust::Notification;
use tracing::field::{Field, Visit};
use tracing::{error, Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::icon::ICON_PATH;
use crate::{APP_NAME, APP_NAME_PRETTY};

/// Notification bodies never exceed this many characters.
pub const ERROR_PREVIEW_CHARS: usize = 100;
/// Preview length for delivered text.
pub const TEXT_PREVIEW_CHARS: usize = 50;
/// Preview length for captured context shown at recording start.
pub const CONTEXT_PREVIEW_CHARS: usize = 30;

/// Send a system notification with a summary and body. Best effort; a
/// render failure is logged and otherwise ignored.
pub fn notify(summary: &str, body: &str) {
    Notification::new()
        .icon(ICON_PATH)
        .appname(APP_NAME)
        .summary(&format!("{} - {}", APP_NAME_PRETTY, summary))
        .body(body)
        .show()
        .map_err(|e| error!("Failed to send notification: {}", e))
        .ok();
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut. Operates on characters, not bytes, so multi-byte text
/// never splits mid-codepoint.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

/// Visitor to extract the message field from tracing events.
struct MessageVisitor {
    message: Option<String>,
}

impl MessageVisitor {
    fn new() -> Self {
        Self { message: None }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}

/// Tracing layer that sends notifications for warnings and errors, so no
/// session failure is silent.
#[derive(Debug, Default)]
pub struct NotificationLayer {}

impl NotificationLayer {
    pub fn new() -> Self {
        Self {}
    }
}

fn should_notify(level: Level) -> Option<&'static str> {
    match level {
        Level::ERROR => Some("error"),
        Level::WARN => Some("warning"),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for NotificationLayer {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        let level = *event.metadata().level();

        if let Some(summary) = should_notify(level) {
            let mut visitor = MessageVisitor::new();
            event.record(&mut visitor);

            if let Some(message) = visitor.message {
                notify(summary, &preview(&message, ERROR_PREVIEW_CHARS));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("exactly_10", 10), "exactly_10");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        assert_eq!(preview("hello world", 5), "hello...");
    }

    #[test]
    fn test_preview_is_codepoint_safe() {
        let text = "héllo wörld ünïcode";
        let short = preview(text, 7);
        assert_eq!(short, "héllo w...");
        // Still valid UTF-8 by construction; no panic on multi-byte input.
        assert!(short.chars().count() <= 7 + 3);
    }
}
