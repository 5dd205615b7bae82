//! The external template-renderer seam. The actual renderer is out of
//! scope; this crate ships a plain-text/HTML fallback behind the trait so
//! the dispatcher has something to delegate to.

use crate::vendor::types::Alert;

pub trait AlertRenderer: Send + Sync {
    fn render_detail(&self, alert: &Alert) -> String;
    fn render_notification(&self, alert: &Alert) -> String;
}

/// Minimal fallback implementation: escapes nothing fancy, just lays out
/// the fields a caller would need while a real template renderer is wired
/// in by the host.
pub struct FallbackRenderer;

impl AlertRenderer for FallbackRenderer {
    fn render_detail(&self, alert: &Alert) -> String {
        format!(
            "<div class=\"alert-detail\"><h1>{}</h1><p>{}</p></div>",
            html_escape(&alert.headline),
            html_escape(&alert.alert_type.name),
        )
    }

    fn render_notification(&self, alert: &Alert) -> String {
        format!("<div class=\"alert-notification\">{}</div>", html_escape(&alert.headline))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
