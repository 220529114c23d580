//! Desktop notification helper.

use std::process::Command;

use tracing::debug;
use which::which;

/// Fire a local desktop notification, best effort. Uses the macOS
/// osascript bridge or notify-send where available and silently does
/// nothing on hosts without either.
pub fn notify(title: &str, message: &str) {
    if let Ok(osascript) = which("osascript") {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            message, title
        );
        if let Err(err) = Command::new(osascript).arg("-e").arg(script).status() {
            debug!(%err, "notification failed");
        }
        return;
    }

    if let Ok(notify_send) = which("notify-send") {
        if let Err(err) = Command::new(notify_send).arg(title).arg(message).status() {
            debug!(%err, "notification failed");
        }
        return;
    }

    debug!("no notification helper found, skipping");
}
