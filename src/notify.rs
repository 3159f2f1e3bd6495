use crate::app::Notification;
use crate::model::BuildStatus;
use notify_rust::{Notification as DesktopNotification, Urgency};

pub fn send_desktop(pipeline: &str, notification: &Notification) {
    let (summary, icon, urgency) = match notification.status {
        Some(BuildStatus::Succeeded) => ("Build Passed", "dialog-information", Urgency::Normal),
        Some(BuildStatus::Failed | BuildStatus::Errored) => {
            ("Build Failed", "dialog-error", Urgency::Critical)
        }
        _ => ("Build Finished", "dialog-information", Urgency::Normal),
    };

    let body = format!("{pipeline}: {}", notification.message);

    if let Err(e) = DesktopNotification::new()
        .summary(summary)
        .body(&body)
        .icon(icon)
        .urgency(urgency)
        .show()
    {
        tracing::warn!("desktop notification failed: {e}");
    }
}
