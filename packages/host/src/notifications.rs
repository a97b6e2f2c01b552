use framelink_protocol::FrameNotification;

use crate::error::HandlerError;

/// A fixed point in mid-2023, in milliseconds. Timestamps far from it in
/// either direction are taken to be seconds or microseconds.
const REFERENCE_MILLIS: f64 = 1_690_803_917_545.0;

/// Whether a timestamp looks like milliseconds since the epoch.
pub fn is_millisecond_timestamp(timestamp: i64) -> bool {
    if timestamp <= 0 {
        return false;
    }
    let timestamp = timestamp as f64;
    timestamp / REFERENCE_MILLIS <= 10.0 && REFERENCE_MILLIS / timestamp <= 1.5
}

/// Check notifications before they reach the store.
///
/// Field types and urgency are enforced by deserialization; what is left
/// is the timestamp unit and non-empty titles.
pub fn validate_notifications(notifications: &[FrameNotification]) -> Result<(), HandlerError> {
    for notification in notifications {
        if notification.title.trim().is_empty() {
            return Err(HandlerError::InvalidRequest(
                "received a notification without a title".into(),
            ));
        }
        if !is_millisecond_timestamp(notification.timestamp) {
            return Err(HandlerError::InvalidRequest(format!(
                "received a notification with a timestamp that's not in millisecond format: {}",
                notification.timestamp
            )));
        }
    }
    Ok(())
}
