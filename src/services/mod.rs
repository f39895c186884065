pub mod chat;
pub mod classes;
pub mod events;
pub mod fcm;
pub mod init;
pub mod push;
pub mod reminders;
pub mod schedule;

/// Treat absent and blank document fields alike.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
