//! Parse notification / diagnostic system.
//!
//! Non-fatal issues encountered while reading or writing (dangling handles,
//! unknown group codes, names that never resolved) are collected as
//! [`Notification`] items on the document instead of being routed through a
//! process-wide logger. This keeps diagnostics per-document and the library
//! reentrant: two documents decoded in parallel never share mutable state.
//!
//! After an operation the caller inspects
//! [`crate::document::Document::notifications`].

use std::fmt;

use crate::types::Handle;

/// Severity level of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A section, object, or feature is not implemented.
    NotImplemented,
    /// Feature exists but is not supported in this context.
    NotSupported,
    /// Non-fatal warning (e.g. dangling handle, dropped group code).
    Warning,
    /// Error that was recovered from (e.g. one object failed to decode).
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented => write!(f, "NotImplemented"),
            Self::NotSupported => write!(f, "NotSupported"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A single notification produced during reading or writing.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The severity / category.
    pub severity: Severity,
    /// The object the issue was found on, when known.
    pub handle: Option<Handle>,
    /// A human-readable description of the issue.
    pub message: String,
}

impl Notification {
    /// Create a notification not tied to a particular object.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            handle: None,
            message: message.into(),
        }
    }

    /// Create a notification tied to the object with the given handle.
    pub fn on(severity: Severity, handle: Handle, message: impl Into<String>) -> Self {
        Self {
            severity,
            handle: Some(handle),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle {
            Some(h) => write!(f, "[{}] ({}) {}", self.severity, h, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Collects notifications during a read/write operation.
#[derive(Debug, Clone, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
}

impl NotificationCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record a notification with no object context.
    pub fn notify(&mut self, severity: Severity, message: impl Into<String>) {
        self.items.push(Notification::new(severity, message));
    }

    /// Record a notification against a specific object.
    pub fn notify_on(&mut self, severity: Severity, handle: Handle, message: impl Into<String>) {
        self.items.push(Notification::on(severity, handle, message));
    }

    /// Check if there are any notifications.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of notifications.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over all notifications.
    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.items.iter()
    }

    /// Check whether any notification of the given severity exists.
    pub fn has_severity(&self, severity: Severity) -> bool {
        self.items.iter().any(|n| n.severity == severity)
    }

    /// All notifications of a given severity.
    pub fn of_severity(&self, severity: Severity) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.severity == severity).collect()
    }
}

impl<'a> IntoIterator for &'a NotificationCollection {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_creation() {
        let n = Notification::new(Severity::Warning, "dangling handle");
        assert_eq!(n.severity, Severity::Warning);
        assert_eq!(n.message, "dangling handle");
        assert!(n.handle.is_none());
    }

    #[test]
    fn test_collection_basics() {
        let mut c = NotificationCollection::new();
        assert!(c.is_empty());

        c.notify(Severity::Warning, "w1");
        c.notify_on(Severity::Error, Handle::new(0x2A), "e1");

        assert_eq!(c.len(), 2);
        assert!(c.has_severity(Severity::Error));
        assert!(!c.has_severity(Severity::NotImplemented));
        assert_eq!(c.of_severity(Severity::Warning).len(), 1);
    }

    #[test]
    fn test_display_with_handle() {
        let n = Notification::on(Severity::Warning, Handle::new(0x1F), "layer not found");
        assert_eq!(format!("{}", n), "[Warning] (0x1F) layer not found");
    }
}
