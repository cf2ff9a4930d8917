//! User-visible failure reporting.

use std::cell::RefCell;

/// Where the editor reports failures the user should see
pub trait AlertSurface {
    fn show_error_alert(&self, message: &str, dismiss_label: &str);
}

/// One alert as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub dismiss_label: String,
}

/// Alert surface that keeps every alert it was asked to show
#[derive(Debug, Default)]
pub struct AlertLog {
    alerts: RefCell<Vec<Alert>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.borrow().is_empty()
    }

    /// Dismiss every alert, returning them
    pub fn take(&self) -> Vec<Alert> {
        self.alerts.take()
    }
}

impl AlertSurface for AlertLog {
    fn show_error_alert(&self, message: &str, dismiss_label: &str) {
        tracing::warn!("alert: {message}");
        self.alerts.borrow_mut().push(Alert {
            message: message.to_string(),
            dismiss_label: dismiss_label.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_log_records() {
        let log = AlertLog::new();
        assert!(log.is_empty());
        log.show_error_alert("connection loop", "Dismiss");
        assert_eq!(log.len(), 1);
        assert_eq!(log.alerts()[0].dismiss_label, "Dismiss");

        let taken = log.take();
        assert_eq!(taken[0].message, "connection loop");
        assert!(log.is_empty());
    }
}
