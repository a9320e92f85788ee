//! Backend health state machine.
//!
//! Tracks whether the remote store is usable and what the clerk should be
//! told when it is not. `ConfigMissing` is decided once at startup and never
//! left; the other states move on classified errors and successful pushes.

use crate::config::RemoteConfig;
use crate::remote::RemoteError;

/// Why the remote store is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradedReason {
    DatabaseMissing,
    PermissionDenied,
    ConnectivityLoss,
}

impl From<&RemoteError> for DegradedReason {
    fn from(error: &RemoteError) -> Self {
        match error {
            RemoteError::DatabaseMissing(_) => Self::DatabaseMissing,
            RemoteError::PermissionDenied(_) => Self::PermissionDenied,
            RemoteError::ConnectivityLoss(_) | RemoteError::NotFound(_) | RemoteError::Unknown(_) => {
                Self::ConnectivityLoss
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendHealth {
    Synced,
    Degraded(DegradedReason),
    ConfigMissing,
}

impl BackendHealth {
    #[must_use]
    pub const fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }

    #[must_use]
    pub const fn reason(self) -> Option<DegradedReason> {
        match self {
            Self::Degraded(reason) => Some(reason),
            Self::Synced | Self::ConfigMissing => None,
        }
    }
}

impl std::fmt::Display for BackendHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synced => f.write_str("synced"),
            Self::Degraded(DegradedReason::DatabaseMissing) => f.write_str("degraded (database missing)"),
            Self::Degraded(DegradedReason::PermissionDenied) => f.write_str("degraded (permission denied)"),
            Self::Degraded(DegradedReason::ConnectivityLoss) => f.write_str("degraded (offline)"),
            Self::ConfigMissing => f.write_str("local only (not configured)"),
        }
    }
}

/// Console links that fix a degraded backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationLinks {
    pub setup: String,
    pub rules: String,
}

impl From<&RemoteConfig> for RemediationLinks {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            setup: config.setup_link(),
            rules: config.rules_link(),
        }
    }
}

/// Persistent notice shown while not synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

/// A state change, `from == to` when nothing moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BackendHealth,
    pub to: BackendHealth,
}

impl Transition {
    #[must_use]
    pub fn changed(self) -> bool {
        self.from != self.to
    }

    /// Whether this transition newly entered the given reason.
    #[must_use]
    pub fn entered(self, reason: DegradedReason) -> bool {
        self.changed() && self.to == BackendHealth::Degraded(reason)
    }
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    state: BackendHealth,
    links: Option<RemediationLinks>,
}

impl HealthMonitor {
    /// Monitor for a configured remote store. Starts out synced.
    #[must_use]
    pub const fn configured(links: Option<RemediationLinks>) -> Self {
        Self {
            state: BackendHealth::Synced,
            links,
        }
    }

    /// Monitor with no remote store at all. Stays `ConfigMissing` forever.
    #[must_use]
    pub const fn config_missing() -> Self {
        Self {
            state: BackendHealth::ConfigMissing,
            links: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> BackendHealth {
        self.state
    }

    /// Move to the degraded state matching a classified error.
    pub fn record_error(&mut self, error: &RemoteError) -> Transition {
        self.move_to(BackendHealth::Degraded(DegradedReason::from(error)))
    }

    /// A subscription delivered data. Only a non-empty push heals.
    pub fn record_push(&mut self, non_empty: bool) -> Transition {
        if non_empty {
            self.move_to(BackendHealth::Synced)
        } else {
            self.stay()
        }
    }

    fn move_to(&mut self, next: BackendHealth) -> Transition {
        if self.state == BackendHealth::ConfigMissing {
            return self.stay();
        }
        let from = self.state;
        self.state = next;
        if from != next {
            tracing::info!(from = %from, to = %next, "backend health changed");
        }
        Transition { from, to: next }
    }

    const fn stay(&self) -> Transition {
        Transition {
            from: self.state,
            to: self.state,
        }
    }

    /// Banner for the current state, `None` when synced.
    #[must_use]
    pub fn banner(&self) -> Option<Banner> {
        let setup = self.links.as_ref().map(|l| l.setup.clone());
        let rules = self.links.as_ref().map(|l| l.rules.clone());
        let (title, message, link) = match self.state {
            BackendHealth::Synced => return None,
            BackendHealth::Degraded(DegradedReason::DatabaseMissing) => (
                "Database not created",
                "The cloud database does not exist yet. Sales are saved on this device until it is created.",
                setup,
            ),
            BackendHealth::Degraded(DegradedReason::PermissionDenied) => (
                "Access denied",
                "Security rules reject this app. Update the rules, then retry.",
                rules,
            ),
            BackendHealth::Degraded(DegradedReason::ConnectivityLoss) => (
                "Offline",
                "Cannot reach the server. Working from data saved on this device.",
                None,
            ),
            BackendHealth::ConfigMissing => (
                "Local mode",
                "No database is configured. Data is kept on this device only.",
                None,
            ),
        };
        Some(Banner {
            title: title.to_string(),
            message: message.to_string(),
            link,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn links() -> RemediationLinks {
        RemediationLinks {
            setup: "https://setup.example/p".to_string(),
            rules: "https://rules.example/p".to_string(),
        }
    }

    #[test]
    fn test_error_reasons() {
        let mut monitor = HealthMonitor::configured(Some(links()));
        let t = monitor.record_error(&RemoteError::NotFound("doc".to_string()));
        assert!(t.entered(DegradedReason::ConnectivityLoss));

        let t = monitor.record_error(&RemoteError::PermissionDenied("rules".to_string()));
        assert_eq!(t.to, BackendHealth::Degraded(DegradedReason::PermissionDenied));
        assert_eq!(monitor.banner().unwrap().link.as_deref(), Some("https://rules.example/p"));
    }

    #[test]
    fn test_repeated_error_is_not_a_new_entry() {
        let mut monitor = HealthMonitor::configured(None);
        let error = RemoteError::ConnectivityLoss("down".to_string());
        assert!(monitor.record_error(&error).entered(DegradedReason::ConnectivityLoss));
        assert!(!monitor.record_error(&error).entered(DegradedReason::ConnectivityLoss));
    }

    #[test]
    fn test_only_non_empty_push_heals() {
        let mut monitor = HealthMonitor::configured(Some(links()));
        monitor.record_error(&RemoteError::DatabaseMissing("gone".to_string()));
        assert_eq!(monitor.banner().unwrap().link.as_deref(), Some("https://setup.example/p"));

        assert!(!monitor.record_push(false).changed());
        assert!(monitor.record_push(true).changed());
        assert!(monitor.state().is_synced());
        assert!(monitor.banner().is_none());
    }

    #[test]
    fn test_config_missing_is_sticky() {
        let mut monitor = HealthMonitor::config_missing();
        monitor.record_error(&RemoteError::ConnectivityLoss("down".to_string()));
        monitor.record_push(true);
        assert_eq!(monitor.state(), BackendHealth::ConfigMissing);
        assert_eq!(monitor.banner().unwrap().title, "Local mode");
    }
}
