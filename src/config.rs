//! Monitor configuration.

/// Configuration for a [`Monitor`](crate::monitor::Monitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Name used in log fields and notification thread names.
    pub name: String,
}

impl MonitorConfig {
    /// Configuration with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Notification thread name. Interior NUL bytes are not valid in thread names.
    pub(crate) fn thread_name(&self) -> String {
        format!("nested-{}-notify", self.name.replace('\0', ""))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: "monitor".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.name, "monitor");
        assert_eq!(cfg.thread_name(), "nested-monitor-notify");
    }

    #[test]
    fn named_config() {
        assert_eq!(MonitorConfig::named("db").thread_name(), "nested-db-notify");
    }

    #[test]
    fn thread_name_strips_nul() {
        assert_eq!(MonitorConfig::named("a\0b").thread_name(), "nested-ab-notify");
    }
}
