#![forbid(unsafe_code)]

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "verbose" | "0" => Some(Self::Verbose),
            "information" | "info" | "1" => Some(Self::Information),
            "warning" | "warn" | "2" => Some(Self::Warning),
            "error" | "3" => Some(Self::Error),
            "critical" | "4" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Outcome of one call to an external dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyEvent {
    pub name: &'static str,
    pub target: String,
    pub kind: &'static str,
    pub response_code: u16,
    pub duration: Duration,
    pub success: bool,
}

/// Fire-and-forget sink for traces, exceptions and dependency calls.
///
/// Implementations must never fail or block the caller for long.
pub trait Telemetry: Send + Sync {
    fn trace(&self, message: &str, severity: Severity);
    fn exception(&self, error: &dyn std::error::Error, severity: Severity);
    fn dependency(&self, event: &DependencyEvent);
    fn event(&self, name: &str, severity: Severity);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn trace(&self, _message: &str, _severity: Severity) {}
    fn exception(&self, _error: &dyn std::error::Error, _severity: Severity) {}
    fn dependency(&self, _event: &DependencyEvent) {}
    fn event(&self, _name: &str, _severity: Severity) {}
}

/// Forwards telemetry to `tracing`, dropping anything less severe than `min_severity`.
#[derive(Clone, Debug)]
pub struct TracingTelemetry {
    component: String,
    min_severity: Severity,
}

impl TracingTelemetry {
    pub fn new(component: impl Into<String>, min_severity: Severity) -> Self {
        Self {
            component: component.into(),
            min_severity,
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

impl Telemetry for TracingTelemetry {
    fn trace(&self, message: &str, severity: Severity) {
        if !self.enabled(severity) {
            return;
        }
        let component = self.component.as_str();
        match severity {
            Severity::Verbose => tracing::debug!(component, "{message}"),
            Severity::Information => tracing::info!(component, "{message}"),
            Severity::Warning => tracing::warn!(component, "{message}"),
            Severity::Error | Severity::Critical => tracing::error!(component, "{message}"),
        }
    }

    fn exception(&self, error: &dyn std::error::Error, severity: Severity) {
        if !self.enabled(severity) {
            return;
        }
        let component = self.component.as_str();
        match severity {
            Severity::Critical => tracing::error!(component, critical = true, error = %error, "exception"),
            Severity::Error => tracing::error!(component, error = %error, "exception"),
            _ => tracing::warn!(component, error = %error, "exception"),
        }
    }

    fn dependency(&self, event: &DependencyEvent) {
        let severity = if event.success {
            Severity::Information
        } else {
            Severity::Error
        };
        if !self.enabled(severity) {
            return;
        }
        tracing::info!(
            component = self.component.as_str(),
            name = event.name,
            target = event.target.as_str(),
            kind = event.kind,
            response_code = event.response_code,
            duration_ms = event.duration.as_millis() as u64,
            success = event.success,
            "dependency"
        );
    }

    fn event(&self, name: &str, severity: Severity) {
        if !self.enabled(severity) {
            return;
        }
        tracing::info!(component = self.component.as_str(), event = name, "event");
    }
}
