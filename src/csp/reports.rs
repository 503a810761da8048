use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::debug;

/// In-memory store of posted CSP violation reports.
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: Mutex<Vec<Value>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the `csp-report` member of a posted report object.
    ///
    /// Objects without that member are accepted and dropped.
    pub fn record(&self, report: &serde_json::Map<String, Value>) {
        if let Some(inner) = report.get("csp-report") {
            if let Ok(mut reports) = self.reports.lock() {
                reports.push(inner.clone());
                debug!(total = reports.len(), "CSP violation report stored");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{"csp-reports": [...]}` snapshot.
    pub fn to_json(&self) -> Value {
        let reports = self
            .reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default();
        json!({ "csp-reports": reports })
    }
}
