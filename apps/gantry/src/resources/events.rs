use gantry_proto::{EventRecord, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeverityFilter {
    #[default]
    All,
    Only(Severity),
}

/// Client-side display filter for the event resource. Applies only to what
/// is shown, never to what is fetched, and has no persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub severity: SeverityFilter,
    /// Inclusive lower bound on the event timestamp, in ms.
    pub since_ms: Option<i64>,
}

impl EventFilter {
    pub fn matches(&self, event: &EventRecord) -> bool {
        let severity_ok = match self.severity {
            SeverityFilter::All => true,
            SeverityFilter::Only(severity) => event.severity == severity,
        };
        let since_ok = self
            .since_ms
            .map(|bound| event.timestamp_ms >= bound)
            .unwrap_or(true);
        severity_ok && since_ok
    }

    /// Pure, idempotent projection of a snapshot; the snapshot itself is
    /// never mutated.
    pub fn apply(&self, events: &[EventRecord]) -> Vec<EventRecord> {
        events.iter().filter(|ev| self.matches(ev)).cloned().collect()
    }
}
