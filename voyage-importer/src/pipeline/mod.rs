pub mod assets;
pub mod executor;
pub mod orchestrator;
pub mod resolve;
pub mod sequence;
pub mod verify;

/// Append-only record of the operator decisions and automatic
/// resolutions made during one run; persisted with the batch as the
/// import-run audit row.
#[derive(Debug, Clone, Default)]
pub struct DecisionLog {
    entries: Vec<String>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
