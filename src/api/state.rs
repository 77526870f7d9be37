use crate::services::{Database, LegacyHistory, RelayService};

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub legacy_history: LegacyHistory,
    pub relay: RelayService,
}

impl AppState {
    pub fn new(db: Database, legacy_history: LegacyHistory, relay: RelayService) -> Self {
        Self {
            db,
            legacy_history,
            relay,
        }
    }
}
