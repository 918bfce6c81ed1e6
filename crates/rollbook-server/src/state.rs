use std::sync::Arc;

use rollbook_ledger::{EventRecorder, Ledger};
use rollbook_store::LedgerMirror;

use crate::config::ServerConfig;

/// Shared handler state. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub recorder: EventRecorder,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(recorder: EventRecorder, config: ServerConfig) -> Self {
        Self {
            recorder,
            config: Arc::new(config),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        self.recorder.ledger()
    }

    pub fn mirror(&self) -> &dyn LedgerMirror {
        self.recorder.mirror().as_ref()
    }
}
