use std::sync::Arc;

use rollbook_ledger::EventRecorder;
use rollbook_store::{LedgerMirror, SqliteMirror};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The rollbook HTTP server.
pub struct RollbookServer {
    state: AppState,
}

impl RollbookServer {
    /// Open the SQLite mirror named in `config`, rebuild the ledger from it
    /// and get ready to serve.
    pub async fn open(config: ServerConfig) -> ServerResult<Self> {
        let mirror = SqliteMirror::connect(&config.database_url).await?;
        Self::with_mirror(config, Arc::new(mirror)).await
    }

    /// Serve over an already constructed mirror.
    pub async fn with_mirror(
        config: ServerConfig,
        mirror: Arc<dyn LedgerMirror>,
    ) -> ServerResult<Self> {
        let recorder = EventRecorder::open(mirror).await?;
        tracing::info!(
            entries = recorder.ledger().len().await,
            "ledger ready"
        );
        Ok(Self {
            state: AppState::new(recorder, config),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests until the process is stopped.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.state.config.bind_addr;
        let app = build_router(self.state);
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "rollbook server listening");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rollbook_ledger::LedgerError;
    use rollbook_store::InMemoryMirror;

    use super::*;

    #[tokio::test]
    async fn construction_creates_genesis() {
        let mirror = Arc::new(InMemoryMirror::new());
        let server = RollbookServer::with_mirror(ServerConfig::default(), mirror.clone())
            .await
            .unwrap();
        assert_eq!(server.config().chain_limit_default, 50);
        assert_eq!(mirror.count().await.unwrap(), 1);
        let _router = server.router();
    }

    #[tokio::test]
    async fn opens_sqlite_file_and_reopens_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            database_url: format!("sqlite://{}", dir.path().join("ledger.db").display()),
            ..ServerConfig::default()
        };
        let first = RollbookServer::open(config.clone()).await.unwrap();
        let genesis = first.state().ledger().genesis().await;
        drop(first);

        let second = RollbookServer::open(config).await.unwrap();
        assert_eq!(second.state().ledger().genesis().await, genesis);
    }

    #[tokio::test]
    async fn corrupt_mirror_refuses_to_start() {
        let mirror = Arc::new(InMemoryMirror::new());
        RollbookServer::with_mirror(ServerConfig::default(), mirror.clone())
            .await
            .unwrap();
        mirror
            .tamper(0, |row| row.timestamp = "2001-01-01T00:00:00.000Z".into())
            .unwrap();

        let err = RollbookServer::with_mirror(ServerConfig::default(), mirror)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ServerError::Ledger(LedgerError::CorruptMirror { .. })
        ));
    }
}
