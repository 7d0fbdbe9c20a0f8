//! Evaluation oracle seam and the Stockfish process pool behind it.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::analysis::Score;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::stockfish::StockfishEngine;

/// Longest principal line kept from an engine answer
pub const MAX_PV_LEN: usize = 5;

/// Result of a single position evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Best move in UCI notation; `None` when the side to move has no legal move
    pub best_move: Option<String>,
    /// Score from the side to move's perspective
    pub score: Score,
    /// Principal variation in UCI notation, at most `MAX_PV_LEN` moves
    pub pv: Vec<String>,
}

/// Anything that can score a position.
///
/// Implementations must be safe to call from several scans at once; a single
/// engine connection has to be serialized behind the implementation.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, fen: &str, depth: u32) -> Result<Evaluation, EngineError>;

    /// Check the oracle can be reached before committing to a long scan.
    async fn ensure_ready(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Fixed set of Stockfish processes, one request per process at a time.
pub struct EnginePool {
    engines: Vec<Mutex<StockfishEngine>>,
    next: AtomicUsize,
    config: EngineConfig,
}

impl EnginePool {
    /// Spawn `config.pool_size` engines. Fails on the first one that cannot start.
    pub async fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut engines = Vec::with_capacity(config.pool_size);
        for engine_id in 0..config.pool_size.max(1) {
            let engine = StockfishEngine::new(config).await?;
            info!(engine_id, "Stockfish engine ready");
            engines.push(Mutex::new(engine));
        }
        Ok(Self {
            engines,
            next: AtomicUsize::new(0),
            config: config.clone(),
        })
    }

    pub fn size(&self) -> usize {
        self.engines.len()
    }

    /// Take an idle engine if there is one, otherwise queue on the next in turn.
    async fn acquire(&self) -> tokio::sync::MutexGuard<'_, StockfishEngine> {
        for engine in &self.engines {
            if let Ok(guard) = engine.try_lock() {
                return guard;
            }
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.engines.len();
        self.engines[i].lock().await
    }

    /// Replace a process that stopped answering.
    async fn revive(&self, engine: &mut StockfishEngine) -> Result<(), EngineError> {
        if engine.is_healthy() {
            return Ok(());
        }
        warn!("Restarting unhealthy Stockfish engine");
        let fresh = StockfishEngine::new(&self.config).await?;
        let mut old = std::mem::replace(engine, fresh);
        old.quit().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Shutting down Stockfish engines");
        for engine in &self.engines {
            engine.lock().await.quit().await;
        }
    }
}

#[async_trait]
impl Evaluator for EnginePool {
    async fn evaluate(&self, fen: &str, depth: u32) -> Result<Evaluation, EngineError> {
        let mut engine = self.acquire().await;
        self.revive(&mut engine).await?;
        engine.evaluate(fen, depth).await
    }

    async fn ensure_ready(&self) -> Result<(), EngineError> {
        let mut engine = self.acquire().await;
        self.revive(&mut engine).await?;
        engine.is_ready().await
    }
}
