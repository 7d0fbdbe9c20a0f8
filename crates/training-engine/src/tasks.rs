//! Background scans with pollable progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chess_core::OpeningCatalog;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::TrainerError;
use crate::evaluator::Evaluator;
use crate::explorer::{explore, ExplorerDepths, ExplorerQuery, ExplorerReport};
use crate::progress::{ProgressSink, ScanProgress};
use crate::puzzles::{generate_puzzles, PuzzleCandidate, PuzzleScanParams};
use crate::store::GameStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Puzzles,
    Explorer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self != TaskStatus::Running
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Puzzles(Vec<PuzzleCandidate>),
    Explorer(ExplorerReport),
}

/// Snapshot of a task as returned by `poll`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// 0..=99 while running, 100 once completed
    pub progress: u8,
    pub total_games: usize,
    pub games_examined: usize,
    pub items_found: usize,
    pub error: Option<String>,
    pub result: Option<TaskOutput>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    fn new(id: String, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Running,
            progress: 0,
            total_games: 0,
            games_examined: 0,
            items_found: 0,
            error: None,
            result: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

struct TaskEntry {
    record: TaskRecord,
    cancel: Arc<AtomicBool>,
}

type TaskTable = Arc<RwLock<HashMap<String, TaskEntry>>>;

/// Starts scans on the tokio runtime and keeps their records for polling.
#[derive(Clone)]
pub struct TaskOrchestrator {
    tasks: TaskTable,
    store: Arc<dyn GameStore>,
    evaluator: Arc<dyn Evaluator>,
    catalog: Arc<OpeningCatalog>,
    config: EngineConfig,
}

/// Writes a running scan's progress into its task record.
struct TaskProgress {
    tasks: TaskTable,
    id: String,
    cancel: Arc<AtomicBool>,
}

impl ProgressSink for TaskProgress {
    fn report(&self, progress: ScanProgress) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = tasks.get_mut(&self.id) else {
            return;
        };
        let record = &mut entry.record;
        if record.status.is_terminal() {
            return;
        }
        record.progress = record.progress.max(progress.percent());
        record.total_games = progress.games_total;
        record.games_examined = progress.games_examined;
        record.items_found = progress.items_found;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<dyn GameStore>,
        evaluator: Arc<dyn Evaluator>,
        catalog: Arc<OpeningCatalog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            store,
            evaluator,
            catalog,
            config,
        }
    }

    fn register(&self, kind: TaskKind) -> TaskProgress {
        let id = Uuid::new_v4().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        let entry = TaskEntry {
            record: TaskRecord::new(id.clone(), kind),
            cancel: cancel.clone(),
        };
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), entry);
        info!(task_id = %id, kind = ?kind, "Task started");
        TaskProgress {
            tasks: self.tasks.clone(),
            id,
            cancel,
        }
    }

    /// Validate `params` and start a puzzle scan. Returns the task id.
    pub fn start_puzzle_scan(&self, params: PuzzleScanParams) -> Result<String, TrainerError> {
        params.validate()?;
        let sink = Arc::new(self.register(TaskKind::Puzzles));
        let id = sink.id.clone();
        let scan_sink = sink.clone();

        let store = self.store.clone();
        let evaluator = self.evaluator.clone();
        let catalog = self.catalog.clone();
        let depth = self.config.puzzle_depth;

        let handle = tokio::spawn(async move {
            let games = store.list_games(&params.game_filter());
            let result = generate_puzzles(
                evaluator.as_ref(),
                &catalog,
                &games,
                &params,
                depth,
                scan_sink.as_ref(),
            )
            .await
            .map(TaskOutput::Puzzles);
            finish(&scan_sink, result);
        });
        watch(sink, handle);

        Ok(id)
    }

    /// Validate `query` and start an explorer scan. Returns the task id.
    pub fn start_explorer_scan(&self, query: ExplorerQuery) -> Result<String, TrainerError> {
        query.resolve()?;
        let sink = Arc::new(self.register(TaskKind::Explorer));
        let id = sink.id.clone();
        let scan_sink = sink.clone();

        let store = self.store.clone();
        let evaluator = self.evaluator.clone();
        let catalog = self.catalog.clone();
        let depths = ExplorerDepths {
            position: self.config.explorer_depth,
            continuation: self.config.continuation_depth,
        };

        let handle = tokio::spawn(async move {
            let result = explore(
                store.as_ref(),
                evaluator.as_ref(),
                &catalog,
                &query,
                depths,
                scan_sink.as_ref(),
            )
            .await
            .map(TaskOutput::Explorer);
            finish(&scan_sink, result);
        });
        watch(sink, handle);

        Ok(id)
    }

    pub fn poll(&self, task_id: &str) -> Result<TaskRecord, TrainerError> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| TrainerError::TaskNotFound(task_id.to_string()))
    }

    /// Ask a running scan to stop at its next checkpoint. Finished tasks
    /// are left as they are.
    pub fn cancel(&self, task_id: &str) -> Result<TaskRecord, TrainerError> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        let entry = tasks
            .get(task_id)
            .ok_or_else(|| TrainerError::TaskNotFound(task_id.to_string()))?;
        if !entry.record.status.is_terminal() {
            info!(task_id, "Cancelling task");
            entry.cancel.store(true, Ordering::Relaxed);
        }
        Ok(entry.record.clone())
    }
}

/// Fail the task if its scan dies without reporting, e.g. on a panic.
fn watch(sink: Arc<TaskProgress>, handle: JoinHandle<()>) {
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            finish(&sink, Err(TrainerError::Aborted(e.to_string())));
        }
    });
}

fn items_in(output: &TaskOutput) -> usize {
    match output {
        TaskOutput::Puzzles(puzzles) => puzzles.len(),
        TaskOutput::Explorer(report) => report.continuations.len(),
    }
}

fn finish(sink: &TaskProgress, result: Result<TaskOutput, TrainerError>) {
    let mut tasks = sink.tasks.write().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = tasks.get_mut(&sink.id) else {
        return;
    };
    let record = &mut entry.record;
    if record.status.is_terminal() {
        return;
    }
    record.finished_at = Some(Utc::now());

    match result {
        Ok(output) => {
            record.items_found = items_in(&output);
            if let TaskOutput::Explorer(report) = &output {
                record.games_examined = report.games_examined;
            }
            record.status = TaskStatus::Completed;
            record.progress = 100;
            record.result = Some(output);
            info!(task_id = %sink.id, items = record.items_found, "Task completed");
        }
        Err(e) => {
            error!(task_id = %sink.id, error = %e, "Task failed");
            record.status = TaskStatus::Failed;
            record.error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_lowercase_states() {
        let record = TaskRecord::new("t1".into(), TaskKind::Explorer);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["kind"], "explorer");
        assert_eq!(json["progress"], 0);
        assert!(json["finished_at"].is_null());
    }

    #[test]
    fn test_progress_is_non_decreasing_and_ignored_after_finish() {
        let tasks: TaskTable = Arc::new(RwLock::new(HashMap::new()));
        tasks.write().unwrap().insert(
            "t1".into(),
            TaskEntry {
                record: TaskRecord::new("t1".into(), TaskKind::Puzzles),
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );
        let sink = TaskProgress {
            tasks: tasks.clone(),
            id: "t1".into(),
            cancel: Arc::new(AtomicBool::new(false)),
        };

        sink.report(ScanProgress {
            games_total: 4,
            games_examined: 2,
            items_found: 1,
        });
        sink.report(ScanProgress {
            games_total: 4,
            games_examined: 1,
            items_found: 1,
        });
        assert_eq!(tasks.read().unwrap()["t1"].record.progress, 50);

        finish(&sink, Err(TrainerError::Cancelled));
        sink.report(ScanProgress {
            games_total: 4,
            games_examined: 4,
            items_found: 3,
        });
        let record = tasks.read().unwrap()["t1"].record.clone();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("cancelled"));
        assert_eq!(record.items_found, 1);

        finish(&sink, Ok(TaskOutput::Puzzles(Vec::new())));
        assert_eq!(tasks.read().unwrap()["t1"].record.status, TaskStatus::Failed);
    }
}
