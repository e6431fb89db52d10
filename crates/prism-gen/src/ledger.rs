//! Task ledger
//!
//! The ledger is the only shared state. Sessions are not stored entities:
//! a session is whatever tasks carry its id. Writes after creation are
//! per-task upserts keyed by the immutable task id. An upsert only lands
//! when it moves the stored status forward, so concurrent reconciles of one
//! session can race but never undo each other's progress.

use prism_core::{PrismError, Result, SessionId, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::task::Task;

/// Post-creation state the reconciler writes back
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub provider_info: Option<serde_json::Value>,
    pub provider_result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TaskUpdate {
    /// Apply onto `task` when it moves the status forward; false otherwise
    fn apply(&self, task: &mut Task) -> bool {
        if !task.status.can_advance_to(self.status) {
            return false;
        }
        task.status = self.status;
        task.provider_info = self.provider_info.clone();
        task.provider_result = self.provider_result.clone();
        if self.error.is_some() {
            task.error = self.error.clone();
        }
        true
    }
}

/// Storage contract for generation tasks
pub trait TaskLedger: Send + Sync {
    /// Insert one dispatch batch. Either every task lands or none does.
    fn create_batch(&self, tasks: &[Task]) -> Result<()>;

    /// All tasks of a session in creation order; empty when unknown
    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>>;

    fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Conditionally upsert post-creation state of one task.
    ///
    /// The forward-only check runs against the stored task at write time.
    /// An update that would not advance it is dropped, and the stored task
    /// is returned as is.
    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<Task>;

    /// Every task in the ledger
    fn list(&self) -> Result<Vec<Task>>;
}

#[derive(Default)]
struct MemoryInner {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
    writes: usize,
}

/// In-process ledger
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<MemoryInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of post-creation updates applied so far
    pub fn update_count(&self) -> usize {
        self.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| PrismError::LedgerError("memory ledger lock poisoned".to_string()))
    }
}

impl TaskLedger for MemoryLedger {
    fn create_batch(&self, tasks: &[Task]) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(dup) = tasks.iter().find(|t| inner.tasks.contains_key(&t.id)) {
            return Err(PrismError::LedgerError(format!(
                "task {} already exists",
                dup.id
            )));
        }
        for task in tasks {
            inner.order.push(task.id.clone());
            inner.tasks.insert(task.id.clone(), task.clone());
        }
        Ok(())
    }

    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>> {
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|t| &t.session_id == session_id)
            .cloned()
            .collect())
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.lock()?.tasks.get(id).cloned())
    }

    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<Task> {
        let mut inner = self.lock()?;
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| PrismError::NotFound(format!("task {}", id)))?;
        let applied = update.apply(task);
        let updated = task.clone();
        if applied {
            inner.writes += 1;
        }
        Ok(updated)
    }

    fn list(&self) -> Result<Vec<Task>> {
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .cloned()
            .collect())
    }
}

/// File-based ledger in `.prism/ledger/`
///
/// Each task lives in `tasks/<id>.task.toml`; each session has an
/// immutable index `sessions/<id>.session.toml` listing its task ids in
/// creation order, written last so a session only exists once all of its
/// tasks do.
pub struct FileLedger {
    root: PathBuf,
    /// Serializes read-check-write in `update` within this process
    update_lock: Mutex<()>,
}

#[derive(Serialize, Deserialize)]
struct TaskFile {
    task: Task,
}

#[derive(Serialize, Deserialize)]
struct SessionIndex {
    session_id: SessionId,
    tasks: Vec<TaskId>,
}

impl FileLedger {
    /// Create a ledger rooted at the given directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            update_lock: Mutex::new(()),
        }
    }

    /// Default ledger location
    pub fn default_store() -> Self {
        Self::new(".prism/ledger")
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    fn task_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.task.toml", id))
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir().join(format!("{}.session.toml", id))
    }

    fn write_task(&self, task: &Task) -> Result<()> {
        let content = toml::to_string_pretty(&TaskFile { task: task.clone() })?;
        write_atomic(&self.task_path(&task.id), &content)
    }

    /// Task files first, then the session index; `written` collects what to
    /// roll back on failure
    fn write_batch(
        &self,
        session_id: &SessionId,
        tasks: &[Task],
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for task in tasks {
            self.write_task(task)?;
            written.push(self.task_path(&task.id));
        }
        let index = SessionIndex {
            session_id: session_id.clone(),
            tasks: tasks.iter().map(|t| t.id.clone()).collect(),
        };
        write_atomic(&self.session_path(session_id), &toml::to_string_pretty(&index)?)
    }

    fn read_task(path: &Path) -> Result<Task> {
        let content = std::fs::read_to_string(path)?;
        let file: TaskFile = toml::from_str(&content).map_err(|e| {
            PrismError::LedgerError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(file.task)
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
    let written = std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        std::fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(())
}

impl TaskLedger for FileLedger {
    fn create_batch(&self, tasks: &[Task]) -> Result<()> {
        let Some(first) = tasks.first() else {
            return Ok(());
        };
        if tasks.iter().any(|t| t.session_id != first.session_id) {
            return Err(PrismError::LedgerError(
                "a batch must belong to a single session".to_string(),
            ));
        }
        if self.session_path(&first.session_id).exists() {
            return Err(PrismError::LedgerError(format!(
                "session {} already exists",
                first.session_id
            )));
        }

        std::fs::create_dir_all(self.tasks_dir())?;
        std::fs::create_dir_all(self.sessions_dir())?;

        let mut written = Vec::with_capacity(tasks.len());
        let outcome = self.write_batch(&first.session_id, tasks, &mut written);
        if outcome.is_err() {
            for path in written {
                std::fs::remove_file(path).ok();
            }
        }
        outcome
    }

    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<Task>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let index: SessionIndex = toml::from_str(&content).map_err(|e| {
            PrismError::LedgerError(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        index
            .tasks
            .iter()
            .map(|id| Self::read_task(&self.task_path(id)))
            .collect()
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let path = self.task_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_task(&path).map(Some)
    }

    fn update(&self, id: &TaskId, update: &TaskUpdate) -> Result<Task> {
        let _guard = self
            .update_lock
            .lock()
            .map_err(|_| PrismError::LedgerError("file ledger lock poisoned".to_string()))?;
        let mut task = self
            .get(id)?
            .ok_or_else(|| PrismError::NotFound(format!("task {}", id)))?;
        if update.apply(&mut task) {
            self.write_task(&task)?;
        }
        Ok(task)
    }

    fn list(&self) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        let dir = self.tasks_dir();
        if !dir.exists() {
            return Ok(tasks);
        }

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".task.toml"))
                .unwrap_or(false)
            {
                tasks.push(Self::read_task(&path)?);
            }
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }
}
