use std::collections::HashMap;

use super::store::TaskStore;
use super::types::{Task, TaskOutput, TaskStatus};

/// Read-only views over a batch. Each takes the store lock for the whole read.
impl TaskStore {
    pub fn get_task_status(&self, id: &str) -> Option<TaskStatus> {
        self.lock().tasks.get(id).map(|t| t.status)
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.lock().tasks.get(id).cloned()
    }

    /// Every known task id, with `Some` output for completed tasks.
    pub fn get_all_results(&self) -> HashMap<String, Option<TaskOutput>> {
        self.lock()
            .tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.result.clone()))
            .collect()
    }

    pub fn get_successful_results(&self) -> HashMap<String, TaskOutput> {
        self.lock()
            .tasks
            .iter()
            .filter(|(_, task)| task.status == TaskStatus::Completed)
            .filter_map(|(id, task)| task.result.clone().map(|r| (id.clone(), r)))
            .collect()
    }

    /// Failed tasks in ingestion order, with their recorded errors.
    pub fn get_failed_tasks(&self) -> Vec<Task> {
        let inner = self.lock();
        let failed = inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|task| task.status == TaskStatus::Failed)
            .cloned()
            .collect();
        failed
    }
}
