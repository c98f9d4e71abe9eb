//! Board: central knowledge repository (spec §3 SotaTable, §9 "thread-safe
//! Board variant"; thesis version history and Kanban task board
//! supplemented from `board/board.py` and the teacher's `WorkspaceTask`
//! patterns per SPEC_FULL.md §11).

use crate::entities::{Document, PaperFeatures};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Topic/thesis description with version history (`board/board.py`'s
/// `ThesisKnowledgeModel`).
#[derive(Debug, Clone, Default)]
pub struct ThesisKnowledge {
    pub description: String,
    pub thoughts: Vec<String>,
    pub history: Vec<String>,
}

impl ThesisKnowledge {
    pub fn new(initial_description: String) -> Self {
        Self {
            description: initial_description,
            thoughts: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Capture current description in history before modification.
    pub fn record_version(&mut self) {
        self.history.push(self.description.clone());
    }

    pub fn update_description(&mut self, new_description: String) {
        self.record_version();
        self.description = new_description;
    }

    pub fn add_thought(&mut self, thought: String) {
        self.thoughts.push(thought);
    }
}

/// SOTA comparison table: columns = feature names in insertion order, rows
/// = (Document, PaperFeatures) (spec §3).
#[derive(Debug, Clone, Default)]
pub struct SotaTable {
    pub features: Vec<String>,
    pub rows: Vec<(Document, PaperFeatures)>,
}

impl SotaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` as a new column if absent, backfilling `"Not Available"`
    /// into every existing row so the rectangularity invariant (spec
    /// invariant 7) holds immediately.
    pub fn add_feature_column(&mut self, name: String) {
        if self.features.contains(&name) {
            return;
        }
        self.features.push(name.clone());
        for (_, paper) in &mut self.rows {
            paper
                .features
                .entry(name.clone())
                .or_insert_with(|| crate::entities::NOT_AVAILABLE.to_string());
        }
    }

    /// Appends a row, backfilling any column missing from `features` with
    /// `"Not Available"` so the rectangularity invariant holds.
    pub fn add_row(&mut self, document: Document, mut features: PaperFeatures) {
        for column in &self.features {
            features
                .features
                .entry(column.clone())
                .or_insert_with(|| crate::entities::NOT_AVAILABLE.to_string());
        }
        self.rows.push((document, features));
    }

    /// Stable column order markdown rendering (spec §6): `authors, title,
    /// year, domain, <feature columns>`, missing values as `Not Available`.
    pub fn to_markdown(&self) -> String {
        let mut header = vec!["authors".to_string(), "title".to_string(), "year".to_string(), "domain".to_string()];
        header.extend(self.features.clone());
        let mut lines = vec![format!("| {} |", header.join(" | "))];
        lines.push(format!("|{}|", header.iter().map(|_| "---").collect::<Vec<_>>().join("|")));

        for (_, paper) in &self.rows {
            let mut cells = vec![
                paper.authors.join(", "),
                paper.title.clone(),
                paper.year.to_string(),
                paper.domain.clone(),
            ];
            for feature in &self.features {
                cells.push(
                    paper
                        .features
                        .get(feature)
                        .cloned()
                        .unwrap_or_else(|| crate::entities::NOT_AVAILABLE.to_string()),
                );
            }
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        lines.join("\n")
    }

    /// Removes rows at `indices` (spec §4.8 step 4). Invalid indices are
    /// ignored.
    pub fn remove_rows(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.iter().copied().filter(|&i| i < self.rows.len()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        for index in sorted.into_iter().rev() {
            self.rows.remove(index);
        }
    }

    /// Drops any feature column no remaining row populates with a real
    /// value (spec §4.8 step 4, §4.8 invariant). A column counts as
    /// referenced only if some row holds a non-"Not Available" value for
    /// it.
    pub fn garbage_collect_columns(&mut self) {
        let referenced: Vec<String> = self
            .features
            .iter()
            .filter(|f| {
                self.rows
                    .iter()
                    .any(|(_, paper)| paper.features.get(*f).map(|v| v != crate::entities::NOT_AVAILABLE).unwrap_or(false))
            })
            .cloned()
            .collect();
        self.features = referenced;
        for (_, paper) in &mut self.rows {
            paper.features.retain(|k, _| self.features.contains(k));
        }
    }

    /// Render with an inserted row-index column, and the index -> document
    /// id mapping (spec §4.8 step 1).
    pub fn to_markdown_with_index(&self) -> (String, Vec<String>) {
        let index_to_id: Vec<String> = self.rows.iter().map(|(d, _)| d.id.clone()).collect();
        let mut header = vec!["index".to_string(), "authors".to_string(), "title".to_string(), "year".to_string(), "domain".to_string()];
        header.extend(self.features.clone());
        let mut lines = vec![format!("| {} |", header.join(" | "))];
        lines.push(format!("|{}|", header.iter().map(|_| "---").collect::<Vec<_>>().join("|")));

        for (index, (_, paper)) in self.rows.iter().enumerate() {
            let mut cells = vec![
                index.to_string(),
                paper.authors.join(", "),
                paper.title.clone(),
                paper.year.to_string(),
                paper.domain.clone(),
            ];
            for feature in &self.features {
                cells.push(
                    paper
                        .features
                        .get(feature)
                        .cloned()
                        .unwrap_or_else(|| crate::entities::NOT_AVAILABLE.to_string()),
                );
            }
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        (lines.join("\n"), index_to_id)
    }
}

/// Task status column (spec §3 Kanban).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub skill: String,
    pub priority: u8,
    pub is_async: bool,
    pub response: Option<String>,
}

/// Three-column task board, protected by a single mutex (spec §3, §5).
pub struct Kanban {
    inner: Mutex<KanbanInner>,
}

struct KanbanInner {
    todo: VecDeque<Task>,
    in_progress: VecDeque<Task>,
    done: VecDeque<Task>,
}

impl Kanban {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(KanbanInner {
                todo: VecDeque::new(),
                in_progress: VecDeque::new(),
                done: VecDeque::new(),
            }),
        }
    }

    pub fn add_task(&self, task: Task) {
        let mut inner = self.inner.lock().expect("kanban mutex poisoned");
        inner.todo.push_back(task);
    }

    pub fn move_to_in_progress(&self, task_id: &str) -> bool {
        let mut inner = self.inner.lock().expect("kanban mutex poisoned");
        if let Some(pos) = inner.todo.iter().position(|t| t.id == task_id) {
            let task = inner.todo.remove(pos).unwrap();
            inner.in_progress.push_back(task);
            true
        } else {
            false
        }
    }

    pub fn complete_task(&self, task_id: &str, response: Option<String>) -> bool {
        let mut inner = self.inner.lock().expect("kanban mutex poisoned");
        if let Some(pos) = inner.in_progress.iter().position(|t| t.id == task_id) {
            let mut task = inner.in_progress.remove(pos).unwrap();
            task.response = response;
            inner.done.push_back(task);
            true
        } else {
            false
        }
    }

    pub fn find_in_done(&self, task_id: &str) -> Option<Task> {
        let inner = self.inner.lock().expect("kanban mutex poisoned");
        inner.done.iter().find(|t| t.id == task_id).cloned()
    }

    /// Cooperative poll loop (spec §5, §9): suspend on a 3s interval until
    /// the task surfaces in Done, or a 600s hard timeout fires. Preferred
    /// design would be a condition-variable signalled on move; polling is
    /// the documented acceptable fallback (spec §9).
    pub async fn add_task_async(
        self: &std::sync::Arc<Self>,
        task: Task,
        poll_interval: std::time::Duration,
        timeout: std::time::Duration,
    ) -> Result<Task, crate::error::EngineError> {
        let task_id = task.id.clone();
        self.add_task(task);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(done) = self.find_in_done(&task_id) {
                return Ok(done);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(crate::error::EngineError::Cancellation(format!(
                    "task {task_id} did not complete within {timeout:?}"
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl Default for Kanban {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            skill: self.skill.clone(),
            priority: self.priority,
            is_async: self.is_async,
            response: self.response.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thesis_description_update_records_history() {
        let mut thesis = ThesisKnowledge::new("initial".to_string());
        thesis.update_description("revised".to_string());
        assert_eq!(thesis.description, "revised");
        assert_eq!(thesis.history, vec!["initial".to_string()]);
    }

    #[test]
    fn kanban_task_moves_through_columns() {
        let kanban = Kanban::new();
        let task = Task {
            id: "t1".into(),
            title: "do it".into(),
            description: "".into(),
            skill: "".into(),
            priority: 1,
            is_async: false,
            response: None,
        };
        kanban.add_task(task);
        assert!(kanban.move_to_in_progress("t1"));
        assert!(kanban.complete_task("t1", Some("ok".into())));
        let done = kanban.find_in_done("t1").unwrap();
        assert_eq!(done.response, Some("ok".into()));
    }

    #[test]
    fn e7_sota_table_rectangularity_markdown() {
        let mut table = SotaTable::new();
        table.add_feature_column("method".to_string());
        let doc = Document {
            id: "d1".into(),
            title: "Paper".into(),
            abstract_: String::new(),
            authors: vec!["A. Author".into()],
            content: String::new(),
        };
        let mut features = std::collections::HashMap::new();
        features.insert("method".to_string(), "transformer".to_string());
        table.add_row(
            doc,
            PaperFeatures {
                authors: vec!["A. Author".into()],
                title: "Paper".into(),
                year: 2023,
                domain: "nlp".into(),
                features,
            },
        );
        let markdown = table.to_markdown();
        assert!(markdown.contains("transformer"));
    }
}
