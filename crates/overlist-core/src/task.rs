use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task text longer than this is truncated at the input stage.
pub const MAX_TEXT_LEN: usize = 120;

/// One entry in the shared ordered list. Identity is the `id`; position in
/// the surrounding `Vec` is the only ranking signal.
///
/// Serialized shape matches the store wire format: camelCase field names and
/// `createdAt` as integer milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub done: bool,
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            text,
            done: false,
            created_at: now,
        }
    }
}

/// Trims and bounds user input. Empty or whitespace-only text is rejected;
/// overlong text is truncated on a char boundary.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TEXT_LEN).collect())
}

pub fn position_of(tasks: &[Task], id: &str) -> Option<usize> {
    tasks.iter().position(|task| task.id == id)
}

/// Flips the `done` flag in place. Returns false when the id is unknown.
pub fn toggle_done(tasks: &mut [Task], id: &str) -> bool {
    match tasks.iter_mut().find(|task| task.id == id) {
        Some(task) => {
            task.done = !task.done;
            true
        }
        None => false,
    }
}

pub fn remove_task(tasks: &mut Vec<Task>, id: &str) -> bool {
    match position_of(tasks, id) {
        Some(idx) => {
            tasks.remove(idx);
            true
        }
        None => false,
    }
}

/// Drops every completed task, preserving the relative order of the rest.
/// Returns how many were removed.
pub fn clear_done(tasks: &mut Vec<Task>) -> usize {
    let before = tasks.len();
    tasks.retain(|task| !task.done);
    before - tasks.len()
}

/// Moves `tasks[from]` into insertion slot `to_slot`, where the slot is
/// counted over the list *including* the moved item (0..=len). Standard
/// same-array semantics: when the origin precedes the slot, the target
/// index shifts down by one after removal.
pub fn move_task(tasks: &mut Vec<Task>, from: usize, to_slot: usize) {
    if from >= tasks.len() {
        return;
    }
    let moved = tasks.remove(from);
    let mut to = to_slot.min(tasks.len() + 1);
    if from < to {
        to -= 1;
    }
    tasks.insert(to.min(tasks.len()), moved);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(texts: &[&str]) -> Vec<Task> {
        let now = Utc::now();
        texts
            .iter()
            .map(|text| Task::new((*text).to_string(), now))
            .collect()
    }

    #[test]
    fn normalize_trims_and_rejects_empty() {
        assert_eq!(normalize_text("  hello  ").as_deref(), Some("hello"));
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text(""), None);
    }

    #[test]
    fn normalize_truncates_overlong_input() {
        let raw = "x".repeat(MAX_TEXT_LEN + 40);
        let text = normalize_text(&raw).expect("non-empty");
        assert_eq!(text.chars().count(), MAX_TEXT_LEN);
    }

    #[test]
    fn new_tasks_get_unique_ids() {
        let tasks = list(&["a", "b", "c", "d"]);
        for (idx, task) in tasks.iter().enumerate() {
            assert!(!tasks[idx + 1..].iter().any(|other| other.id == task.id));
        }
    }

    #[test]
    fn move_forward_adjusts_for_removal() {
        // [A,B,C], move A to the slot after B (slot 2) => [B,A,C]
        let mut tasks = list(&["A", "B", "C"]);
        let expect = vec![tasks[1].clone(), tasks[0].clone(), tasks[2].clone()];
        move_task(&mut tasks, 0, 2);
        assert_eq!(tasks, expect);
    }

    #[test]
    fn move_backward_keeps_slot() {
        // [A,B,C], move C before A (slot 0) => [C,A,B]
        let mut tasks = list(&["A", "B", "C"]);
        let expect = vec![tasks[2].clone(), tasks[0].clone(), tasks[1].clone()];
        move_task(&mut tasks, 2, 0);
        assert_eq!(tasks, expect);
    }

    #[test]
    fn move_to_own_slot_is_noop() {
        let mut tasks = list(&["A", "B", "C"]);
        let expect = tasks.clone();
        move_task(&mut tasks, 1, 1);
        assert_eq!(tasks, expect);
        move_task(&mut tasks, 1, 2);
        assert_eq!(tasks, expect);
    }

    #[test]
    fn clear_done_preserves_order() {
        let mut tasks = list(&["a", "b", "c", "d"]);
        tasks[1].done = true;
        tasks[3].done = true;
        let survivors = vec![tasks[0].clone(), tasks[2].clone()];
        assert_eq!(clear_done(&mut tasks), 2);
        assert_eq!(tasks, survivors);
    }

    #[test]
    fn wire_format_is_camel_case_millis() {
        let task = Task {
            id: "abc".to_string(),
            text: "write it down".to_string(),
            done: false,
            created_at: DateTime::from_timestamp_millis(1_700_000_000_123).expect("timestamp"),
        };
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["createdAt"], 1_700_000_000_123i64);
        let back: Task = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, task);
    }
}
