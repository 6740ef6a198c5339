#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::UserId;
use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel, TaskStatus};
use voicenudge_kernel_contracts::UtcTimestamp;
use voicenudge_storage::NudgeStore;

/// One row of the merged history view. `Completed` rows still live in the
/// tasks table; `Archived` rows are frozen snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    pub id: String,
    pub title: String,
    pub due_at: Option<UtcTimestamp>,
    pub category: CategoryLabel,
    pub priority: PriorityLabel,
    pub source: HistorySource,
    pub completed_at: Option<UtcTimestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    Completed,
    Archived,
}

pub fn list_history(store: &NudgeStore, user_id: &UserId) -> Vec<HistoryView> {
    let mut out = Vec::new();
    for task in store.tasks_for_user(user_id) {
        // No current flow writes Completed status (completion archives the
        // snapshot and deletes the row); this branch covers rows imported
        // from older data sets that kept completed tasks in place.
        if task.status == TaskStatus::Completed {
            out.push(HistoryView {
                id: task.task_id.as_str().to_string(),
                title: task.title.clone(),
                due_at: task.due_at,
                category: task.category.clone(),
                priority: task.priority.clone(),
                source: HistorySource::Completed,
                completed_at: None,
            });
        }
    }
    for entry in store.history_for_user(user_id) {
        out.push(HistoryView {
            id: entry.history_id.as_str().to_string(),
            title: entry.title.clone(),
            due_at: entry.due_at,
            category: entry.category.clone(),
            priority: entry.priority.clone(),
            source: HistorySource::Archived,
            completed_at: Some(entry.recorded_at),
        });
    }
    out
}

/// Clears archived snapshots only; completed rows still in the tasks table
/// are untouched.
pub fn clear_history(store: &mut NudgeStore, user_id: &UserId) -> usize {
    store.clear_history(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicenudge_kernel_contracts::auth::{EmailAddress, PasswordHash};
    use voicenudge_kernel_contracts::reminder::HistoryEntryId;
    use voicenudge_kernel_contracts::task::TaskId;
    use voicenudge_kernel_contracts::SchemaVersion;
    use voicenudge_storage::{HistoryRecord, NudgeStore, TaskRecord, UserRecord};

    fn t(secs: i64) -> UtcTimestamp {
        UtcTimestamp::from_unix_seconds(secs).unwrap()
    }

    fn seeded_user(s: &mut NudgeStore) -> UserId {
        let user_id = s.next_user_id();
        s.insert_user(
            UserRecord::v1(
                user_id.clone(),
                "Tommy".to_string(),
                EmailAddress::new("tommy@example.com").unwrap(),
                PasswordHash::new("v1$c2FsdA$aGFzaA").unwrap(),
                None,
                None,
                None,
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
        user_id
    }

    #[test]
    fn at_history_01_archived_rows_listed_and_clearable() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = seeded_user(&mut s);
        s.append_history_entry(HistoryRecord {
            schema_version: SchemaVersion(1),
            history_id: HistoryEntryId::new("hist_000001").unwrap(),
            user_id: user_id.clone(),
            task_id: TaskId::new("task_000001").unwrap(),
            text: "buy milk".to_string(),
            title: "buy milk".to_string(),
            due_at: None,
            category: CategoryLabel::new("Shopping").unwrap(),
            priority: PriorityLabel::new("Medium").unwrap(),
            note: None,
            recorded_at: t(10),
        })
        .unwrap();

        let rows = list_history(&s, &user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, HistorySource::Archived);
        assert_eq!(rows[0].completed_at, Some(t(10)));

        assert_eq!(clear_history(&mut s, &user_id), 1);
        assert!(list_history(&s, &user_id).is_empty());
    }

    #[test]
    fn at_history_02_legacy_completed_rows_merge_and_survive_clear() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = seeded_user(&mut s);
        let mut task = TaskRecord::v1(
            s.next_task_id(),
            user_id.clone(),
            "buy milk".to_string(),
            None,
            "buy milk".to_string(),
            None,
            CategoryLabel::new("Shopping").unwrap(),
            PriorityLabel::new("Medium").unwrap(),
            t(1),
        )
        .unwrap();
        task.status = TaskStatus::Completed;
        s.insert_task(task).unwrap();

        let rows = list_history(&s, &user_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, HistorySource::Completed);
        assert_eq!(rows[0].completed_at, None);

        // Clear touches the archive only; the completed-status row stays.
        assert_eq!(clear_history(&mut s, &user_id), 0);
        assert_eq!(list_history(&s, &user_id).len(), 1);
    }
}
