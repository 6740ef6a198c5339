#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::{EmailAddress, PasswordHash, UserId};
use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel, TaskId};
use voicenudge_kernel_contracts::{SchemaVersion, UtcTimestamp};
use voicenudge_storage::{
    HistoryRecord, NudgeStore, ReminderRecord, ScanBatch, StorageError, TaskRecord, UserRecord,
};

fn t(secs: i64) -> UtcTimestamp {
    UtcTimestamp::from_unix_seconds(secs).unwrap()
}

fn seeded(store: &mut NudgeStore) -> (UserId, TaskId) {
    let user_id = store.next_user_id();
    store
        .insert_user(
            UserRecord::v1(
                user_id.clone(),
                "DBW User".to_string(),
                EmailAddress::new("dbw@example.com").unwrap(),
                PasswordHash::new("v1$c2FsdA$aGFzaA").unwrap(),
                None,
                None,
                None,
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
    let task_id = store.next_task_id();
    store
        .insert_task(
            TaskRecord::v1(
                task_id.clone(),
                user_id.clone(),
                "buy milk".to_string(),
                None,
                "buy milk".to_string(),
                Some(t(1_000)),
                CategoryLabel::new("Shopping").unwrap(),
                PriorityLabel::new("Medium").unwrap(),
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
    (user_id, task_id)
}

fn history_entry(store: &mut NudgeStore, user_id: &UserId, task_id: &TaskId) -> HistoryRecord {
    HistoryRecord {
        schema_version: SchemaVersion(1),
        history_id: store.next_history_id(),
        user_id: user_id.clone(),
        task_id: task_id.clone(),
        text: "buy milk".to_string(),
        title: "buy milk".to_string(),
        due_at: Some(t(1_000)),
        category: CategoryLabel::new("Shopping").unwrap(),
        priority: PriorityLabel::new("Medium").unwrap(),
        note: Some("reminder sent".to_string()),
        recorded_at: t(700),
    }
}

#[test]
fn at_rem_db_01_batch_commit_marks_sent_and_appends_audit() {
    let mut s = NudgeStore::new_in_memory();
    let (user_id, task_id) = seeded(&mut s);
    let reminder = ReminderRecord::v1(
        s.next_reminder_id(),
        task_id.clone(),
        user_id.clone(),
        t(700),
        t(1),
    );
    let reminder_id = reminder.reminder_id.clone();
    s.insert_reminder(reminder).unwrap();

    let entry = history_entry(&mut s, &user_id, &task_id);
    s.apply_scan_batch(ScanBatch {
        mark_sent: vec![reminder_id.clone()],
        history: vec![entry],
    })
    .unwrap();

    assert!(s.reminder(&reminder_id).unwrap().sent);
    assert_eq!(s.history_for_user(&user_id).len(), 1);
    // A sent reminder never comes back from the due scan.
    assert!(s.due_unsent_reminders(t(10_000)).is_empty());
}

#[test]
fn at_rem_db_02_dangling_batch_applies_nothing() {
    let mut s = NudgeStore::new_in_memory();
    let (user_id, task_id) = seeded(&mut s);
    let reminder = ReminderRecord::v1(
        s.next_reminder_id(),
        task_id.clone(),
        user_id.clone(),
        t(700),
        t(1),
    );
    let good_id = reminder.reminder_id.clone();
    s.insert_reminder(reminder).unwrap();

    let entry = history_entry(&mut s, &user_id, &task_id);
    let batch = ScanBatch {
        mark_sent: vec![
            good_id.clone(),
            voicenudge_kernel_contracts::reminder::ReminderId::new("rem_404404").unwrap(),
        ],
        history: vec![entry],
    };
    assert!(matches!(
        s.apply_scan_batch(batch),
        Err(StorageError::NotFound { table: "reminders", .. })
    ));

    // The good reminder stays unsent and no history was written.
    assert!(!s.reminder(&good_id).unwrap().sent);
    assert!(s.history_for_user(&user_id).is_empty());
}

#[test]
fn at_rem_db_03_moved_due_time_leaves_both_rows_pending() {
    let mut s = NudgeStore::new_in_memory();
    let (user_id, task_id) = seeded(&mut s);
    for fire_at in [t(700), t(1_300)] {
        let r = ReminderRecord::v1(
            s.next_reminder_id(),
            task_id.clone(),
            user_id.clone(),
            fire_at,
            t(1),
        );
        s.insert_reminder(r).unwrap();
    }

    assert_eq!(s.due_unsent_reminders(t(800)).len(), 1);
    assert_eq!(s.due_unsent_reminders(t(2_000)).len(), 2);
}
