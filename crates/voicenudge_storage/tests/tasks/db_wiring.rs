#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::{EmailAddress, PasswordHash, UserId};
use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel, TaskId, TaskStatus};
use voicenudge_kernel_contracts::UtcTimestamp;
use voicenudge_storage::{NudgeStore, StorageError, TaskRecord, UserRecord};

fn t(secs: i64) -> UtcTimestamp {
    UtcTimestamp::from_unix_seconds(secs).unwrap()
}

fn user(store: &mut NudgeStore, email: &str) -> UserId {
    let user_id = store.next_user_id();
    store
        .insert_user(
            UserRecord::v1(
                user_id.clone(),
                "Task User".to_string(),
                EmailAddress::new(email).unwrap(),
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

fn task(store: &mut NudgeStore, user_id: &UserId, text: &str) -> TaskId {
    let task_id = store.next_task_id();
    store
        .insert_task(
            TaskRecord::v1(
                task_id.clone(),
                user_id.clone(),
                text.to_string(),
                None,
                text.to_string(),
                None,
                CategoryLabel::new("Personal").unwrap(),
                PriorityLabel::new("Medium").unwrap(),
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
    task_id
}

#[test]
fn at_task_db_01_task_requires_existing_user() {
    let mut s = NudgeStore::new_in_memory();
    let ghost = UserId::new("user_999999").unwrap();
    let record = TaskRecord::v1(
        TaskId::new("task_000001").unwrap(),
        ghost,
        "water plants".to_string(),
        None,
        "water plants".to_string(),
        None,
        CategoryLabel::new("Personal").unwrap(),
        PriorityLabel::new("Medium").unwrap(),
        t(1),
    )
    .unwrap();
    assert!(matches!(
        s.insert_task(record),
        Err(StorageError::ForeignKeyViolation { table: "tasks.user_id", .. })
    ));
}

#[test]
fn at_task_db_02_listing_is_scoped_per_user() {
    let mut s = NudgeStore::new_in_memory();
    let alice = user(&mut s, "alice@example.com");
    let bob = user(&mut s, "bob@example.com");
    task(&mut s, &alice, "alice task");
    let bob_task = task(&mut s, &bob, "bob task");

    assert_eq!(s.tasks_for_user(&alice).len(), 1);
    assert_eq!(s.tasks_for_user(&bob).len(), 1);
    // Cross-user access through the scoped getter misses.
    assert!(s.task_for_user(&bob_task, &alice).is_none());
    assert!(s.task_for_user(&bob_task, &bob).is_some());
}

#[test]
fn at_task_db_03_set_due_overwrites_previous_due() {
    let mut s = NudgeStore::new_in_memory();
    let owner = user(&mut s, "alice@example.com");
    let task_id = task(&mut s, &owner, "submit report");

    s.set_task_due(&task_id, t(1_000)).unwrap();
    s.set_task_due(&task_id, t(2_000)).unwrap();
    assert_eq!(s.task(&task_id).unwrap().due_at, Some(t(2_000)));
    assert_eq!(s.task(&task_id).unwrap().status, TaskStatus::Open);
}

#[test]
fn at_task_db_04_set_due_on_missing_task_is_not_found() {
    let mut s = NudgeStore::new_in_memory();
    let ghost = TaskId::new("task_404404").unwrap();
    assert!(matches!(
        s.set_task_due(&ghost, t(1_000)),
        Err(StorageError::NotFound { table: "tasks", .. })
    ));
}
