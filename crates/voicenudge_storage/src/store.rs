#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use voicenudge_kernel_contracts::auth::{
    CredentialView, EmailAddress, PasswordHash, SecurityAnswerHash, SecurityQuestion,
    SessionToken, UserId, VoiceEmbedding,
};
use voicenudge_kernel_contracts::reminder::{HistoryEntryId, ReminderId};
use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel, TaskId, TaskStatus};
use voicenudge_kernel_contracts::{ContractViolation, SchemaVersion, UtcTimestamp, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    NotFound { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub display_name: String,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub voice_embedding: Option<VoiceEmbedding>,
    pub security_question: Option<SecurityQuestion>,
    pub security_answer_hash: Option<SecurityAnswerHash>,
    pub voice_locked: bool,
    pub created_at: UtcTimestamp,
}

impl UserRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        user_id: UserId,
        display_name: String,
        email: EmailAddress,
        password_hash: PasswordHash,
        voice_embedding: Option<VoiceEmbedding>,
        security_question: Option<SecurityQuestion>,
        security_answer_hash: Option<SecurityAnswerHash>,
        created_at: UtcTimestamp,
    ) -> Result<Self, ContractViolation> {
        let u = Self {
            schema_version: SchemaVersion(1),
            user_id,
            display_name,
            email,
            password_hash,
            voice_embedding,
            security_question,
            security_answer_hash,
            voice_locked: false,
            created_at,
        };
        u.validate()?;
        Ok(u)
    }

    /// The read-only slice of this row the auth engine consumes.
    pub fn credential_view(&self) -> Result<CredentialView, ContractViolation> {
        CredentialView::v1(
            self.user_id.clone(),
            self.password_hash.clone(),
            self.voice_embedding.clone(),
            self.security_question.clone(),
            self.security_answer_hash.clone(),
            self.voice_locked,
        )
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.user_id.validate()?;
        if self.display_name.trim().is_empty() || self.display_name.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "users.display_name",
                reason: "must be 1..=128 chars",
            });
        }
        self.email.validate()?;
        self.password_hash.validate()?;
        if let Some(e) = &self.voice_embedding {
            e.validate()?;
        }
        if let Some(q) = &self.security_question {
            q.validate()?;
        }
        if let Some(a) = &self.security_answer_hash {
            a.validate()?;
        }
        if self.security_question.is_some() != self.security_answer_hash.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "users.security_question",
                reason: "question and answer hash must be stored together",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub schema_version: SchemaVersion,
    pub token: SessionToken,
    pub user_id: UserId,
    pub issued_at: UtcTimestamp,
}

impl SessionRecord {
    pub fn v1(token: SessionToken, user_id: UserId, issued_at: UtcTimestamp) -> Self {
        Self {
            schema_version: SchemaVersion(1),
            token,
            user_id,
            issued_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub schema_version: SchemaVersion,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub text: String,
    /// Native-language transcript when the task arrived by voice.
    pub original_text: Option<String>,
    pub title: String,
    pub due_at: Option<UtcTimestamp>,
    pub category: CategoryLabel,
    pub priority: PriorityLabel,
    pub status: TaskStatus,
    pub created_at: UtcTimestamp,
}

impl TaskRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        task_id: TaskId,
        user_id: UserId,
        text: String,
        original_text: Option<String>,
        title: String,
        due_at: Option<UtcTimestamp>,
        category: CategoryLabel,
        priority: PriorityLabel,
        created_at: UtcTimestamp,
    ) -> Result<Self, ContractViolation> {
        let t = Self {
            schema_version: SchemaVersion(1),
            task_id,
            user_id,
            text,
            original_text,
            title,
            due_at,
            category,
            priority,
            status: TaskStatus::Open,
            created_at,
        };
        t.validate()?;
        Ok(t)
    }
}

impl Validate for TaskRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.task_id.validate()?;
        self.user_id.validate()?;
        if self.text.trim().is_empty() || self.text.len() > 4_096 {
            return Err(ContractViolation::InvalidValue {
                field: "tasks.text",
                reason: "must be 1..=4096 chars",
            });
        }
        if self.title.trim().is_empty() || self.title.len() > 512 {
            return Err(ContractViolation::InvalidValue {
                field: "tasks.title",
                reason: "must be 1..=512 chars",
            });
        }
        if let Some(o) = &self.original_text {
            if o.trim().is_empty() || o.len() > 4_096 {
                return Err(ContractViolation::InvalidValue {
                    field: "tasks.original_text",
                    reason: "must be 1..=4096 chars when present",
                });
            }
        }
        self.category.validate()?;
        self.priority.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderRecord {
    pub schema_version: SchemaVersion,
    pub reminder_id: ReminderId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub remind_at: UtcTimestamp,
    pub sent: bool,
    pub created_at: UtcTimestamp,
}

impl ReminderRecord {
    pub fn v1(
        reminder_id: ReminderId,
        task_id: TaskId,
        user_id: UserId,
        remind_at: UtcTimestamp,
        created_at: UtcTimestamp,
    ) -> Self {
        Self {
            schema_version: SchemaVersion(1),
            reminder_id,
            task_id,
            user_id,
            remind_at,
            sent: false,
            created_at,
        }
    }
}

/// Completed-task snapshot. Rows are append-only; the only other mutation the
/// store offers is a per-user clear.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub schema_version: SchemaVersion,
    pub history_id: HistoryEntryId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub text: String,
    pub title: String,
    pub due_at: Option<UtcTimestamp>,
    pub category: CategoryLabel,
    pub priority: PriorityLabel,
    pub note: Option<String>,
    pub recorded_at: UtcTimestamp,
}

/// Staged outcome of one reminder scan, committed in a single call so a
/// mid-scan failure never leaves half the batch applied.
#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    pub mark_sent: Vec<ReminderId>,
    pub history: Vec<HistoryRecord>,
}

impl ScanBatch {
    pub fn is_empty(&self) -> bool {
        self.mark_sent.is_empty() && self.history.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct NudgeStore {
    users: BTreeMap<UserId, UserRecord>,
    email_index: BTreeMap<EmailAddress, UserId>,
    sessions: BTreeMap<SessionToken, SessionRecord>,
    tasks: BTreeMap<TaskId, TaskRecord>,
    reminders: BTreeMap<ReminderId, ReminderRecord>,
    history: BTreeMap<HistoryEntryId, HistoryRecord>,
    next_user_seq: u64,
    next_task_seq: u64,
    next_reminder_seq: u64,
    next_history_seq: u64,
}

impl NudgeStore {
    pub fn new_in_memory() -> Self {
        Self {
            next_user_seq: 1,
            next_task_seq: 1,
            next_reminder_seq: 1,
            next_history_seq: 1,
            ..Self::default()
        }
    }

    pub fn next_user_id(&mut self) -> UserId {
        let id = UserId::new(format!("user_{:06}", self.next_user_seq))
            .expect("generated ids are valid");
        self.next_user_seq += 1;
        id
    }

    pub fn next_task_id(&mut self) -> TaskId {
        let id = TaskId::new(format!("task_{:06}", self.next_task_seq))
            .expect("generated ids are valid");
        self.next_task_seq += 1;
        id
    }

    pub fn next_reminder_id(&mut self) -> ReminderId {
        let id = ReminderId::new(format!("rem_{:06}", self.next_reminder_seq))
            .expect("generated ids are valid");
        self.next_reminder_seq += 1;
        id
    }

    pub fn next_history_id(&mut self) -> HistoryEntryId {
        let id = HistoryEntryId::new(format!("hist_{:06}", self.next_history_seq))
            .expect("generated ids are valid");
        self.next_history_seq += 1;
        id
    }

    // ---- users ----

    pub fn insert_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.users.contains_key(&record.user_id) {
            return Err(StorageError::DuplicateKey {
                table: "users",
                key: record.user_id.as_str().to_string(),
            });
        }
        if self.email_index.contains_key(&record.email) {
            return Err(StorageError::DuplicateKey {
                table: "users.email",
                key: record.email.as_str().to_string(),
            });
        }
        self.email_index
            .insert(record.email.clone(), record.user_id.clone());
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    pub fn user(&self, user_id: &UserId) -> Option<&UserRecord> {
        self.users.get(user_id)
    }

    pub fn user_by_email(&self, email: &EmailAddress) -> Option<&UserRecord> {
        self.email_index.get(email).and_then(|id| self.users.get(id))
    }

    pub fn set_voice_locked(&mut self, user_id: &UserId, locked: bool) -> Result<(), StorageError> {
        let user = self.users.get_mut(user_id).ok_or(StorageError::NotFound {
            table: "users",
            key: user_id.as_str().to_string(),
        })?;
        user.voice_locked = locked;
        Ok(())
    }

    pub fn set_voice_embedding(
        &mut self,
        user_id: &UserId,
        embedding: VoiceEmbedding,
    ) -> Result<(), StorageError> {
        embedding.validate()?;
        let user = self.users.get_mut(user_id).ok_or(StorageError::NotFound {
            table: "users",
            key: user_id.as_str().to_string(),
        })?;
        user.voice_embedding = Some(embedding);
        Ok(())
    }

    // ---- sessions ----

    pub fn insert_session(&mut self, record: SessionRecord) -> Result<(), StorageError> {
        if !self.users.contains_key(&record.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "sessions.user_id",
                key: record.user_id.as_str().to_string(),
            });
        }
        if self.sessions.contains_key(&record.token) {
            return Err(StorageError::DuplicateKey {
                table: "sessions",
                key: record.token.as_str().to_string(),
            });
        }
        self.sessions.insert(record.token.clone(), record);
        Ok(())
    }

    pub fn session(&self, token: &SessionToken) -> Option<&SessionRecord> {
        self.sessions.get(token)
    }

    pub fn delete_session(&mut self, token: &SessionToken) -> bool {
        self.sessions.remove(token).is_some()
    }

    // ---- tasks ----

    pub fn insert_task(&mut self, record: TaskRecord) -> Result<(), StorageError> {
        record.validate()?;
        if !self.users.contains_key(&record.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "tasks.user_id",
                key: record.user_id.as_str().to_string(),
            });
        }
        if self.tasks.contains_key(&record.task_id) {
            return Err(StorageError::DuplicateKey {
                table: "tasks",
                key: record.task_id.as_str().to_string(),
            });
        }
        self.tasks.insert(record.task_id.clone(), record);
        Ok(())
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.tasks.get(task_id)
    }

    pub fn task_for_user(&self, task_id: &TaskId, user_id: &UserId) -> Option<&TaskRecord> {
        self.tasks
            .get(task_id)
            .filter(|t| &t.user_id == user_id)
    }

    pub fn tasks_for_user(&self, user_id: &UserId) -> Vec<&TaskRecord> {
        self.tasks
            .values()
            .filter(|t| &t.user_id == user_id)
            .collect()
    }

    pub fn set_task_due(
        &mut self,
        task_id: &TaskId,
        due_at: UtcTimestamp,
    ) -> Result<(), StorageError> {
        let task = self.tasks.get_mut(task_id).ok_or(StorageError::NotFound {
            table: "tasks",
            key: task_id.as_str().to_string(),
        })?;
        task.due_at = Some(due_at);
        Ok(())
    }

    /// Removes the task and its reminders, returning the removed row so the
    /// caller can snapshot it into history.
    pub fn remove_task(&mut self, task_id: &TaskId) -> Result<TaskRecord, StorageError> {
        let task = self.tasks.remove(task_id).ok_or(StorageError::NotFound {
            table: "tasks",
            key: task_id.as_str().to_string(),
        })?;
        self.reminders.retain(|_, r| &r.task_id != task_id);
        Ok(task)
    }

    // ---- reminders ----

    /// Inserts a new reminder row. A task may carry several pending rows when
    /// its due time is moved; each fires independently.
    pub fn insert_reminder(&mut self, record: ReminderRecord) -> Result<(), StorageError> {
        if !self.users.contains_key(&record.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "reminders.user_id",
                key: record.user_id.as_str().to_string(),
            });
        }
        if !self.tasks.contains_key(&record.task_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "reminders.task_id",
                key: record.task_id.as_str().to_string(),
            });
        }
        if self.reminders.contains_key(&record.reminder_id) {
            return Err(StorageError::DuplicateKey {
                table: "reminders",
                key: record.reminder_id.as_str().to_string(),
            });
        }
        self.reminders.insert(record.reminder_id.clone(), record);
        Ok(())
    }

    pub fn reminder(&self, reminder_id: &ReminderId) -> Option<&ReminderRecord> {
        self.reminders.get(reminder_id)
    }

    pub fn reminders_for_task(&self, task_id: &TaskId) -> Vec<&ReminderRecord> {
        self.reminders
            .values()
            .filter(|r| &r.task_id == task_id)
            .collect()
    }

    /// All unsent reminders whose fire time is at or before `now`, in id
    /// order. Cloned so the scanner can stage mutations while reading.
    pub fn due_unsent_reminders(&self, now: UtcTimestamp) -> Vec<ReminderRecord> {
        self.reminders
            .values()
            .filter(|r| !r.sent && r.remind_at <= now)
            .cloned()
            .collect()
    }

    /// Commits one scan's staged outcome. Every referenced reminder must
    /// still exist; nothing is applied if any reference is dangling.
    pub fn apply_scan_batch(&mut self, batch: ScanBatch) -> Result<(), StorageError> {
        for reminder_id in &batch.mark_sent {
            if !self.reminders.contains_key(reminder_id) {
                return Err(StorageError::NotFound {
                    table: "reminders",
                    key: reminder_id.as_str().to_string(),
                });
            }
        }
        for entry in &batch.history {
            if self.history.contains_key(&entry.history_id) {
                return Err(StorageError::DuplicateKey {
                    table: "task_history",
                    key: entry.history_id.as_str().to_string(),
                });
            }
        }
        for reminder_id in batch.mark_sent {
            if let Some(r) = self.reminders.get_mut(&reminder_id) {
                r.sent = true;
            }
        }
        for entry in batch.history {
            self.history.insert(entry.history_id.clone(), entry);
        }
        Ok(())
    }

    // ---- task history ----

    pub fn append_history_entry(&mut self, record: HistoryRecord) -> Result<(), StorageError> {
        if !self.users.contains_key(&record.user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "task_history.user_id",
                key: record.user_id.as_str().to_string(),
            });
        }
        if self.history.contains_key(&record.history_id) {
            return Err(StorageError::DuplicateKey {
                table: "task_history",
                key: record.history_id.as_str().to_string(),
            });
        }
        self.history.insert(record.history_id.clone(), record);
        Ok(())
    }

    pub fn history_for_user(&self, user_id: &UserId) -> Vec<&HistoryRecord> {
        self.history
            .values()
            .filter(|h| &h.user_id == user_id)
            .collect()
    }

    /// Per-user clear is the one sanctioned bulk mutation of the ledger.
    pub fn clear_history(&mut self, user_id: &UserId) -> usize {
        let before = self.history.len();
        self.history.retain(|_, h| &h.user_id != user_id);
        before - self.history.len()
    }

    /// Test hook: removes a task row without cascading its reminders, leaving
    /// them dangling the way an external deletion would.
    pub fn detach_task_record(&mut self, task_id: &TaskId) -> Option<TaskRecord> {
        self.tasks.remove(task_id)
    }

    /// Test hook proving existing history rows cannot be rewritten in place.
    pub fn attempt_overwrite_history_entry(
        &mut self,
        _history_id: &HistoryEntryId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "task_history",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> UtcTimestamp {
        UtcTimestamp::from_unix_seconds(secs).unwrap()
    }

    fn sample_user(store: &mut NudgeStore, email: &str) -> UserId {
        let user_id = store.next_user_id();
        store
            .insert_user(
                UserRecord::v1(
                    user_id.clone(),
                    "Test User".to_string(),
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

    fn sample_task(store: &mut NudgeStore, user_id: &UserId) -> TaskId {
        let task_id = store.next_task_id();
        store
            .insert_task(
                TaskRecord::v1(
                    task_id.clone(),
                    user_id.clone(),
                    "buy milk tomorrow".to_string(),
                    None,
                    "buy milk".to_string(),
                    None,
                    CategoryLabel::new("Shopping").unwrap(),
                    PriorityLabel::new("Medium").unwrap(),
                    t(1),
                )
                .unwrap(),
            )
            .unwrap();
        task_id
    }

    #[test]
    fn at_store_01_duplicate_email_refused() {
        let mut s = NudgeStore::new_in_memory();
        sample_user(&mut s, "a@example.com");
        let dup = UserRecord::v1(
            s.next_user_id(),
            "Other User".to_string(),
            EmailAddress::new("A@Example.com").unwrap(),
            PasswordHash::new("v1$c2FsdA$aGFzaA").unwrap(),
            None,
            None,
            None,
            t(2),
        )
        .unwrap();
        assert!(matches!(
            s.insert_user(dup),
            Err(StorageError::DuplicateKey { table: "users.email", .. })
        ));
    }

    #[test]
    fn at_store_02_reminder_requires_task_and_user() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = sample_user(&mut s, "a@example.com");
        let ghost_task = TaskId::new("task_999999").unwrap();
        let r = ReminderRecord::v1(
            s.next_reminder_id(),
            ghost_task,
            user_id,
            t(100),
            t(1),
        );
        assert!(matches!(
            s.insert_reminder(r),
            Err(StorageError::ForeignKeyViolation { table: "reminders.task_id", .. })
        ));
    }

    #[test]
    fn at_store_03_due_scan_excludes_sent_and_future() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = sample_user(&mut s, "a@example.com");
        let task_id = sample_task(&mut s, &user_id);

        let due = ReminderRecord::v1(s.next_reminder_id(), task_id.clone(), user_id.clone(), t(100), t(1));
        let due_id = due.reminder_id.clone();
        let future = ReminderRecord::v1(s.next_reminder_id(), task_id.clone(), user_id.clone(), t(500), t(1));
        let sent = ReminderRecord::v1(s.next_reminder_id(), task_id, user_id, t(50), t(1));
        let sent_id = sent.reminder_id.clone();
        s.insert_reminder(due).unwrap();
        s.insert_reminder(future).unwrap();
        s.insert_reminder(sent).unwrap();
        s.apply_scan_batch(ScanBatch {
            mark_sent: vec![sent_id],
            history: Vec::new(),
        })
        .unwrap();

        let found = s.due_unsent_reminders(t(200));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reminder_id, due_id);
    }

    #[test]
    fn at_store_04_duplicate_reminder_rows_coexist_per_task() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = sample_user(&mut s, "a@example.com");
        let task_id = sample_task(&mut s, &user_id);
        for _ in 0..2 {
            let r = ReminderRecord::v1(
                s.next_reminder_id(),
                task_id.clone(),
                user_id.clone(),
                t(100),
                t(1),
            );
            s.insert_reminder(r).unwrap();
        }
        assert_eq!(s.reminders_for_task(&task_id).len(), 2);
        assert_eq!(s.due_unsent_reminders(t(100)).len(), 2);
    }

    #[test]
    fn at_store_05_remove_task_drops_its_reminders() {
        let mut s = NudgeStore::new_in_memory();
        let user_id = sample_user(&mut s, "a@example.com");
        let task_id = sample_task(&mut s, &user_id);
        let r = ReminderRecord::v1(s.next_reminder_id(), task_id.clone(), user_id, t(100), t(1));
        s.insert_reminder(r).unwrap();

        let removed = s.remove_task(&task_id).unwrap();
        assert_eq!(removed.task_id, task_id);
        assert!(s.reminders_for_task(&task_id).is_empty());
        assert!(s.task(&task_id).is_none());
    }

    #[test]
    fn at_store_06_history_is_append_only_with_per_user_clear() {
        let mut s = NudgeStore::new_in_memory();
        let user_a = sample_user(&mut s, "a@example.com");
        let user_b = sample_user(&mut s, "b@example.com");
        for user in [&user_a, &user_b] {
            let entry = HistoryRecord {
                schema_version: SchemaVersion(1),
                history_id: s.next_history_id(),
                user_id: user.clone(),
                task_id: TaskId::new("task_000001").unwrap(),
                text: "buy milk".to_string(),
                title: "buy milk".to_string(),
                due_at: None,
                category: CategoryLabel::new("Shopping").unwrap(),
                priority: PriorityLabel::new("Medium").unwrap(),
                note: None,
                recorded_at: t(10),
            };
            s.append_history_entry(entry).unwrap();
        }

        let id = s.history_for_user(&user_a)[0].history_id.clone();
        assert!(matches!(
            s.attempt_overwrite_history_entry(&id),
            Err(StorageError::AppendOnlyViolation { table: "task_history" })
        ));

        assert_eq!(s.clear_history(&user_a), 1);
        assert!(s.history_for_user(&user_a).is_empty());
        assert_eq!(s.history_for_user(&user_b).len(), 1);
    }

    #[test]
    fn at_store_07_scan_batch_rejects_dangling_reminder() {
        let mut s = NudgeStore::new_in_memory();
        let batch = ScanBatch {
            mark_sent: vec![ReminderId::new("rem_404404").unwrap()],
            history: Vec::new(),
        };
        assert!(matches!(
            s.apply_scan_batch(batch),
            Err(StorageError::NotFound { table: "reminders", .. })
        ));
    }
}
