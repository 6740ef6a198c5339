#![forbid(unsafe_code)]

use voicenudge_engines::classify::{CategoryClassifier, PriorityClassifier};
use voicenudge_engines::due_time::{DueTimeConfig, DueTimeError, DueTimeScheduler};
use voicenudge_engines::extractor::AudioSample;
use voicenudge_engines::task_parse::{clean_text, TaskTextParser};
use voicenudge_engines::transcriber::{TranscribeError, Transcriber};
use voicenudge_kernel_contracts::auth::UserId;
use voicenudge_kernel_contracts::reminder::ReminderId;
use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel, TaskId};
use voicenudge_kernel_contracts::{ContractViolation, UtcTimestamp};
use voicenudge_storage::{NudgeStore, ReminderRecord, StorageError, TaskRecord};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskFlowError {
    EmptyText,
    Storage(StorageError),
    Contract(ContractViolation),
    DueTime(DueTimeError),
    Transcribe(TranscribeError),
}

impl From<StorageError> for TaskFlowError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ContractViolation> for TaskFlowError {
    fn from(e: ContractViolation) -> Self {
        Self::Contract(e)
    }
}

impl From<DueTimeError> for TaskFlowError {
    fn from(e: DueTimeError) -> Self {
        Self::DueTime(e)
    }
}

impl From<TranscribeError> for TaskFlowError {
    fn from(e: TranscribeError) -> Self {
        Self::Transcribe(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskIngestOutcome {
    pub task_id: TaskId,
    pub title: String,
    pub due_at: Option<UtcTimestamp>,
    pub category: CategoryLabel,
    pub priority: PriorityLabel,
    /// Set when no due phrase was recognized; callers prompt for set_due.
    pub needs_due_date: bool,
    pub transcribed_text: Option<String>,
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetDueOutcome {
    pub due_at_utc: UtcTimestamp,
    pub remind_at_utc: UtcTimestamp,
    pub reminder_id: ReminderId,
    pub calendar_link: String,
}

/// Task lifecycle orchestration: ingest (text or voice), due assignment with
/// reminder creation, completion into history.
#[derive(Debug, Clone)]
pub struct TaskFlows {
    parser: TaskTextParser,
    scheduler: DueTimeScheduler,
}

impl TaskFlows {
    pub fn new(due_config: DueTimeConfig) -> Result<Self, ContractViolation> {
        Ok(Self {
            parser: TaskTextParser::new(due_config.utc_offset_minutes),
            scheduler: DueTimeScheduler::new(due_config)?,
        })
    }

    pub fn scheduler(&self) -> &DueTimeScheduler {
        &self.scheduler
    }

    pub fn ingest_text(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        user_id: &UserId,
        text: &str,
        category: &dyn CategoryClassifier,
        priority: &dyn PriorityClassifier,
    ) -> Result<TaskIngestOutcome, TaskFlowError> {
        self.ingest(store, clock, user_id, text, None, category, priority)
    }

    /// Voice path: transcribe natively for the record, then in English for
    /// parsing and classification.
    pub fn ingest_voice(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        user_id: &UserId,
        sample: &AudioSample,
        transcriber: &dyn Transcriber,
        category: &dyn CategoryClassifier,
        priority: &dyn PriorityClassifier,
    ) -> Result<TaskIngestOutcome, TaskFlowError> {
        let native = transcriber.transcribe(sample, false)?;
        let translated = transcriber.transcribe(sample, true)?;
        self.ingest(
            store,
            clock,
            user_id,
            &translated,
            Some(native),
            category,
            priority,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn ingest(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        user_id: &UserId,
        text: &str,
        original_text: Option<String>,
        category: &dyn CategoryClassifier,
        priority: &dyn PriorityClassifier,
    ) -> Result<TaskIngestOutcome, TaskFlowError> {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return Err(TaskFlowError::EmptyText);
        }

        let now = clock.now();
        let parsed = self.parser.parse(text, now);
        let category_label = category.predict_category(&cleaned);
        let priority_label = priority.predict_priority(&cleaned);

        let task_id = store.next_task_id();
        let record = TaskRecord::v1(
            task_id.clone(),
            user_id.clone(),
            cleaned,
            original_text.clone(),
            parsed.title.clone(),
            parsed.due_at,
            category_label.clone(),
            priority_label.clone(),
            now,
        )?;
        store.insert_task(record)?;

        Ok(TaskIngestOutcome {
            task_id,
            title: parsed.title,
            due_at: parsed.due_at,
            category: category_label,
            priority: priority_label,
            needs_due_date: parsed.due_at.is_none(),
            transcribed_text: original_text.is_some().then(|| text.to_string()),
            original_text,
        })
    }

    /// Moves (or sets) the due time and stages a reminder at the configured
    /// lead. Every call inserts a fresh reminder row; earlier pending rows
    /// for the task keep their own fire times.
    pub fn set_due(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        user_id: &UserId,
        task_id: &TaskId,
        local_due_iso: &str,
    ) -> Result<SetDueOutcome, TaskFlowError> {
        let task = owned_task(store, task_id, user_id)?;
        let title = task.title.clone();

        let due_utc = self.scheduler.to_utc(local_due_iso)?;
        let remind_at = self.scheduler.derive_reminder_time(due_utc);

        store.set_task_due(task_id, due_utc)?;
        let reminder_id = store.next_reminder_id();
        store.insert_reminder(ReminderRecord::v1(
            reminder_id.clone(),
            task_id.clone(),
            user_id.clone(),
            remind_at,
            clock.now(),
        ))?;

        Ok(SetDueOutcome {
            due_at_utc: due_utc,
            remind_at_utc: remind_at,
            reminder_id,
            calendar_link: self.scheduler.calendar_add_link(&title, due_utc),
        })
    }

    /// Completion removes the task (and its pending reminders) and archives
    /// a snapshot.
    pub fn complete(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        user_id: &UserId,
        task_id: &TaskId,
    ) -> Result<voicenudge_kernel_contracts::reminder::HistoryEntryId, TaskFlowError> {
        owned_task(store, task_id, user_id)?;
        let task = store.remove_task(task_id)?;

        let history_id = store.next_history_id();
        store.append_history_entry(voicenudge_storage::HistoryRecord {
            schema_version: task.schema_version,
            history_id: history_id.clone(),
            user_id: task.user_id,
            task_id: task.task_id,
            text: task.text,
            title: task.title,
            due_at: task.due_at,
            category: task.category,
            priority: task.priority,
            note: None,
            recorded_at: clock.now(),
        })?;
        Ok(history_id)
    }

    pub fn list<'a>(&self, store: &'a NudgeStore, user_id: &UserId) -> Vec<&'a TaskRecord> {
        store.tasks_for_user(user_id)
    }
}

fn owned_task(
    store: &NudgeStore,
    task_id: &TaskId,
    user_id: &UserId,
) -> Result<TaskRecord, TaskFlowError> {
    // Cross-user probes read the same as missing tasks.
    store
        .task_for_user(task_id, user_id)
        .cloned()
        .ok_or_else(|| {
            TaskFlowError::Storage(StorageError::NotFound {
                table: "tasks",
                key: task_id.as_str().to_string(),
            })
        })
}
