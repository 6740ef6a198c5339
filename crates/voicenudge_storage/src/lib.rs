#![forbid(unsafe_code)]

pub mod store;

pub use store::{
    HistoryRecord, NudgeStore, ReminderRecord, ScanBatch, SessionRecord, StorageError, TaskRecord,
    UserRecord,
};
