#![forbid(unsafe_code)]

use voicenudge_engines::due_time::DueTimeScheduler;
use voicenudge_engines::mailer::{EmailMessage, NotificationSender};
use voicenudge_kernel_contracts::{ContractViolation, UtcTimestamp};
use voicenudge_storage::{
    HistoryRecord, NudgeStore, ReminderRecord, ScanBatch, StorageError, TaskRecord, UserRecord,
};

use crate::clock::Clock;

pub const SENT_AUDIT_NOTE: &str = "reminder sent";

/// Longest task label carried into the subject line. Task titles may run to
/// 512 chars while the message contract caps subjects at 256; the label is
/// cut here so every valid task composes a valid message.
const SUBJECT_LABEL_MAX_BYTES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderScanConfig {
    /// Cadence of the due scan.
    pub scan_interval_ms: u64,
    /// A tick that starts later than this past its schedule is skipped; the
    /// next tick picks the rows up.
    pub misfire_grace_ms: u64,
}

impl ReminderScanConfig {
    /// One-minute cadence with a one-minute grace window.
    pub fn mvp_v1() -> Self {
        Self {
            scan_interval_ms: 60_000,
            misfire_grace_ms: 60_000,
        }
    }

    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.scan_interval_ms == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "reminder_scan.scan_interval_ms",
                reason: "must be > 0",
            });
        }
        if self.misfire_grace_ms == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "reminder_scan.misfire_grace_ms",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Whether a tick that fired `lateness_ms` after its schedule should still
/// run. Pure so the adapter's timer loop and tests share one rule.
pub fn should_run_after_delay(lateness_ms: u64, config: &ReminderScanConfig) -> bool {
    lateness_ms <= config.misfire_grace_ms
}

/// Counters from one scan pass. Quarantined rows were marked sent without a
/// delivery so they can never wedge the scanner again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub due_seen: usize,
    pub delivered: usize,
    pub send_failed: usize,
    pub quarantined: usize,
    pub audit_failed: usize,
}

/// Walks due unsent reminders, sends one email per row, stages every
/// mutation and commits the batch at the end of the pass.
#[derive(Debug, Clone)]
pub struct ReminderScanner {
    config: ReminderScanConfig,
}

impl ReminderScanner {
    pub fn new(config: ReminderScanConfig) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ReminderScanConfig {
        self.config
    }

    pub fn run_once(
        &self,
        store: &mut NudgeStore,
        sender: &dyn NotificationSender,
        scheduler: &DueTimeScheduler,
        clock: &dyn Clock,
    ) -> Result<ScanReport, StorageError> {
        let now = clock.now();
        let due = store.due_unsent_reminders(now);
        let mut report = ScanReport {
            due_seen: due.len(),
            ..ScanReport::default()
        };
        let mut batch = ScanBatch::default();

        for reminder in &due {
            // A reminder pointing at a vanished task or user can never
            // deliver; take it out of circulation instead of retrying it
            // every minute.
            let Some(task) = store.task(&reminder.task_id).cloned() else {
                quarantine(&mut batch, &mut report, reminder);
                continue;
            };
            let Some(user) = store.user(&reminder.user_id).cloned() else {
                quarantine(&mut batch, &mut report, reminder);
                continue;
            };

            let message = match build_reminder_email(&user, &task, scheduler) {
                Ok(message) => message,
                Err(violation) => {
                    // The row itself is intact; leave it unsent so a later
                    // pass can still deliver it.
                    eprintln!(
                        "reminder_scan: could not compose message for {}: {violation:?}",
                        reminder.reminder_id.as_str()
                    );
                    report.send_failed += 1;
                    continue;
                }
            };

            match sender.send(&message) {
                Ok(()) => {
                    batch.mark_sent.push(reminder.reminder_id.clone());
                    batch.history.push(HistoryRecord {
                        schema_version: task.schema_version,
                        history_id: store.next_history_id(),
                        user_id: user.user_id.clone(),
                        task_id: task.task_id.clone(),
                        text: task.text.clone(),
                        title: task.title.clone(),
                        due_at: task.due_at,
                        category: task.category.clone(),
                        priority: task.priority.clone(),
                        note: Some(SENT_AUDIT_NOTE.to_string()),
                        recorded_at: now,
                    });
                    report.delivered += 1;
                }
                Err(err) => {
                    // Left unsent; the next pass retries.
                    eprintln!(
                        "reminder_scan: send failed for {}: {err}",
                        reminder.reminder_id.as_str()
                    );
                    report.send_failed += 1;
                }
            }
        }

        if !batch.is_empty() {
            let audit_count = batch.history.len();
            match store.apply_scan_batch(batch.clone()) {
                Ok(()) => {}
                Err(err) if audit_count > 0 => {
                    // Sent markings must survive a rejected audit append;
                    // otherwise every delivery would repeat next pass.
                    eprintln!(
                        "reminder_scan: audit append rejected, committing sent marks only: {err:?}"
                    );
                    report.audit_failed = audit_count;
                    let mut retry = batch;
                    retry.history.clear();
                    store.apply_scan_batch(retry)?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }
}

fn quarantine(batch: &mut ScanBatch, report: &mut ScanReport, reminder: &ReminderRecord) {
    eprintln!(
        "reminder_scan: quarantined broken reminder {}",
        reminder.reminder_id.as_str()
    );
    batch.mark_sent.push(reminder.reminder_id.clone());
    report.quarantined += 1;
}

fn build_reminder_email(
    user: &UserRecord,
    task: &TaskRecord,
    scheduler: &DueTimeScheduler,
) -> Result<EmailMessage, ContractViolation> {
    let raw_label = if task.title.trim().is_empty() {
        task.text.as_str()
    } else {
        task.title.as_str()
    };
    let label = bounded_label(raw_label, SUBJECT_LABEL_MAX_BYTES);
    let label = label.as_str();
    let due_line = match task.due_at {
        Some(due) => format!("Due at (UTC): {}", due.to_rfc3339()),
        None => "Due time not set".to_string(),
    };
    let calendar_line = task
        .due_at
        .map(|due| format!("\nAdd to calendar: {}", scheduler.calendar_add_link(label, due)))
        .unwrap_or_default();
    let body = format!(
        "Hi {},\n\nThis is your reminder for:\n- {label}\n{due_line}{calendar_line}\n\n— VoiceNudge",
        user.display_name
    );
    EmailMessage::v1(
        user.email.clone(),
        format!("[VoiceNudge] Reminder: {label}"),
        body,
        None,
    )
}

fn bounded_label(raw: &str, max_bytes: usize) -> String {
    if raw.len() <= max_bytes {
        return raw.to_string();
    }
    let mut end = max_bytes;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}
