#![forbid(unsafe_code)]

pub mod auth_decision;
pub mod classify;
pub mod due_time;
pub mod embedding;
pub mod extractor;
pub mod mailer;
pub mod provider;
pub mod secret_vault;
pub mod task_parse;
pub mod transcriber;
