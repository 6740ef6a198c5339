#![forbid(unsafe_code)]

pub mod secrets_cli;
