#![forbid(unsafe_code)]

pub mod clock;
pub mod history;
pub mod login;
pub mod register;
pub mod reminder_scan;
pub mod tasks;

pub use clock::{Clock, FixedClock, SystemClock};
