pub mod reminder;

pub use reminder::{ReminderReport, ReminderScheduler};
