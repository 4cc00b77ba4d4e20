pub mod queue;

pub use queue::{Delivery, InMemoryQueue, MessageQueue, Topic};
