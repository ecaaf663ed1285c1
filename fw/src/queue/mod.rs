//! Target scheduling: base rotation and priority overlay

mod core;
mod rotation;

pub use core::{PriorityQueue, PriorityQueueConfig, QueueStatus, Tier};
pub use rotation::{Target, interleave};
