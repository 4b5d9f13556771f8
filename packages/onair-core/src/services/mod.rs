//! Application services layer.
//!
//! This module contains the push pipeline between the playlist source and
//! connected clients: change tracking, scheduling, the notifier actor and
//! the background artwork queue.

pub mod image_queue;
pub mod notifier;
pub mod now_state;
pub mod registry;
pub mod scheduler;

pub use image_queue::{ImageCommand, ImageJob, ImageQueue, ImageQueueHandle, ReloadParam};
pub use notifier::{Notifier, NotifierCommand, NotifierHandle};
pub use now_state::{build_snapshot, NowSnapshot, NowStateTracker, PollOutcome, SnapshotEvent};
pub use registry::{ClientId, ClientRegistry, ClientSender, Frame};
pub use scheduler::{next_delay, Scheduler};
