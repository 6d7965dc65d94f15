pub mod boundaries;
pub mod bus;
pub mod manager;

pub use boundaries::{next_week_start, CheckpointScheduler, DueCheckpoint};
pub use bus::{CheckpointBus, Subscription};
pub use manager::StroboscopicManager;
