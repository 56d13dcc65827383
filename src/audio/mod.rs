// Audio module - device boundary, capture plumbing, metronome scheduling

pub mod buffer_pool;
pub mod device;
pub mod metronome;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use buffer_pool::{capture_pair, CaptureReader, CaptureWriter, SampleBuffer};
pub use device::{CpalInput, CpalOutput, InputDevice, OutputDevice, ToneMixer, ToneSpec};
pub use scheduler::{ClickScheduler, ScheduledBeat, SchedulerCore};
