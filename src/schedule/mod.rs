/// Schedule management modules
mod manager;
mod tasks;
mod types;

// Re-export public types and functions
pub use manager::start_schedule_manager;
pub use types::{Schedule, ScheduleType};
