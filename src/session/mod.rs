/// Auto-disable scheduling for interactive messages
pub mod components;
mod expiry;
mod queue;
mod scheduler;

pub use expiry::DiscordExpirer;
pub use scheduler::SessionScheduler;
