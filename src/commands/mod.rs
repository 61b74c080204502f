// Command modules
mod afk;
mod leaderboard;
mod setup;
pub mod verify;
mod voice;

// Re-export all commands
pub use afk::afk;
pub use leaderboard::{leaderboard, points};
pub use setup::setup;
pub use verify::{unlink, verify};
pub use voice::voice;
