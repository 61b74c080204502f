pub mod afk;
pub mod leaderboard;
pub mod roblox;
pub mod temp_voice;
pub mod verification;
