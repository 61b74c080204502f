/// Utility modules for common functionality
pub mod channel_utils;
pub mod discord;
pub mod invites;
pub mod messages;
pub mod ownership;
pub mod role_logic;
pub mod validation;
