/// Handler modules for Discord events and interactions
mod afk;
pub mod channel;
mod error;
mod interaction;
mod member;
mod voice;

// Re-export main handler functions
pub use afk::handle_message;
pub use error::on_error;
pub use interaction::handle_interaction;
pub use member::{
    handle_invite_create, handle_invite_delete, handle_member_join, handle_member_leave,
    prime_invites,
};
pub use voice::handle_voice_state_update;
