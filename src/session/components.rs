use poise::serenity_prelude::{ButtonStyle, CreateActionRow, CreateButton};

use crate::{
    constants::{LEADERBOARD_NEXT_ID, LEADERBOARD_PREV_ID, VERIFY_RECHECK_ID},
    models::SessionKind,
};

/// Prev/Next paging buttons
pub fn leaderboard_buttons(disabled: bool) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(LEADERBOARD_PREV_ID)
            .label("◀ Prev")
            .style(ButtonStyle::Secondary)
            .disabled(disabled),
        CreateButton::new(LEADERBOARD_NEXT_ID)
            .label("Next ▶")
            .style(ButtonStyle::Secondary)
            .disabled(disabled),
    ])
}

/// "Check again" button shown under a pending verification
pub fn verify_buttons(disabled: bool) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(VERIFY_RECHECK_ID)
            .label("🔄 Check again")
            .style(ButtonStyle::Primary)
            .disabled(disabled),
    ])
}

/// Components for a session's message, enabled or not
pub fn components_for(kind: SessionKind, disabled: bool) -> Vec<CreateActionRow> {
    match kind {
        SessionKind::Leaderboard => vec![leaderboard_buttons(disabled)],
        SessionKind::Verify => vec![verify_buttons(disabled)],
    }
}
