use poise::{CreateReply, FrameworkError};
use tracing::error;

use crate::{
    models::{Data, Error},
    utils::messages::{build_permission_error, format_error},
};

pub const GENERIC_ERROR: &str = "An error occurred. Please try again later.";

/// Log framework errors and tell the user something went wrong
pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {}", error);
        }
        FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().qualified_name, error);
            let reply = CreateReply::default()
                .content(format_error(GENERIC_ERROR))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to report command error: {}", e);
            }
        }
        FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            let required = missing_permissions
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let reply = CreateReply::default()
                .content(build_permission_error(&required))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to report missing permissions: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}
