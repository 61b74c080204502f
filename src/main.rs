mod commands;
mod config;
mod constants;
mod handlers;
mod models;
mod schedule;
mod services;
mod session;
mod store;
mod utils;

use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    commands::{afk, leaderboard, points, setup, unlink, verify, voice},
    config::Config,
    constants::LOG_DIRECTIVE,
    handlers::{
        handle_interaction, handle_invite_create, handle_invite_delete, handle_member_join,
        handle_member_leave, handle_message, handle_voice_state_update, on_error, prime_invites,
    },
    models::{Data, Error},
    schedule::start_schedule_manager,
    services::roblox::RobloxClient,
    session::{DiscordExpirer, SessionScheduler},
    store::Store,
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    initialize_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match Store::open(&config.data_dir).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open data directory: {}", e);
            std::process::exit(1);
        }
    };

    let roblox = match RobloxClient::new(config.roblox_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build Roblox client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = start_bot(config, store, roblox).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the logging system
fn initialize_logging() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    match LOG_DIRECTIVE.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log directive '{}': {}", LOG_DIRECTIVE, e),
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            handle_voice_state_update(ctx, old.clone(), new.clone(), data).await;
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            handle_interaction(ctx, component.clone(), data).await;
        }
        serenity::FullEvent::Message { new_message } => {
            handle_message(ctx, new_message, data).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            handle_member_join(ctx, new_member, data).await;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            handle_member_leave(ctx, *guild_id, user, data).await;
        }
        serenity::FullEvent::CacheReady { guilds } => {
            prime_invites(ctx, guilds, data).await;
        }
        serenity::FullEvent::InviteCreate { data: event } => {
            handle_invite_create(event, data);
        }
        serenity::FullEvent::InviteDelete { data: event } => {
            handle_invite_delete(event, data);
        }
        _ => {}
    }
    Ok(())
}

/// Create and start the Discord bot
async fn start_bot(config: Config, store: Store, roblox: RobloxClient) -> Result<(), Error> {
    let token = config.discord_token.clone();
    let dev_guild_id = config.dev_guild_id;
    let config = Arc::new(config);
    let store = Arc::new(store);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                setup(),
                verify(),
                unlink(),
                leaderboard(),
                points(),
                afk(),
                voice(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let expirer = DiscordExpirer::new(Arc::clone(&ctx.http));
                let sessions = SessionScheduler::init(Arc::clone(&store), expirer).await;
                info!("Session scheduler started with {} live sessions", sessions.len());

                let data = Data::new(config, store, sessions, roblox);

                start_schedule_manager(Arc::clone(&ctx.http), Arc::clone(&ctx.cache), data.clone());
                info!("Schedule manager task started");

                // Register commands based on dev_guild_id
                if let Some(guild_id) = dev_guild_id {
                    let guild = serenity::GuildId::new(guild_id);
                    info!("Registering commands in development guild: {}", guild_id);
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, guild)
                        .await?;
                } else {
                    info!("Registering commands globally (may take up to 1 hour)");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }

                info!("Bot is ready!");
                Ok(data)
            })
        })
        .build();

    // Message content is needed to see who an AFK notice should answer
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    client.start().await?;

    Ok(())
}
