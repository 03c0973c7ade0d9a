mod calc;
mod config;
mod context;
mod dice;
mod event;
mod extension;
mod handler;
mod helper;
mod logging;
mod plugin;
mod reddit;
mod text;
mod volatile_state;

use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();

    let extensions = crate::extension::ExtensionRegistry::builtin();
    for e in extensions.load_all(&cfg.general.extensions, &cfg).await {
        log_error!("{:#}", e);
    }

    let vstate = crate::volatile_state::VolatileState::new();
    let handler = handler::Handler::new(cfg, vstate, extensions);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
