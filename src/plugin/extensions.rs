use crate::{event::*, log_error, plugin::*};
use anyhow::Result;
use serenity::all::{Colour, CreateEmbed, CreateEmbedAuthor, CreateMessage, EditMessage, Message};
use std::fmt::Display;

/// Load, unload, reload and list extensions at runtime
pub struct Extensions;

#[serenity::async_trait]
impl Plugin for Extensions {
    fn name(&self) -> &'static str {
        "extensions"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "load <name> - load an extension",
                    "unload <name> - unload an extension",
                    "reload <name> - unload then load an extension",
                    "cogs - list loaded extensions",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some(cmd) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };

        let name = cmd.args.split_whitespace().next();
        match (cmd.name.as_str(), name) {
            ("load", Some(name)) => {
                let cfg = ctx.cfg.read().await;
                let outcome = ctx.extensions.load(name, &cfg).await;
                report(ctx, cmd.msg, "Loaded", "Load failed", outcome).await?;
            }
            ("unload", Some(name)) => {
                let outcome = ctx.extensions.unload(name).await;
                report(ctx, cmd.msg, "Unloaded", "Unload failed", outcome).await?;
            }
            ("reload", Some(name)) => {
                // Pick up configuration changes too, such as new Reddit credentials
                let mut cfg = ctx.cfg.write().await;
                if let Err(e) = cfg.reload().await {
                    log_error!("Keeping previous configuration: {:#}", e);
                }
                let cfg = cfg.downgrade();
                let outcome = ctx.extensions.reload(name, &cfg).await;
                report(ctx, cmd.msg, "Reloaded", "Reload failed", outcome).await?;
            }
            ("cogs", _) => {
                let listing = ctx.extensions.list_loaded().await;
                let content = format!("```yaml\n{}\n```", listing);
                cmd.msg
                    .clone()
                    .edit(ctx.cache_http, EditMessage::new().content(content))
                    .await?;
            }
            _ => return Ok(EventHandled::No),
        }

        Ok(EventHandled::Yes)
    }
}

/// Green embed naming the extension on success, red embed with the reason on failure.
async fn report<E: Display>(
    ctx: &Context<'_>,
    msg: &Message,
    success: &str,
    failure: &str,
    outcome: Result<String, E>,
) -> Result<()> {
    let embed = match outcome {
        Ok(name) => CreateEmbed::new()
            .author(CreateEmbedAuthor::new(success))
            .colour(Colour::DARK_GREEN)
            .description(format!("```{}```", name)),
        Err(err) => {
            log_error!("{}: {}", failure, err);
            CreateEmbed::new()
                .author(CreateEmbedAuthor::new(failure))
                .colour(Colour::RED)
                .description(format!("```{}```", err))
        }
    };

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}
