use crate::{calc, dice::DiceSpec, event::*, plugin::*};
use anyhow::Result;
use serenity::all::{
    ActivityData, Colour, CreateEmbed, CreateEmbedAuthor, CreateMessage, EditMessage, UserId,
};
use std::sync::Arc;

/// Everyday commands: ping, dice, calculator, nickname, presence, mentions
pub struct General;

impl General {
    pub fn factory(_cfg: &Config) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::new(General))
    }
}

#[serenity::async_trait]
impl Plugin for General {
    fn name(&self) -> &'static str {
        "general"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "ping - pong",
                    "roll [XdY] - roll X dice with Y sides",
                    "calc <expr> - evaluate a math expression",
                    "nick [name] - change or clear your nickname in this server",
                    "playing [game] - change or clear your current game",
                    "mention <id>... - mention users in an embed",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some(cmd) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        let (msg, args) = (cmd.msg, cmd.args);

        match cmd.name.as_str() {
            "ping" => {
                msg.clone()
                    .edit(ctx.cache_http, EditMessage::new().content("Pong!"))
                    .await?;
            }
            "roll" => {
                // Unparseable notation is deliberately ignored
                let Some(spec) = DiceSpec::parse(args) else {
                    return Ok(EventHandled::Yes);
                };
                let reply = match spec.roll(&mut rand::thread_rng()) {
                    Ok(roll) => roll.to_string(),
                    Err(too_many) => too_many.to_string(),
                };
                msg.channel_id.say(ctx.cache_http, reply).await?;
            }
            "calc" => {
                let expr = if args.is_empty() { "(nothing)" } else { args };
                let result = calc::evaluate(expr);
                let colour = if result.is_ok() {
                    Colour::TEAL
                } else {
                    Colour::RED
                };
                let description = format!(
                    "**Input:**\n{}\n\n**Output:**\n{}",
                    expr.replace('*', r"\*"),
                    calc::render(&result)
                );
                let embed = CreateEmbed::new()
                    .author(CreateEmbedAuthor::new("Calculator:"))
                    .colour(colour)
                    .description(description);

                msg.channel_id
                    .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
                    .await?;
                msg.delete(ctx.cache_http).await?;
            }
            "nick" => {
                let Some(guild_id) = msg.guild_id else {
                    return Ok(EventHandled::Yes);
                };
                let nick = (!args.is_empty()).then_some(args);
                guild_id.edit_nickname(ctx.http, nick).await?;
            }
            "playing" => {
                let activity = (!args.is_empty()).then(|| ActivityData::playing(args));
                ctx.cache_http.set_activity(activity);
            }
            "mention" => {
                let ids: Vec<UserId> = args
                    .split_whitespace()
                    .filter_map(|id| id.parse::<u64>().ok())
                    .filter(|&id| id != 0)
                    .map(UserId::new)
                    .collect();
                if ids.is_empty() {
                    return Ok(EventHandled::Yes);
                }

                let description = ids
                    .iter()
                    .map(|id| format!("<@!{}>", id))
                    .collect::<Vec<_>>()
                    .join("\n");
                msg.channel_id
                    .send_message(
                        ctx.cache_http,
                        CreateMessage::new().embed(CreateEmbed::new().description(description)),
                    )
                    .await?;
                msg.delete(ctx.cache_http).await?;
            }
            _ => return Ok(EventHandled::No),
        }

        Ok(EventHandled::Yes)
    }
}
