use crate::{event::*, log_internal, plugin::*, text};
use anyhow::Result;
use rand::Rng;
use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage, Message};
use std::sync::Arc;

const CHECK_EM_URL: &str =
    "https://media.discordapp.net/attachments/336147052855558148/357986515030376458/check-em.jpg";
const BAD_CHECK_EM_URL: &str =
    "https://cdn.discordapp.com/attachments/287311630880997377/332092380738224128/raw.gif";
const OFF_BY_ONE_URL: &str =
    "https://cdn.discordapp.com/attachments/336147052855558148/357987379283361802/0d6.png";
const CHECK_EM_FOOTER_ICON: &str = "https://i.imgur.com/Gn3vKn6.png";
/// Number of `ohnoN.png` images available.
const OH_NO_IMAGES: u32 = 53;

/// Text transformation commands
pub struct Meme;

impl Meme {
    pub fn factory(_cfg: &Config) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::new(Meme))
    }
}

#[serenity::async_trait]
impl Plugin for Meme {
    fn name(&self) -> &'static str {
        "meme"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &[
                    "ri <text> - regional indicator emojis",
                    "ril <text> - regional indicator emojis, but larger",
                    "sw <text> - s p a c e . w o r d s",
                    "cw <text> - crossword-ify text",
                    "kerrhau <text> - kerrhau-ify text",
                    "clap <text> - CLAP 👏 BETWEEN 👏 WORDS",
                    "clap2 <text> - clap around words too",
                    "ohno - oh no.",
                    "checkem - check 'em",
                ],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };

        if msg.content == "oh no." {
            if ctx.vstate.write().await.recent_messages.first_sighting(msg.id) {
                log_internal!("Sending 'oh no.' for {}", msg.id);
                oh_no(ctx, msg.channel_id).await?;
            }
            return Ok(EventHandled::Yes);
        }

        let Some(cmd) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        let args = cmd.args;

        match cmd.name.as_str() {
            "ri" | "regional_indicators" => {
                replace(ctx, msg, text::regional_indicators(args, false)).await?;
            }
            "ril" | "regional_indicators_large" => {
                replace(ctx, msg, text::regional_indicators(args, true)).await?;
            }
            "sw" | "spacewords" => {
                edit(ctx, msg, text::space_words(args)).await?;
            }
            "cw" | "crossword" => {
                edit(ctx, msg, text::crossword(args).join("\n")).await?;
            }
            "kerrhau" => {
                let words: Vec<&str> = args.split_whitespace().collect();
                let lines = text::kerrhau(&words, &mut rand::thread_rng());
                edit(ctx, msg, lines.join("\n")).await?;
            }
            "clap" => {
                edit(ctx, msg, text::clap(args)).await?;
            }
            "clap2" => {
                edit(ctx, msg, text::clap2(args)).await?;
            }
            "ohno" => {
                oh_no(ctx, msg.channel_id).await?;
                msg.delete(ctx.cache_http).await?;
            }
            "checkem" | "dubs" | "trips" => {
                let number = rand::thread_rng().gen_range(1..=10u64.pow(16));
                check_em(ctx, msg.channel_id, number).await?;
            }
            _ => return Ok(EventHandled::No),
        }

        Ok(EventHandled::Yes)
    }
}

/// Edit the command message in place.  Empty results are left alone since Discord rejects them.
async fn edit(ctx: &Context<'_>, msg: &Message, content: String) -> Result<()> {
    if content.trim().is_empty() {
        return Ok(());
    }
    msg.clone()
        .edit(ctx.cache_http, EditMessage::new().content(content))
        .await?;
    Ok(())
}

/// Post `content` as a new message and delete the command.
async fn replace(ctx: &Context<'_>, msg: &Message, content: String) -> Result<()> {
    if content.trim().is_empty() {
        return Ok(());
    }
    msg.channel_id.say(ctx.cache_http, content).await?;
    msg.delete(ctx.cache_http).await?;
    Ok(())
}

async fn oh_no(ctx: &Context<'_>, channel_id: ChannelId) -> Result<()> {
    let index = rand::thread_rng().gen_range(1..=OH_NO_IMAGES);
    let url = format!("https://www.raylu.net/f/ohno/ohno{}.png", index);
    channel_id
        .send_message(
            ctx.cache_http,
            CreateMessage::new().embed(CreateEmbed::new().image(url)),
        )
        .await?;
    Ok(())
}

fn check_em_image(number: u64) -> &'static str {
    if text::is_dubs(number) {
        CHECK_EM_URL
    } else if text::is_dubs(number + 1) || text::is_dubs(number - 1) {
        OFF_BY_ONE_URL
    } else {
        BAD_CHECK_EM_URL
    }
}

async fn check_em(ctx: &Context<'_>, channel_id: ChannelId, number: u64) -> Result<()> {
    let embed = CreateEmbed::new()
        .description(format!("```{}```", number))
        .footer(
            CreateEmbedFooter::new("Brought to you by the anti-semitic frog foundation")
                .icon_url(CHECK_EM_FOOTER_ICON),
        )
        .image(check_em_image(number));

    channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_em_picks_image_by_last_digits() {
        assert_eq!(check_em_image(4455), CHECK_EM_URL);
        assert_eq!(check_em_image(4456), OFF_BY_ONE_URL);
        assert_eq!(check_em_image(4454), OFF_BY_ONE_URL);
        assert_eq!(check_em_image(4460), BAD_CHECK_EM_URL);
    }
}
