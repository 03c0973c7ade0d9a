use crate::{event::*, helper::paginate, plugin::*};
use anyhow::Result;

/// Lines per help message.  Keeps each reply well under Discord's message length limit.
const HELP_PAGE_LINES: usize = 20;

pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_lines(ctx, &["help - show this help message"]).await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, &[self.name()]).await else {
            return Ok(EventHandled::No);
        };

        let mut usages = Vec::new();
        for plugin in crate::plugin::core_plugins() {
            usages.extend(plugin.usage(ctx).await);
        }
        for plugin in ctx.extensions.active().await {
            usages.extend(plugin.usage(ctx).await);
        }

        let mut text = String::from("Commands:\n");
        for usage in usages {
            text.push_str(&usage);
            text.push('\n');
        }

        for page in paginate(&text, HELP_PAGE_LINES)? {
            msg.channel_id
                .say(ctx.cache_http, format!("```\n{}```", page.text()))
                .await?;
        }
        Ok(EventHandled::Yes)
    }
}
