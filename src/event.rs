//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! this module translates the callbacks a distinct Event enum.

use crate::{context::Context, helper::normalize_caseless, log_error};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

/// A message addressed to the bot, split into command word and arguments.
pub struct BotCmd<'a> {
    pub msg: &'a Message,
    /// Command word without the prefix, caselessly normalized.
    pub name: String,
    /// Everything after the command word, leading whitespace removed.
    pub args: &'a str,
}

impl Event {
    // When an event occurs, offer it to the core plugins and then to every loaded extension in
    // load order, stopping at the first one that claims it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::core_plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }

        for plugin in ctx.extensions.active().await {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in extension {}: {:#}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a bot command.
    //
    // These are prefixed with the configured prefix, e. g. `;cmd foo bar baz`.
    pub async fn bot_cmd(&self, ctx: &Context<'_>) -> Option<BotCmd<'_>> {
        let Event::Message(msg) = self else {
            return None;
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let (name, args) = split_command(&msg.content, &prefix)?;
        Some(BotCmd {
            msg,
            name: normalize_caseless(name),
            args,
        })
    }

    /// Like `bot_cmd`, but only matches the given command word or one of its aliases.
    pub async fn is_bot_cmd(&self, ctx: &Context<'_>, names: &[&str]) -> Option<(&Message, &str)> {
        let cmd = self.bot_cmd(ctx).await?;
        names
            .iter()
            .any(|name| normalize_caseless(name) == cmd.name)
            .then_some((cmd.msg, cmd.args))
    }
}

/// `;roll 2d6` with prefix `;` -> (`roll`, `2d6`)
fn split_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = content.strip_prefix(prefix)?;
    let (name, args) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim_start()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return None;
    }
    Some((name, args))
}

pub enum EventHandled {
    Yes,
    No,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_command_and_arguments() {
        assert_eq!(split_command(";roll 2d6", ";"), Some(("roll", "2d6")));
        assert_eq!(split_command(";ping", ";"), Some(("ping", "")));
        assert_eq!(
            split_command(";calc  1 +\n2", ";"),
            Some(("calc", "1 +\n2"))
        );
        assert_eq!(split_command("!!cw hi", "!!"), Some(("cw", "hi")));
    }

    #[test]
    fn ignores_unprefixed_messages() {
        assert_eq!(split_command("roll 2d6", ";"), None);
        assert_eq!(split_command("; roll", ";"), None);
        assert_eq!(split_command(";", ";"), None);
    }
}
