//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::GuildId;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

#[serenity::async_trait]
pub trait UserIdHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserIdHelper for serenity::all::UserId {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let user = match self.to_user(ctx.cache_http).await {
            Ok(user) => user,
            Err(_) => return format!("<unknown-user-{}>", *self),
        };

        user.nick_in_guild(ctx, guild_id).await
    }
}

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global username.
        match nick_in_guild {
            Some(nick_in_guild) => nick_in_guild,
            None => self.name.clone(),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn human_format_content(&self, ctx: &Context) -> Result<String>;
    fn is_from_self(&self, ctx: &Context) -> bool;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// Convert discord-formatted message content, which may contain non-user-friendly markup, to a
    /// human-friendly format for the terminal log.
    ///
    /// Serenity provides a message.content_safe() method which uses global discord names rather
    /// than our preferred per-server names.  Thus, we're reimplementing the logic here with the
    /// preferred name.
    async fn human_format_content(&self, ctx: &Context) -> Result<String> {
        let mut content = self.content.clone();

        // Create a mapping from mention strings to their names
        let mut mention_map: HashMap<String, String> = HashMap::new();

        // Map user mentions (e.g. `<@!1234567890>`)
        for user in &self.mentions {
            let name = user.id.nick_in_guild(ctx, self.guild_id).await;
            mention_map.insert(format!("<@!{}>", user.id), format!("@{}", name));
            mention_map.insert(format!("<@{}>", user.id), format!("@{}", name));
        }

        if let Some(guild) = self.guild(ctx.cache) {
            // Map role mentions (e.g. `<@&1234567890>`)
            for role_id in &self.mention_roles {
                let mention = format!("<@&{}>", role_id);

                if let Some(role) = guild.roles.get(role_id) {
                    mention_map.insert(mention, format!("@{}", role.name));
                } else {
                    mention_map.insert(mention, "@UnknownRole".to_string());
                }
            }
        }

        // Replace all mentions with their human-facing names
        for (mention, name) in mention_map {
            content = content.replace(&mention, &name);
        }

        Ok(content)
    }

    /// A selfbot only acts on what its own account types.
    fn is_from_self(&self, ctx: &Context) -> bool {
        self.author.id == ctx.cache.current_user().id
    }
}

/// Canonical form for caseless comparison: full case fold, then compatibility decomposition.
pub fn normalize_caseless(s: &str) -> String {
    caseless::default_case_fold_str(s).nfkd().collect()
}

/// A run of consecutive lines, terminators included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Page<'a> {
    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaginateError {
    #[error("page size must be at least one line")]
    ZeroPageSize,
}

/// Split `text` into pages of `page_size` lines.  The last page may be shorter; an empty input
/// yields no pages.
pub fn paginate(text: &str, page_size: usize) -> Result<Vec<Page<'_>>, PaginateError> {
    if page_size == 0 {
        return Err(PaginateError::ZeroPageSize);
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    Ok(lines
        .chunks(page_size)
        .map(|chunk| Page {
            lines: chunk.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_reconstruct_the_input() {
        let texts = [
            "",
            "one line without terminator",
            "a\nb\nc\n",
            "a\r\nb\r\n\r\nc",
            "\n\n\n\n\n\n\n",
            "first\nsecond\nthird\nfourth\nfifth\nsixth\nseventh",
        ];

        for text in texts {
            let expected: Vec<&str> = text.split_inclusive('\n').collect();
            for page_size in 1..=8 {
                let pages = paginate(text, page_size).unwrap();
                let lines: Vec<&str> = pages.iter().flat_map(|p| p.lines().to_vec()).collect();
                assert_eq!(lines, expected, "page_size {}", page_size);

                let joined: String = pages.iter().map(Page::text).collect();
                assert_eq!(joined, text);

                if let Some((last, full)) = pages.split_last() {
                    assert!(full.iter().all(|p| p.lines().len() == page_size));
                    assert!(!last.lines().is_empty() && last.lines().len() <= page_size);
                }
            }
        }
    }

    #[test]
    fn default_page_size_splits_after_five_lines() {
        let pages = paginate("1\n2\n3\n4\n5\n6\n7", 5).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].text(), "1\n2\n3\n4\n5\n");
        assert_eq!(pages[1].text(), "6\n7");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(paginate("a\nb", 0), Err(PaginateError::ZeroPageSize));
    }

    #[test]
    fn caseless_normalization() {
        assert_eq!(normalize_caseless("PiNg"), normalize_caseless("ping"));
        // Fullwidth letters decompose to ASCII
        assert_eq!(normalize_caseless("ＰＩＮＧ"), "ping");
        assert_eq!(normalize_caseless("Café"), "cafe\u{301}");
        // Full folding, not just lowercasing
        assert_eq!(normalize_caseless("STRASSE"), normalize_caseless("Straße"));
        assert_eq!(normalize_caseless("ΣΊΣΥΦΟΣ"), normalize_caseless("σίσυφος"));
    }
}
