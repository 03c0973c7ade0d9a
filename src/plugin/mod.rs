use crate::{
    config::Config,
    context::Context,
    event::{Event, EventHandled},
    extension::CatalogEntry,
};
use anyhow::Result;

mod debug;
mod extensions;
mod general;
mod help;
mod ignore_others;
mod meme;
mod reddit;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug
    fn name(&self) -> &'static str;
    /// Help message lines.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of plugins which are always active and cannot be unloaded
pub fn core_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Log everything before anything can claim it
        Box::new(debug::Debug),
        // A selfbot only takes commands from its own account
        Box::new(ignore_others::IgnoreOthers),
        Box::new(help::Help),
        Box::new(extensions::Extensions),
    ]
}

/// Every extension that can be loaded by name
pub fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: "mawabot.cogs.general",
            factory: general::General::factory,
        },
        CatalogEntry {
            name: "mawabot.cogs.text.meme",
            factory: meme::Meme::factory,
        },
        CatalogEntry {
            name: "mawabot.cogs.text.reddit",
            factory: reddit::Reddit::factory,
        },
    ]
}

/// Prefix each usage line with the configured command prefix.
async fn usage_lines(ctx: &Context<'_>, lines: &[&str]) -> String {
    let prefix = &ctx.cfg.read().await.general.command_prefix;
    lines
        .iter()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
