use crate::{
    config::Config, context::Context, event::Event, extension::ExtensionRegistry,
    volatile_state::VolatileState,
};
use serenity::all::{Message, Ready};
use tokio::sync::RwLock;

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    vstate: RwLock<VolatileState>,
    extensions: ExtensionRegistry,
}

impl<'a> Handler {
    pub fn new(cfg: Config, vstate: VolatileState, extensions: ExtensionRegistry) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            vstate: RwLock::new(vstate),
            extensions,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            vstate: &self.vstate,
            extensions: &self.extensions,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }
}
