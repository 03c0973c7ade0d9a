use crate::{event::*, helper::*, plugin::*};
use anyhow::Result;

pub struct IgnoreOthers;

#[serenity::async_trait]
impl Plugin for IgnoreOthers {
    fn name(&self) -> &'static str {
        "ignore_others"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };

        if msg.is_from_self(ctx) {
            Ok(EventHandled::No)
        } else {
            Ok(EventHandled::Yes)
        }
    }
}
