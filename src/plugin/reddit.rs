use crate::{
    event::*,
    log_error,
    plugin::*,
    reddit::{RedditSession, ReqwestTransport},
};
use anyhow::{anyhow, Result};
use serenity::all::{Colour, CreateEmbed, CreateEmbedAuthor, CreateMessage};
use std::sync::Arc;

/// Commands backed by the Reddit API
pub struct Reddit {
    /// None if the configuration has no `[reddit]` section
    session: Option<RedditSession>,
}

impl Reddit {
    pub fn factory(cfg: &Config) -> Result<Arc<dyn Plugin>> {
        let session = cfg
            .reddit
            .as_ref()
            .map(RedditSession::<ReqwestTransport>::from_config)
            .transpose()?;
        Ok(Arc::new(Reddit { session }))
    }
}

#[serenity::async_trait]
impl Plugin for Reddit {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_lines(ctx, &["headpat - random headpat from r/headpats"]).await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, &["headpat"]).await else {
            return Ok(EventHandled::No);
        };

        let Some(session) = &self.session else {
            let content = "This command requires Reddit integration, but no token was given";
            log_error!("{}", content);
            msg.channel_id.say(ctx.cache_http, content).await?;
            return Ok(EventHandled::Yes);
        };

        let embed = match random_post(session, "headpats").await {
            Ok(post) => CreateEmbed::new()
                .title(&post.title)
                .url(format!("https://www.reddit.com{}", post.permalink))
                .image(&post.image_url),
            Err(err) => {
                log_error!("Reddit request failed: {:#}", err);
                failure_embed(&err)
            }
        };
        msg.channel_id
            .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
            .await?;
        Ok(EventHandled::Yes)
    }
}

async fn random_post(session: &RedditSession, subreddit: &str) -> Result<RandomPost> {
    let listing = session.request(&format!("/r/{}/random", subreddit)).await?;
    RandomPost::from_listing(&listing)
}

fn failure_embed(err: &anyhow::Error) -> CreateEmbed {
    CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Reddit request failed"))
        .colour(Colour::RED)
        .description(format!("```{:#}```", err))
}

/// The parts of a `/random` listing we show
#[derive(Debug, PartialEq, Eq)]
struct RandomPost {
    title: String,
    permalink: String,
    image_url: String,
}

#[derive(serde::Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(serde::Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(serde::Deserialize)]
struct Child {
    data: Post,
}

#[derive(serde::Deserialize)]
struct Post {
    title: String,
    permalink: String,
    preview: Option<Preview>,
}

#[derive(serde::Deserialize)]
struct Preview {
    images: Vec<PreviewImage>,
}

#[derive(serde::Deserialize)]
struct PreviewImage {
    source: Resolution,
    #[serde(default)]
    resolutions: Vec<Resolution>,
}

#[derive(serde::Deserialize)]
struct Resolution {
    url: String,
}

impl RandomPost {
    /// `/random` answers with a pair of listings: the post, then its comments.
    fn from_listing(value: &serde_json::Value) -> Result<Self> {
        let first = value
            .get(0)
            .ok_or(anyhow!("Reddit returned no listings"))?;
        let listing: Listing = serde_json::from_value(first.clone())?;
        let post = listing
            .data
            .children
            .into_iter()
            .next()
            .ok_or(anyhow!("Reddit returned an empty listing"))?
            .data;

        let image = post
            .preview
            .and_then(|preview| preview.images.into_iter().next())
            .ok_or(anyhow!("Post `{}` has no preview image", post.title))?;

        // The second-smallest resolution is a good size for an embed.  Small images may not have
        // one, so fall back to the original.
        let chosen = image
            .resolutions
            .into_iter()
            .nth(1)
            .unwrap_or(image.source);

        Ok(Self {
            title: post.title,
            permalink: post.permalink,
            // Preview URLs come HTML-escaped
            image_url: chosen.url.replace("&amp;", "&"),
        })
    }
}
