//! Gallery browsing (the `photo` scene): pick a topic, page through its
//! approved photos one at a time, rate (once per photo) and comment.

use domains::{
    DomainError, DomainResult, EventPayload, GalleryScratch, InboundEvent, RateValue, SceneScratch,
    View,
};
use tracing::info;
use uuid::Uuid;

use super::{Flow, StepCtx};

const STEP_TOPIC: usize = 0;
const STEP_BROWSE: usize = 1;
const STEP_COMMENT: usize = 2;

const PER_PAGE: u32 = 1;

fn bag<'s>(ctx: &'s mut StepCtx<'_>) -> DomainResult<&'s mut GalleryScratch> {
    match &mut ctx.session.scratch {
        SceneScratch::Gallery(bag) => Ok(bag),
        _ => Err(DomainError::invariant("gallery scratch bag missing")),
    }
}

pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    let topics = ctx.records.get_topics().await?;
    if topics.is_empty() {
        ctx.say(View::TopicUnavailable).await?;
        return Ok(Flow::Leave);
    }
    ctx.say(View::TopicList { topics }).await?;
    ctx.session.cursor = STEP_TOPIC;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match ctx.session.cursor {
        STEP_TOPIC => pick_topic(ctx, event).await,
        STEP_BROWSE => browse(ctx, event).await,
        STEP_COMMENT => collect_comment(ctx, event).await,
        other => Err(DomainError::invariant(format!(
            "gallery scene has no step {other}"
        ))),
    }
}

async fn pick_topic(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let topic_id = match event.payload.callback_parts() {
        Some(("topic", Some(raw))) => Uuid::parse_str(raw).ok(),
        Some(("cancel", None)) => return Ok(Flow::Leave),
        _ => None,
    };
    let Some(topic_id) = topic_id else {
        let topics = ctx.records.get_topics().await?;
        ctx.say(View::TopicList { topics }).await?;
        return Ok(Flow::Continue);
    };

    // First render computes and stores the real page count.
    let (photos, total_pages) = ctx
        .records
        .get_approved_photos(topic_id, 1, PER_PAGE)
        .await?;
    if photos.is_empty() {
        ctx.say(View::GalleryEmpty).await?;
        return Ok(Flow::Continue);
    }
    bag(ctx)?.topic_id = Some(topic_id);
    ctx.session.navigation.set_total(total_pages);
    ctx.session.cursor = STEP_BROWSE;
    show_current(ctx).await?;
    Ok(Flow::Continue)
}

async fn browse(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("page", Some("prev"))) => {
            if ctx.session.navigation.prev() {
                show_current(ctx).await?;
            }
            Ok(Flow::Continue)
        }
        Some(("page", Some("next"))) => {
            if ctx.session.navigation.next() {
                show_current(ctx).await?;
            }
            Ok(Flow::Continue)
        }
        Some(("rate", Some(raw))) => rate_current(ctx, raw).await,
        Some(("comment", None)) => {
            let photo_id = bag(ctx)?
                .current_photo
                .ok_or_else(|| DomainError::invariant("comment requested with no photo shown"))?;
            bag(ctx)?.awaiting_comment_for = Some(photo_id);
            ctx.session.cursor = STEP_COMMENT;
            ctx.say(View::AskComment).await?;
            Ok(Flow::Continue)
        }
        Some(("cancel", None)) => Ok(Flow::Leave),
        _ => Ok(Flow::Continue),
    }
}

async fn rate_current(ctx: &mut StepCtx<'_>, raw: &str) -> DomainResult<Flow> {
    let value = raw
        .parse::<i16>()
        .ok()
        .and_then(RateValue::from_i16)
        .ok_or_else(|| DomainError::validation(format!("rate value {raw} out of range")))?;
    let photo_id = bag(ctx)?
        .current_photo
        .ok_or_else(|| DomainError::invariant("rate requested with no photo shown"))?;
    let user_id = ctx.snapshot()?.user_id;

    match ctx.records.create_rate(user_id, photo_id, value).await {
        Ok(rate) => {
            info!(photo = %photo_id, user = %user_id, value = rate.value.as_i16(), "rate saved");
            ctx.say(View::RateSaved { value }).await?;
        }
        // Once per photo; the second attempt is a user-visible rejection,
        // not a fault.
        Err(DomainError::Precondition(_)) => {
            ctx.say(View::AlreadyRated).await?;
        }
        Err(err) => return Err(err),
    }
    Ok(Flow::Continue)
}

async fn collect_comment(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    if let Some(("cancel", None)) = event.payload.callback_parts() {
        bag(ctx)?.awaiting_comment_for = None;
        ctx.session.cursor = STEP_BROWSE;
        return Ok(Flow::Continue);
    }
    let EventPayload::Text(text) = &event.payload else {
        ctx.say(View::AskComment).await?;
        return Ok(Flow::Continue);
    };
    let text = text.trim();
    if text.is_empty() {
        ctx.say(View::AskComment).await?;
        return Ok(Flow::Continue);
    }

    let photo_id = bag(ctx)?
        .awaiting_comment_for
        .take()
        .ok_or_else(|| DomainError::invariant("comment text arrived with no target photo"))?;
    let user_id = ctx.snapshot()?.user_id;
    let message_ref = event.message_ref.unwrap_or_default();
    let comment = ctx
        .records
        .create_comment(user_id, photo_id, message_ref, text)
        .await?;
    info!(comment = %comment.id, photo = %photo_id, user = %user_id, "comment saved");
    ctx.session.cursor = STEP_BROWSE;
    ctx.say(View::CommentSaved).await?;
    Ok(Flow::Continue)
}

/// Fetches and renders the photo for the current page, editing the
/// previous gallery message in place when the transport allows it.
async fn show_current(ctx: &mut StepCtx<'_>) -> DomainResult<()> {
    let topic_id = bag(ctx)?
        .topic_id
        .ok_or_else(|| DomainError::invariant("gallery browsing without a topic"))?;
    let mut page = ctx.session.navigation.current_page;
    let (mut photos, mut total_pages) = ctx
        .records
        .get_approved_photos(topic_id, page, PER_PAGE)
        .await?;
    ctx.session.navigation.rebase_total(total_pages);
    if ctx.session.navigation.current_page != page {
        // The approved set shrank since the last render; land on the
        // new last page instead of pointing past the end.
        page = ctx.session.navigation.current_page;
        (photos, total_pages) = ctx
            .records
            .get_approved_photos(topic_id, page, PER_PAGE)
            .await?;
    }

    let Some(photo) = photos.into_iter().next() else {
        return ctx.say(View::GalleryEmpty).await;
    };
    bag(ctx)?.current_photo = Some(photo.id);

    let author_nick = ctx
        .records
        .get_user_profile(photo.user_id)
        .await?
        .and_then(|author| author.nick)
        .unwrap_or_default();
    let (rating_count, rating_avg) = ctx.records.rating_summary(photo.id).await?;

    ctx.refresh(View::GalleryPhoto {
        photo,
        author_nick,
        rating_count,
        rating_avg,
        page,
        total_pages,
    })
    .await
}
