//! Photo submission wizard: topic, photo, description, then confirm.
//!
//! The quota is checked read-only at scene entry, so a limited user never
//! reaches the photo-collecting step, and consumed as an atomic
//! reservation in the final step right before the insert.

use domains::{
    DomainError, DomainResult, EventPayload, InboundEvent, NewPhotoScratch, SceneScratch,
    TopicStatus, UserStatus, View,
};
use tracing::info;
use uuid::Uuid;

use super::{Flow, StepCtx};

const STEP_TOPIC: usize = 0;
const STEP_PHOTO: usize = 1;
const STEP_DESCRIPTION: usize = 2;
const STEP_CONFIRM: usize = 3;

const DESCRIPTION_MAX: usize = 300;

fn bag<'s>(ctx: &'s mut StepCtx<'_>) -> DomainResult<&'s mut NewPhotoScratch> {
    match &mut ctx.session.scratch {
        SceneScratch::NewPhoto(bag) => Ok(bag),
        _ => Err(DomainError::invariant("new-photo scratch bag missing")),
    }
}

/// Guard: submissions require full `active` status and headroom in the
/// rolling daily quota.
pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    let snapshot = ctx.snapshot()?;
    if snapshot.status != UserStatus::Active {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }

    let reset_ms = ctx.quota.check(snapshot.user_id).await?;
    if reset_ms > 0 {
        ctx.say(View::QuotaExceeded { reset_ms }).await?;
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
        STEP_PHOTO => collect_photo(ctx, event).await,
        STEP_DESCRIPTION => collect_description(ctx, event).await,
        STEP_CONFIRM => confirm(ctx, event).await,
        other => Err(DomainError::invariant(format!(
            "new-photo wizard has no step {other}"
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

    match ctx.records.get_topic(topic_id).await? {
        Some(topic) if topic.status == TopicStatus::Available => {
            bag(ctx)?.topic_id = Some(topic.id);
            ctx.session.cursor = STEP_PHOTO;
            ctx.say(View::AskPhoto).await?;
            Ok(Flow::Continue)
        }
        _ => {
            ctx.say(View::TopicUnavailable).await?;
            Ok(Flow::Continue)
        }
    }
}

async fn collect_photo(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let EventPayload::Image { media_ref } = &event.payload else {
        ctx.say(View::AskPhoto).await?;
        return Ok(Flow::Continue);
    };
    bag(ctx)?.media_ref = Some(media_ref.clone());
    ctx.session.cursor = STEP_DESCRIPTION;
    ctx.say(View::AskDescription).await?;
    Ok(Flow::Continue)
}

async fn collect_description(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let EventPayload::Text(raw) = &event.payload else {
        ctx.say(View::AskDescription).await?;
        return Ok(Flow::Continue);
    };
    let description = raw.trim();
    if description.is_empty() || description.chars().count() > DESCRIPTION_MAX {
        ctx.say(View::AskDescription).await?;
        return Ok(Flow::Continue);
    }
    let bag = bag(ctx)?;
    bag.description = Some(description.to_string());
    let topic_id = bag
        .topic_id
        .ok_or_else(|| DomainError::invariant("new-photo bag lost its topic"))?;
    let description = description.to_string();

    let topic = ctx
        .records
        .get_topic(topic_id)
        .await?
        .ok_or(DomainError::NotFound("Topic", topic_id.to_string()))?;
    ctx.session.cursor = STEP_CONFIRM;
    ctx.say(View::ConfirmPhoto {
        topic_name: topic.name,
        description,
    })
    .await?;
    Ok(Flow::Continue)
}

/// Final step: quota reservation, then the one durable commit.
async fn confirm(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("confirm", None)) => {}
        Some(("cancel", None)) => return Ok(Flow::Leave),
        _ => return Ok(Flow::Continue),
    }

    let (topic_id, media_ref, description) = {
        let bag = bag(ctx)?;
        match (bag.topic_id.take(), bag.media_ref.take(), bag.description.take()) {
            (Some(topic_id), Some(media_ref), Some(description)) => {
                (topic_id, media_ref, description)
            }
            _ => {
                return Err(DomainError::invariant(
                    "new-photo scratch bag incomplete at commit",
                ))
            }
        }
    };

    let user_id = ctx.snapshot()?.user_id;

    // A nonzero return means the reservation was not granted; the gated
    // side effect must not run.
    let reset_ms = ctx.quota.consume(user_id).await?;
    if reset_ms > 0 {
        ctx.say(View::QuotaExceeded { reset_ms }).await?;
        return Ok(Flow::Leave);
    }

    let photo = ctx
        .records
        .create_photo(user_id, topic_id, &media_ref, &description)
        .await?;
    info!(photo = %photo.id, user = %user_id, topic = %topic_id, "photo queued for moderation");
    ctx.say(View::PhotoQueued).await?;
    Ok(Flow::Leave)
}
