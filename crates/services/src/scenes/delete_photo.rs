//! Own-photo listing with one photo per page and a two-step delete:
//! pick, then confirm. The database transition commits first; removal of
//! the externally posted messages is best-effort afterwards.

use domains::{
    DeletePhotoScratch, DomainError, DomainResult, InboundEvent, Photo, SceneScratch, View,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{page_slice, Flow, StepCtx};

const STEP_BROWSE: usize = 0;
const STEP_CONFIRM: usize = 1;

const PER_PAGE: u32 = 1;

fn bag<'s>(ctx: &'s mut StepCtx<'_>) -> DomainResult<&'s mut DeletePhotoScratch> {
    match &mut ctx.session.scratch {
        SceneScratch::DeletePhoto(bag) => Ok(bag),
        _ => Err(DomainError::invariant("delete-photo scratch bag missing")),
    }
}

pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    let photos = fetch_own(ctx).await?;
    if photos.is_empty() {
        ctx.say(View::NoPhotos).await?;
        return Ok(Flow::Leave);
    }
    ctx.session.navigation.set_total(super::page_count(photos.len(), PER_PAGE));
    show_page(ctx, &photos).await?;
    ctx.session.cursor = STEP_BROWSE;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match ctx.session.cursor {
        STEP_BROWSE => browse(ctx, event).await,
        STEP_CONFIRM => confirm(ctx, event).await,
        other => Err(DomainError::invariant(format!(
            "delete-photo scene has no step {other}"
        ))),
    }
}

async fn browse(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("page", Some("prev"))) => {
            if ctx.session.navigation.prev() {
                let photos = fetch_own(ctx).await?;
                show_page(ctx, &photos).await?;
            }
            Ok(Flow::Continue)
        }
        Some(("page", Some("next"))) => {
            if ctx.session.navigation.next() {
                let photos = fetch_own(ctx).await?;
                show_page(ctx, &photos).await?;
            }
            Ok(Flow::Continue)
        }
        Some(("delete", Some(raw))) => {
            let Ok(photo_id) = Uuid::parse_str(raw) else {
                return Ok(Flow::Continue);
            };
            bag(ctx)?.pending = Some(photo_id);
            ctx.session.cursor = STEP_CONFIRM;
            ctx.say(View::ConfirmDelete { photo_id }).await?;
            Ok(Flow::Continue)
        }
        Some(("cancel", None)) => Ok(Flow::Leave),
        _ => Ok(Flow::Continue),
    }
}

async fn confirm(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("confirm", None)) => {}
        Some(("cancel", None)) => {
            // Back to the listing; the pick is discarded.
            bag(ctx)?.pending = None;
            ctx.session.cursor = STEP_BROWSE;
            let photos = fetch_own(ctx).await?;
            if photos.is_empty() {
                ctx.say(View::NoPhotos).await?;
                return Ok(Flow::Leave);
            }
            show_page(ctx, &photos).await?;
            return Ok(Flow::Continue);
        }
        _ => return Ok(Flow::Continue),
    }

    let photo_id = bag(ctx)?
        .pending
        .take()
        .ok_or_else(|| DomainError::invariant("delete confirmation without a picked photo"))?;
    let user_id = ctx.snapshot()?.user_id;
    let photo = ctx.records.delete_photo(user_id, photo_id).await?;
    info!(photo = %photo.id, user = %user_id, "photo soft-removed");

    // Best-effort cleanup of the posted copies; failures are logged and
    // never roll back the transition above.
    for posted in [photo.moderation_post, photo.channel_post].into_iter().flatten() {
        if let Err(err) = ctx.gateway.remove(posted.chat_ref, posted.message_ref).await {
            warn!(
                photo = %photo.id,
                chat = posted.chat_ref,
                message = posted.message_ref,
                error = %err,
                "posted message removal failed"
            );
        }
    }

    ctx.say(View::PhotoDeleted).await?;
    Ok(Flow::Leave)
}

async fn fetch_own(ctx: &StepCtx<'_>) -> DomainResult<Vec<Photo>> {
    let user_id = ctx.snapshot()?.user_id;
    ctx.records.get_photos_for_user(user_id).await
}

async fn show_page(ctx: &mut StepCtx<'_>, photos: &[Photo]) -> DomainResult<()> {
    let page = ctx.session.navigation.current_page;
    let total_pages = ctx.session.navigation.total_pages;
    let view = View::MyPhotos {
        photos: page_slice(photos, page, PER_PAGE),
        page,
        total_pages,
    };
    ctx.refresh(view).await
}
