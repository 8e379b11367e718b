//! Simple profile scene: one entry render plus named action handlers that
//! hand off to the editing scenes. No step cursor.

use domains::{DomainError, DomainResult, InboundEvent, SceneName, View};

use super::{Flow, StepCtx};

pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    show(ctx).await?;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("profile", Some("avatar"))) => Ok(Flow::Switch(SceneName::ChangeAvatar)),
        Some(("profile", Some("about"))) => Ok(Flow::Switch(SceneName::ChangeAbout)),
        Some(("profile", Some("photos"))) => Ok(Flow::Switch(SceneName::DeletePhoto)),
        Some(("cancel", None)) | Some(("menu", None)) => Ok(Flow::Leave),
        _ => {
            show(ctx).await?;
            Ok(Flow::Continue)
        }
    }
}

async fn show(ctx: &mut StepCtx<'_>) -> DomainResult<()> {
    let user_id = ctx.snapshot()?.user_id;
    let user = ctx
        .records
        .get_user_profile(user_id)
        .await?
        .ok_or_else(|| DomainError::invariant("authorized user has no profile row"))?;
    let photo_count = ctx.records.get_photos_for_user(user_id).await?.len() as u64;
    ctx.say(View::Profile { user, photo_count }).await
}
