//! Single-step avatar change. Commit happens directly on the incoming
//! image; there is no partial state to stage.

use domains::{DomainResult, EventPayload, InboundEvent, UserSnapshot, View};

use super::{Flow, StepCtx};

/// Guard: allowed for `active` and `penalty` members.
pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    ctx.say(View::AskAvatar).await?;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    if let Some(("cancel", None)) = event.payload.callback_parts() {
        return Ok(Flow::Leave);
    }
    let EventPayload::Image { media_ref } = &event.payload else {
        ctx.say(View::AskAvatar).await?;
        return Ok(Flow::Continue);
    };

    let user_id = ctx.snapshot()?.user_id;
    let user = ctx.records.set_avatar(user_id, media_ref).await?;
    ctx.session.authorize = Some(UserSnapshot::from(&user));
    ctx.say(View::AvatarUpdated).await?;
    Ok(Flow::Leave)
}
