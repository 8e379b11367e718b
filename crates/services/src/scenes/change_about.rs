//! Single-step bio change, mirroring `change_avatar`.

use domains::{validate, DomainError, DomainResult, EventPayload, InboundEvent, UserSnapshot, View};

use super::{Flow, StepCtx};

/// Guard: allowed for `active` and `penalty` members.
pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    ctx.say(View::AskAbout).await?;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    if let Some(("cancel", None)) = event.payload.callback_parts() {
        return Ok(Flow::Leave);
    }
    let EventPayload::Text(raw) = &event.payload else {
        ctx.say(View::AskAbout).await?;
        return Ok(Flow::Continue);
    };
    let about = match validate::validate_about(raw) {
        Ok(about) => about,
        Err(DomainError::Validation(reason)) => {
            ctx.say(View::AboutRejected { reason }).await?;
            return Ok(Flow::Continue);
        }
        Err(err) => return Err(err),
    };

    let user_id = ctx.snapshot()?.user_id;
    let user = ctx.records.set_about(user_id, &about).await?;
    ctx.session.authorize = Some(UserSnapshot::from(&user));
    ctx.say(View::AboutUpdated).await?;
    Ok(Flow::Leave)
}
