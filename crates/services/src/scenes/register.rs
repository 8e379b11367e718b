//! Registration wizard: nick, gender, avatar, about, then confirm.
//!
//! The final step performs the single durable commit (`activate_user`);
//! everything before it only fills the scratch bag.

use domains::{
    validate, DomainError, DomainResult, EventPayload, Gender, InboundEvent, RegisterScratch,
    SceneScratch, UserSnapshot, UserStatus, View,
};
use tracing::info;

use super::{Flow, StepCtx};

const STEP_NICK: usize = 0;
const STEP_GENDER: usize = 1;
const STEP_AVATAR: usize = 2;
const STEP_ABOUT: usize = 3;
const STEP_CONFIRM: usize = 4;

fn bag<'s>(ctx: &'s mut StepCtx<'_>) -> DomainResult<&'s mut RegisterScratch> {
    match &mut ctx.session.scratch {
        SceneScratch::Register(bag) => Ok(bag),
        _ => Err(DomainError::invariant("register scratch bag missing")),
    }
}

/// Guard: registration is not re-enterable once the user left `register`
/// status.
pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if ctx.snapshot()?.status != UserStatus::Register {
        return Ok(Flow::Leave);
    }
    ctx.say(View::AskNick).await?;
    ctx.session.cursor = STEP_NICK;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match ctx.session.cursor {
        STEP_NICK => collect_nick(ctx, event).await,
        STEP_GENDER => collect_gender(ctx, event).await,
        STEP_AVATAR => collect_avatar(ctx, event).await,
        STEP_ABOUT => collect_about(ctx, event).await,
        STEP_CONFIRM => confirm(ctx, event).await,
        other => Err(DomainError::invariant(format!(
            "register wizard has no step {other}"
        ))),
    }
}

async fn collect_nick(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let EventPayload::Text(raw) = &event.payload else {
        ctx.say(View::AskNick).await?;
        return Ok(Flow::Continue);
    };
    let nick = match validate::normalize_nick(raw) {
        Ok(nick) => nick,
        Err(DomainError::Validation(reason)) => {
            ctx.say(View::NickRejected { reason }).await?;
            return Ok(Flow::Continue);
        }
        Err(err) => return Err(err),
    };
    if ctx.records.is_nick_taken(&nick).await? {
        ctx.say(View::NickTaken { nick }).await?;
        return Ok(Flow::Continue);
    }
    bag(ctx)?.nick = Some(nick);
    ctx.session.cursor = STEP_GENDER;
    ctx.say(View::AskGender).await?;
    Ok(Flow::Continue)
}

async fn collect_gender(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let gender = match event.payload.callback_parts() {
        Some(("gender", Some(raw))) => Gender::parse(raw),
        _ => None,
    };
    let Some(gender) = gender else {
        ctx.say(View::AskGender).await?;
        return Ok(Flow::Continue);
    };
    bag(ctx)?.gender = Some(gender);
    ctx.session.cursor = STEP_AVATAR;
    ctx.say(View::AskAvatar).await?;
    Ok(Flow::Continue)
}

async fn collect_avatar(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    let EventPayload::Image { media_ref } = &event.payload else {
        ctx.say(View::AskAvatar).await?;
        return Ok(Flow::Continue);
    };
    bag(ctx)?.avatar_ref = Some(media_ref.clone());
    ctx.session.cursor = STEP_ABOUT;
    ctx.say(View::AskAbout).await?;
    Ok(Flow::Continue)
}

async fn collect_about(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
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
    let bag = bag(ctx)?;
    bag.about = Some(about);
    let (nick, gender, about) = (
        bag.nick.clone(),
        bag.gender,
        bag.about.clone(),
    );
    ctx.session.cursor = STEP_CONFIRM;
    match (nick, gender, about) {
        (Some(nick), Some(gender), Some(about)) => {
            ctx.say(View::ConfirmRegistration { nick, gender, about }).await?;
            Ok(Flow::Continue)
        }
        _ => Err(DomainError::invariant(
            "register scratch bag incomplete before confirmation",
        )),
    }
}

/// The single durable commit. An incomplete bag here is an unrecoverable
/// invariant violation; partial data is never written.
async fn confirm(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("confirm", None)) => {}
        Some(("cancel", None)) => return Ok(Flow::Leave),
        _ => {
            let bag = bag(ctx)?;
            match (bag.nick.clone(), bag.gender, bag.about.clone()) {
                (Some(nick), Some(gender), Some(about)) => {
                    ctx.say(View::ConfirmRegistration { nick, gender, about }).await?;
                }
                _ => {
                    return Err(DomainError::invariant(
                        "register scratch bag incomplete at re-prompt",
                    ))
                }
            }
            return Ok(Flow::Continue);
        }
    }

    let activation = {
        let bag = bag(ctx)?;
        match (
            bag.nick.take(),
            bag.gender.take(),
            bag.avatar_ref.take(),
            bag.about.take(),
        ) {
            (Some(nick), Some(gender), Some(avatar_ref), Some(about)) => domains::ActivationData {
                nick,
                gender,
                avatar_ref,
                about,
            },
            _ => {
                return Err(DomainError::invariant(
                    "register scratch bag incomplete at commit",
                ))
            }
        }
    };

    let user_id = ctx.snapshot()?.user_id;
    let user = ctx.records.activate_user(user_id, activation).await?;
    info!(user = %user.id, nick = ?user.nick, "member activated");
    ctx.session.authorize = Some(UserSnapshot::from(&user));
    ctx.say(View::RegistrationDone {
        nick: user.nick.clone().unwrap_or_default(),
    })
    .await?;
    Ok(Flow::Leave)
}
