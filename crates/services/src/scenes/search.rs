//! Nick search: one text prompt, then paged results. A new text query
//! from the results page starts a fresh search.

use domains::{
    DomainError, DomainResult, EventPayload, InboundEvent, SceneScratch, SearchScratch, View,
};

use super::{page_count, page_slice, Flow, StepCtx};

const STEP_QUERY: usize = 0;
const STEP_RESULTS: usize = 1;

const PER_PAGE: u32 = 5;

fn bag<'s>(ctx: &'s mut StepCtx<'_>) -> DomainResult<&'s mut SearchScratch> {
    match &mut ctx.session.scratch {
        SceneScratch::Search(bag) => Ok(bag),
        _ => Err(DomainError::invariant("search scratch bag missing")),
    }
}

pub async fn enter(ctx: &mut StepCtx<'_>) -> DomainResult<Flow> {
    if !ctx.snapshot()?.status.can_participate() {
        ctx.say(View::NotAllowed).await?;
        return Ok(Flow::Leave);
    }
    ctx.say(View::AskSearchNick).await?;
    ctx.session.cursor = STEP_QUERY;
    Ok(Flow::Continue)
}

pub async fn handle(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match ctx.session.cursor {
        STEP_QUERY => collect_query(ctx, event).await,
        STEP_RESULTS => page_results(ctx, event).await,
        other => Err(DomainError::invariant(format!(
            "search scene has no step {other}"
        ))),
    }
}

async fn collect_query(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    if let Some(("cancel", None)) = event.payload.callback_parts() {
        return Ok(Flow::Leave);
    }
    let EventPayload::Text(raw) = &event.payload else {
        ctx.say(View::AskSearchNick).await?;
        return Ok(Flow::Continue);
    };
    let query = raw.trim().to_lowercase();
    if query.is_empty() {
        ctx.say(View::AskSearchNick).await?;
        return Ok(Flow::Continue);
    }

    let matches = ctx.records.search_by_nick(&query).await?;
    if matches.is_empty() {
        ctx.say(View::SearchEmpty).await?;
        return Ok(Flow::Continue);
    }

    bag(ctx)?.query = Some(query);
    ctx.session.navigation.reset();
    ctx.session.navigation.set_total(page_count(matches.len(), PER_PAGE));
    ctx.session.cursor = STEP_RESULTS;
    show_page(ctx).await?;
    Ok(Flow::Continue)
}

async fn page_results(ctx: &mut StepCtx<'_>, event: &InboundEvent) -> DomainResult<Flow> {
    match event.payload.callback_parts() {
        Some(("page", Some("prev"))) => {
            if ctx.session.navigation.prev() {
                show_page(ctx).await?;
            }
            return Ok(Flow::Continue);
        }
        Some(("page", Some("next"))) => {
            if ctx.session.navigation.next() {
                show_page(ctx).await?;
            }
            return Ok(Flow::Continue);
        }
        Some(("cancel", None)) => return Ok(Flow::Leave),
        _ => {}
    }

    // Free text on the results page starts a fresh query.
    if matches!(event.payload, EventPayload::Text(_)) {
        ctx.session.cursor = STEP_QUERY;
        return collect_query(ctx, event).await;
    }
    Ok(Flow::Continue)
}

async fn show_page(ctx: &mut StepCtx<'_>) -> DomainResult<()> {
    let query = bag(ctx)?
        .query
        .clone()
        .ok_or_else(|| DomainError::invariant("search results page without a query"))?;
    let matches = ctx.records.search_by_nick(&query).await?;
    // The member set may have changed since the query ran; rebase so the
    // cursor cannot point past the last page.
    ctx.session
        .navigation
        .rebase_total(page_count(matches.len(), PER_PAGE));
    let page = ctx.session.navigation.current_page;
    let total_pages = ctx.session.navigation.total_pages;
    if page == 0 {
        return ctx.say(View::SearchEmpty).await;
    }
    ctx.refresh(View::SearchResults {
        users: page_slice(&matches, page, PER_PAGE),
        page,
        total_pages,
    })
    .await
}
