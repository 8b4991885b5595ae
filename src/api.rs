//! HTTP handlers for `/api/tohHeroes`.

use crate::error::ApiError;
use crate::hero::HeroDraft;
use crate::route;
use crate::router::{AppState, RequestContext, Response, Router, access_log, cors, request_timer};
use crate::settings::Settings;
use std::collections::HashMap;

pub const API_BASE: &str = "/api/tohHeroes";

/// Register every hero route plus the timing, access-log and CORS middleware.
pub fn register(router: &mut Router, settings: &Settings) {
    let hero = format!("{API_BASE}/hero/:id");
    let search = format!("{API_BASE}/search/:term");

    router.add_middleware(request_timer());
    router.add_post_middleware(cors(&settings.cors));
    router.add_post_middleware(access_log());

    route!(router,
        GET API_BASE => { list_heroes },
        POST API_BASE => { create_hero },
        OPTIONS API_BASE => { preflight },
        GET search.as_str() => { search_heroes },
        OPTIONS search.as_str() => { preflight },
        GET hero.as_str() => { get_hero },
        PUT hero.as_str() => { update_hero },
        DELETE hero.as_str() => { delete_hero },
        OPTIONS hero.as_str() => { preflight },
    );
}

fn respond(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|err| {
        if let ApiError::Database(e) = &err {
            log::error!("Unhandled database failure: {}", e);
        }
        Response::error(err.status_code(), err.to_string())
    })
}

fn path_id(ctx: &RequestContext) -> Result<i64, ApiError> {
    let raw = ctx.param("id").unwrap_or_default();
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid hero id {:?}", raw)))
}

fn body_draft(ctx: &RequestContext) -> Result<HeroDraft, ApiError> {
    serde_json::from_slice(&ctx.body)
        .map_err(|e| ApiError::BadRequest(format!("invalid hero body: {}", e)))
}

pub async fn list_heroes(_ctx: RequestContext, state: AppState) -> Response {
    respond(list(&state).await)
}

pub async fn search_heroes(ctx: RequestContext, state: AppState) -> Response {
    respond(search(&ctx, &state).await)
}

pub async fn get_hero(ctx: RequestContext, state: AppState) -> Response {
    respond(get(&ctx, &state).await)
}

pub async fn create_hero(ctx: RequestContext, state: AppState) -> Response {
    respond(create(&ctx, &state).await)
}

pub async fn update_hero(ctx: RequestContext, state: AppState) -> Response {
    respond(update(&ctx, &state).await)
}

pub async fn delete_hero(ctx: RequestContext, state: AppState) -> Response {
    respond(delete(&ctx, &state).await)
}

/// CORS preflight; the CORS post-middleware adds the headers.
pub async fn preflight(_ctx: RequestContext, _state: AppState) -> Response {
    Response::no_content()
}

async fn list(state: &AppState) -> Result<Response, ApiError> {
    let heroes = state.heroes.list().await?;
    Ok(Response::json(heroes, 200, HashMap::new()))
}

async fn search(ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    let term = ctx.param("term").unwrap_or_default();
    let heroes = state.heroes.search(term).await?;
    Ok(Response::json(heroes, 200, HashMap::new()))
}

async fn get(ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    let hero = state.heroes.get(path_id(ctx)?).await?;
    Ok(Response::json(hero, 200, HashMap::new()))
}

async fn create(ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    let draft = body_draft(ctx)?;
    let hero = state.heroes.create(&draft).await?;
    let location = format!("{API_BASE}/hero/{}", hero.id);
    Ok(Response::json(
        hero,
        201,
        HashMap::from([("Location".to_string(), location)]),
    ))
}

// The body id must name the same row as the path.
async fn update(ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    let id = path_id(ctx)?;
    let draft = body_draft(ctx)?;
    if draft.id != Some(id) {
        return Err(ApiError::BadRequest(format!(
            "path id {} does not match body id {:?}",
            id, draft.id
        )));
    }
    state.heroes.update(id, &draft.name, draft.version).await?;
    Ok(Response::no_content())
}

async fn delete(ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    state.heroes.delete(path_id(ctx)?).await?;
    Ok(Response::no_content())
}
