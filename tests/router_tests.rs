use axum::response::IntoResponse;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use toh_heroes::orm::Db;
use toh_heroes::router::*;
use toh_heroes::settings::Settings;

async fn state() -> AppState {
    let db = Arc::new(Db::connect(":memory:").await.unwrap());
    AppState::new(db, Settings::default())
}

fn echo_param(key: &'static str) -> Handler {
    Arc::new(move |ctx: RequestContext, _state: AppState| {
        Box::pin(async move {
            let value = ctx.param(key).unwrap_or("nobody").to_string();
            Response::ok(value)
        }) as Pin<Box<dyn Future<Output = Response> + Send>>
    })
}

// ========== Response struct ==========

#[test]
fn test_response_ok() {
    let resp = Response::ok("hello world");
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body, "hello world");
    assert!(resp.headers.is_empty());
}

#[test]
fn test_response_no_content_and_not_found() {
    let resp = Response::no_content();
    assert_eq!(resp.status_code, 204);
    assert!(resp.body.is_empty());

    let resp = Response::not_found();
    assert_eq!(resp.status_code, 404);
    assert!(resp.body.contains("404"));
}

#[test]
fn test_response_json_success() {
    let mut headers = HashMap::new();
    headers.insert("X-Test".into(), "yes".into());
    let resp = Response::json(json!({"foo": "bar"}), 201, headers);
    assert_eq!(resp.status_code, 201);
    assert_eq!(
        resp.headers.get("Content-Type").unwrap(),
        "application/json; charset=utf-8"
    );
    assert_eq!(resp.headers.get("X-Test").unwrap(), "yes");
    assert!(resp.body.contains("\"foo\":\"bar\""));
}

#[test]
fn test_response_error_body() {
    let resp = Response::error(409, "hero 3 was modified concurrently");
    assert_eq!(resp.status_code, 409);
    let body: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(body, json!({"error": "hero 3 was modified concurrently"}));
}

use serde::{Serialize, Serializer};

struct AlwaysFailsSerialize;

impl Serialize for AlwaysFailsSerialize {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Err(serde::ser::Error::custom("Forced failure"))
    }
}

#[test]
fn test_response_json_error_branch_always_fails() {
    let mut headers = HashMap::new();
    headers.insert("Test-Head".to_string(), "Y".to_string());
    let resp = Response::json(AlwaysFailsSerialize, 200, headers);
    assert_eq!(resp.status_code, 500);
    assert!(resp.body.contains("Serialization failed"));
    assert_eq!(resp.headers.get("Test-Head").unwrap(), "Y");
}

#[test]
fn test_into_axum_response_keeps_status_and_headers() {
    let resp = Response::no_content()
        .with_header("Location", "/api/tohHeroes/hero/1")
        .into_response();
    assert_eq!(resp.status().as_u16(), 204);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "/api/tohHeroes/hero/1"
    );
}

#[test]
fn test_status_text_variants() {
    assert_eq!(status_text(200), "OK");
    assert_eq!(status_text(201), "Created");
    assert_eq!(status_text(204), "No Content");
    assert_eq!(status_text(400), "Bad Request");
    assert_eq!(status_text(404), "Not Found");
    assert_eq!(status_text(409), "Conflict");
    assert_eq!(status_text(590), "Unknown");
}

#[test]
fn test_axum_path_conversion() {
    assert_eq!(axum_path("/api/tohHeroes"), "/api/tohHeroes");
    assert_eq!(axum_path("/api/tohHeroes/hero/:id"), "/api/tohHeroes/hero/{id}");
    assert_eq!(axum_path("/items/:type/:id"), "/items/{type}/{id}");
}

// ========== Routing and middleware ==========

#[test]
fn test_find_route_matches_method_and_pattern() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/hero/:id", echo_param("id"), vec![]);
    router.add_route(Method::DELETE, "/hero/:id", echo_param("id"), vec![]);

    assert!(router.find_route(&Method::GET, "/hero/:id").is_some());
    assert!(router.find_route(&Method::DELETE, "/hero/:id").is_some());
    assert!(router.find_route(&Method::PUT, "/hero/:id").is_none());
    assert!(router.find_route(&Method::GET, "/heroes").is_none());
}

#[tokio::test]
async fn test_dispatch_runs_handler_with_params() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/user/:id", echo_param("id"), vec![]);
    let route = router.find_route(&Method::GET, "/user/:id").unwrap();

    let ctx = RequestContext::new(Method::GET, "/user/314").with_param("id", "314");
    let resp = router.dispatch(route, ctx, state().await).await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body, "314");
}

#[tokio::test]
async fn test_pre_middleware_short_circuits_and_post_middleware_still_runs() {
    let mut router = Router::new();
    router.add_middleware(Arc::new(|ctx: &mut RequestContext| -> Option<Response> {
        if ctx.path == "/blocked" {
            Some(Response::error(403, "block"))
        } else {
            None
        }
    }));
    router.add_post_middleware(Arc::new(|_ctx: &RequestContext, resp: Response| {
        resp.with_header("X-Post", "1")
    }));
    router.add_route(Method::GET, "/blocked", echo_param("id"), vec![]);
    router.add_route(Method::GET, "/open", echo_param("id"), vec![]);

    let blocked = router.find_route(&Method::GET, "/blocked").unwrap();
    let resp = router
        .dispatch(blocked, RequestContext::new(Method::GET, "/blocked"), state().await)
        .await;
    assert_eq!(resp.status_code, 403);
    assert_eq!(resp.headers.get("X-Post").unwrap(), "1");

    let open = router.find_route(&Method::GET, "/open").unwrap();
    let resp = router
        .dispatch(open, RequestContext::new(Method::GET, "/open"), state().await)
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body, "nobody");
    assert_eq!(resp.headers.get("X-Post").unwrap(), "1");
}

#[tokio::test]
async fn test_post_middleware_chain_order() {
    let mut router = Router::new();
    router.add_route(Method::GET, "/a", echo_param("x"), vec![]);
    router.add_post_middleware(Arc::new(|_ctx: &RequestContext, mut r: Response| {
        r.body.push('1');
        r
    }));
    router.add_post_middleware(Arc::new(|_ctx: &RequestContext, mut r: Response| {
        r.body.push('2');
        r
    }));

    let route = router.find_route(&Method::GET, "/a").unwrap();
    let resp = router
        .dispatch(route, RequestContext::new(Method::GET, "/a"), state().await)
        .await;
    assert_eq!(resp.body, "nobody12");
}

#[tokio::test]
async fn test_route_middleware_can_modify_params() {
    let mut router = Router::new();
    router.add_route(
        Method::GET,
        "/hi/:who",
        echo_param("who"),
        vec![Arc::new(|ctx: &mut RequestContext| -> Option<Response> {
            ctx.params
                .insert("who".to_string(), "overridden".to_string());
            None
        }) as Middleware],
    );

    let route = router.find_route(&Method::GET, "/hi/:who").unwrap();
    let ctx = RequestContext::new(Method::GET, "/hi/tomato").with_param("who", "tomato");
    let resp = router.dispatch(route, ctx, state().await).await;
    assert_eq!(resp.body, "overridden");
}

#[tokio::test]
async fn test_request_timer_and_cors_middleware() {
    let mut router = Router::new();
    router.add_middleware(request_timer());
    router.add_middleware(Arc::new(|ctx: &mut RequestContext| -> Option<Response> {
        assert!(ctx.start_time.is_some());
        None
    }));
    router.add_post_middleware(cors(&Settings::default().cors));
    router.add_post_middleware(access_log());
    router.add_route(Method::OPTIONS, "/", echo_param("x"), vec![]);

    let route = router.find_route(&Method::OPTIONS, "/").unwrap();
    let resp = router
        .dispatch(route, RequestContext::new(Method::OPTIONS, "/"), state().await)
        .await;
    assert_eq!(resp.headers.get("Access-Control-Allow-Origin").unwrap(), "*");
    assert!(
        resp.headers
            .get("Access-Control-Allow-Methods")
            .unwrap()
            .contains("PUT")
    );
}

#[test]
fn test_unrouted_responses_get_post_middleware() {
    let mut router = Router::new();
    router.add_middleware(request_timer());
    router.add_post_middleware(cors(&Settings::default().cors));

    let resp = router.unrouted(
        RequestContext::new(Method::PATCH, "/hero/1"),
        Response::error(405, status_text(405)),
    );
    assert_eq!(resp.status_code, 405);
    assert_eq!(resp.headers.get("Access-Control-Allow-Origin").unwrap(), "*");

    let resp = router.unrouted(RequestContext::new(Method::GET, "/nowhere"), Response::not_found());
    assert_eq!(resp.status_code, 404);
    assert_eq!(resp.headers.get("Access-Control-Allow-Origin").unwrap(), "*");
}

async fn hello(_ctx: RequestContext, _state: AppState) -> Response {
    Response::ok("hello")
}

#[test]
fn test_route_macro_registers_methods() {
    let mut router = Router::new();
    toh_heroes::route!(router,
        GET "/greet" => { hello },
        POST "/greet" => { hello, request_timer() },
    );
    assert_eq!(router.routes.len(), 2);
    assert_eq!(router.routes[0].method, Method::GET);
    assert_eq!(router.routes[1].method, Method::POST);
    assert_eq!(router.routes[1].middlewares.len(), 1);
    assert_eq!(router.routes[1].path_pattern, "/greet");
}

// ========== Settings ==========

#[test]
fn test_settings_from_vars() {
    let vars = vec![
        ("TOH_HOST".to_string(), "0.0.0.0".to_string()),
        ("TOH_PORT".to_string(), "9090".to_string()),
        ("TOH_DEBUG".to_string(), "true".to_string()),
        ("TOH_DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
        ("TOH_CORS_ORIGIN".to_string(), "http://localhost:4200".to_string()),
        ("TOH_THEME".to_string(), "dark".to_string()),
        ("PATH".to_string(), "/usr/bin".to_string()),
    ];
    let settings = Settings::from_vars(vars);
    assert_eq!(settings.bind_addr(), "0.0.0.0:9090");
    assert!(settings.debug);
    assert_eq!(settings.database_url, "sqlite::memory:");
    assert_eq!(settings.cors.allow_origin, "http://localhost:4200");
    assert_eq!(settings.other.get("theme").unwrap(), "dark");
    assert_eq!(settings.other.len(), 1);
}

#[test]
fn test_settings_keep_defaults_on_bad_values() {
    let settings = Settings::from_vars(vec![
        ("TOH_PORT".to_string(), "eighty".to_string()),
        ("TOH_DEBUG".to_string(), "maybe".to_string()),
    ]);
    assert_eq!(settings.port, 8080);
    assert!(!settings.debug);
}
