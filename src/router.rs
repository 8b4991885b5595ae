//! Router module
//!
//! This module provides the routing and HTTP infrastructure for the heroes
//! service. It allows for:
//!
//! - Method and path-parameter based routing of HTTP endpoints
//! - Global and route-specific middleware (pre and post)
//! - Serving the route table over HTTP through axum

use crate::hero::HeroStore;
use crate::orm::Db;
use crate::settings::Settings;
use axum::Router as AxumRouter;
use axum::body::{Body, Bytes};
use axum::extract::Path;
use axum::http::{StatusCode, Uri};
pub use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, MethodRouter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub heroes: HeroStore,
    pub settings: Settings,
}

impl AppState {
    pub fn new(db: Arc<Db>, settings: Settings) -> Self {
        AppState {
            heroes: HeroStore::new(db),
            settings,
        }
    }
}

/// Represents the outcome of an HTTP handler.
/// Supports text, JSON, and custom status/headers.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Construct a new HTTP 200 response with a text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Response {
            status_code: 200,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Construct an HTTP 204 response with no body.
    pub fn no_content() -> Self {
        Response {
            status_code: 204,
            body: String::new(),
            headers: HashMap::new(),
        }
    }

    /// Construct a new HTTP 404 "not found" response.
    pub fn not_found() -> Self {
        Response {
            status_code: 404,
            body: "404 Not Found".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Construct a JSON error response of the form `{"error": message}`.
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Response::json(
            serde_json::json!({ "error": message.into() }),
            status_code,
            HashMap::new(),
        )
    }

    /// Construct a new HTTP JSON response.
    /// Accepts any serde-serializable payload, status, and custom headers.
    pub fn json<T: Serialize>(
        data: T,
        status_code: u16,
        mut headers: HashMap<String, String>,
    ) -> Self {
        headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        match serde_json::to_string(&data) {
            Ok(body) => Response {
                status_code,
                body,
                headers,
            },
            Err(e) => {
                log::error!("Response serialization failed: {}", e);
                Response {
                    status_code: 500,
                    body: "{\"error\": \"Serialization failed\"}".to_string(),
                    headers,
                }
            }
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Maps status codes to HTTP status text, used in access logs.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Holds the current HTTP request: its method, path, extracted path
/// parameters and raw body. Middleware and handlers can modify/read this context.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub body: Bytes,
    pub start_time: Option<Instant>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestContext {
            method,
            path: path.into(),
            params: HashMap::new(),
            body: Bytes::new(),
            start_time: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Type alias for async handler functions for HTTP routes.
/// Accepts the request context and shared state and returns a Response.
pub type Handler = Arc<
    dyn Fn(RequestContext, AppState) -> Pin<Box<dyn Future<Output = Response> + Send>>
        + Send
        + Sync,
>;

/// Type alias for synchronous, pre-processing middleware executed before the handler.
/// If a middleware returns Some(Response), request handling stops and this response is sent.
pub type Middleware = Arc<dyn Fn(&mut RequestContext) -> Option<Response> + Send + Sync>;

/// Type alias for post-processing middleware executed after the handler.
/// Post-middleware can inspect/modify the response before it is sent.
pub type PostMiddleware = Arc<dyn Fn(&RequestContext, Response) -> Response + Send + Sync>;

/// Represents a registered HTTP route and its associated handler + middleware.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path_pattern: String,
    pub handler: Handler,
    pub middlewares: Vec<Middleware>,
}

/// The main application router.
/// Manages all HTTP routes and global middleware.
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
    pub middlewares: Vec<Middleware>,
    pub post_middlewares: Vec<PostMiddleware>,
}

impl Router {
    /// Create a new, empty application router.
    pub fn new() -> Self {
        Router::default()
    }

    /// Register an HTTP route with method, path pattern, handler, and route-specific middleware.
    pub fn add_route(
        &mut self,
        method: Method,
        path_pattern: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        self.routes.push(Route {
            method,
            path_pattern: path_pattern.to_string(),
            handler,
            middlewares,
        });
    }

    /// Add a global pre-middleware to be run before all HTTP handlers.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.push(middleware);
    }

    /// Add a post-middleware to be run after each HTTP handler.
    pub fn add_post_middleware(&mut self, middleware: PostMiddleware) {
        self.post_middlewares.push(middleware);
    }

    /// Find the route registered for `method` and `path_pattern`.
    pub fn find_route(&self, method: &Method, path_pattern: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == *method && r.path_pattern == path_pattern)
    }

    /// Run one matched request through global middleware, route middleware,
    /// the handler, and post-middleware.
    pub async fn dispatch(
        &self,
        route: &Route,
        mut ctx: RequestContext,
        state: AppState,
    ) -> Response {
        for middleware in self.middlewares.iter().chain(&route.middlewares) {
            if let Some(response) = (middleware)(&mut ctx) {
                return self.finish(&ctx, response);
            }
        }
        let response = (route.handler)(ctx.clone(), state).await;
        self.finish(&ctx, response)
    }

    /// Answer a request no route handled, still running global middleware
    /// so unrouted responses get the same headers as routed ones.
    pub fn unrouted(&self, mut ctx: RequestContext, response: Response) -> Response {
        for middleware in &self.middlewares {
            if let Some(early) = (middleware)(&mut ctx) {
                return self.finish(&ctx, early);
            }
        }
        self.finish(&ctx, response)
    }

    fn finish(&self, ctx: &RequestContext, mut response: Response) -> Response {
        for post_middleware in &self.post_middlewares {
            response = (post_middleware)(ctx, response);
        }
        response
    }

    /// Build an axum router serving every registered route.
    ///
    /// Routes sharing a path are merged into one method router; unknown
    /// paths answer 404 and unregistered methods 405, both passed through
    /// the global middleware.
    pub fn build_axum_router(&self, state: AppState) -> AxumRouter {
        let shared = Arc::new(self.clone());
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

        for route in &self.routes {
            let filter = match MethodFilter::try_from(route.method.clone()) {
                Ok(filter) => filter,
                Err(_) => {
                    log::warn!(
                        "Skipping route {} {}: unsupported method",
                        route.method,
                        route.path_pattern
                    );
                    continue;
                }
            };
            let endpoint = by_path
                .remove(&route.path_pattern)
                .unwrap_or_else(MethodRouter::new);
            let endpoint = add_endpoint(
                endpoint,
                filter,
                shared.clone(),
                route.clone(),
                state.clone(),
            );
            by_path.insert(route.path_pattern.clone(), endpoint);
        }

        let mut app = AxumRouter::new();
        for (path, endpoint) in by_path {
            let router = shared.clone();
            let endpoint = endpoint.fallback(move |method: Method, uri: Uri| {
                let router = router.clone();
                async move {
                    let ctx = RequestContext::new(method, uri.path());
                    router.unrouted(ctx, Response::error(405, status_text(405)))
                }
            });
            app = app.route(&axum_path(&path), endpoint);
        }
        app.fallback(move |method: Method, uri: Uri| {
            let router = shared.clone();
            async move {
                let ctx = RequestContext::new(method, uri.path());
                router.unrouted(ctx, Response::not_found())
            }
        })
    }

    /// Bind to the configured address and serve until Ctrl-C.
    pub async fn run(
        &self,
        state: AppState,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = state.settings.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        log::info!("HTTP Server running on http://{}", listener.local_addr()?);
        self.serve(listener, state, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        state: AppState,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.build_axum_router(state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        log::info!("HTTP Server stopped");
        Ok(())
    }
}

/// Add one route to an axum method router, extracting path parameters only
/// when the pattern declares some.
fn add_endpoint(
    endpoint: MethodRouter,
    filter: MethodFilter,
    router: Arc<Router>,
    route: Route,
    state: AppState,
) -> MethodRouter {
    if route.path_pattern.split('/').any(|seg| seg.starts_with(':')) {
        endpoint.on(
            filter,
            move |Path(params): Path<HashMap<String, String>>, uri: Uri, body: Bytes| async move {
                let mut ctx = RequestContext::new(route.method.clone(), uri.path()).with_body(body);
                ctx.params = params;
                router.dispatch(&route, ctx, state).await
            },
        )
    } else {
        endpoint.on(filter, move |uri: Uri, body: Bytes| async move {
            let ctx = RequestContext::new(route.method.clone(), uri.path()).with_body(body);
            router.dispatch(&route, ctx, state).await
        })
    }
}

/// Convert `/hero/:id` into axum's `/hero/{id}` syntax.
pub fn axum_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Pre-middleware stamping the request start time.
pub fn request_timer() -> Middleware {
    Arc::new(|ctx: &mut RequestContext| -> Option<Response> {
        ctx.start_time = Some(Instant::now());
        None
    })
}

/// Post-middleware logging `METHOD path -> status (elapsed)`.
pub fn access_log() -> PostMiddleware {
    Arc::new(|ctx: &RequestContext, response: Response| {
        let elapsed = ctx
            .start_time
            .map(|t| format!("{:?}", t.elapsed()))
            .unwrap_or_else(|| "-".to_string());
        log::info!(
            "{} {} -> {} {} ({})",
            ctx.method,
            ctx.path,
            response.status_code,
            status_text(response.status_code),
            elapsed
        );
        response
    })
}

/// Post-middleware attaching CORS headers to every response.
pub fn cors(settings: &crate::settings::CorsSettings) -> PostMiddleware {
    let cors = settings.clone();
    Arc::new(move |_ctx: &RequestContext, response: Response| {
        response
            .with_header("Access-Control-Allow-Origin", cors.allow_origin.clone())
            .with_header("Access-Control-Allow-Methods", cors.allow_methods.clone())
            .with_header("Access-Control-Allow-Headers", cors.allow_headers.clone())
    })
}

#[macro_export]
macro_rules! route {
    ($router:expr, $( $method:ident $path:expr => { $handler:expr $(, $middleware:expr )* } ),* $(,)?) => {
        $(
            $router.add_route(
                $crate::router::Method::$method,
                $path,
                ::std::sync::Arc::new(
                    move |ctx: $crate::router::RequestContext, state: $crate::router::AppState| {
                        Box::pin($handler(ctx, state))
                            as ::std::pin::Pin<
                                Box<dyn ::std::future::Future<Output = $crate::router::Response> + Send>,
                            >
                    },
                ),
                vec![$($middleware),*]
            );
        )*
    };
}
