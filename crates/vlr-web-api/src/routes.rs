use axum::{Router, http::Method, middleware, routing::get};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
};

use crate::{
    config::Config,
    docs,
    handlers::{AppState, root},
    middleware::{
        DocsRewriteStage, ResponsePipeline, rate_limit_middleware, response_pipeline_middleware,
    },
    rate_limiter::RateLimiter,
};

/// Match, team and news routes supplied by the scraper, plus their OpenAPI document.
#[derive(Default)]
pub struct DataRoutes {
    pub router: Router,
    pub openapi: Option<utoipa::openapi::OpenApi>,
}

impl DataRoutes {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            openapi: None,
        }
    }

    pub fn with_openapi(mut self, openapi: utoipa::openapi::OpenApi) -> Self {
        self.openapi = Some(openapi);
        self
    }
}

/// Stages applied to every outgoing response, in order.
pub fn response_pipeline(config: &Config) -> ResponsePipeline {
    ResponsePipeline::new().with_stage(DocsRewriteStage::from_config(&config.docs))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.contains(&"*".to_string()) {
        CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        let origins: Result<Vec<_>, _> = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse())
            .collect();

        match origins {
            Ok(origins) => CorsLayer::new()
                .allow_methods([Method::GET])
                .allow_headers(Any)
                .allow_origin(origins),
            Err(_) => {
                eprintln!("Warning: Invalid CORS origins, falling back to allow all");
                CorsLayer::new()
                    .allow_methods([Method::GET])
                    .allow_headers(Any)
                    .allow_origin(Any)
            }
        }
    }
}

pub fn create_router(config: &Config, rate_limiter: Arc<RateLimiter>, data: DataRoutes) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let openapi = docs::openapi(&config.docs, data.openapi);
    let favicon = ServeFile::new(config.favicon_file());

    // Only the scraped data is budgeted; docs, favicons and static assets are not.
    let data_router = data.router.layer(middleware::from_fn_with_state(
        rate_limiter,
        rate_limit_middleware,
    ));

    Router::new()
        .route("/", get(root))
        .with_state(state)
        .route_service("/favicon.ico", favicon.clone())
        .route_service("/favicon.svg", favicon)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .merge(docs::swagger_ui(&config.docs, openapi))
        .merge(data_router)
        .layer(ServiceBuilder::new().layer(cors_layer(config)))
        .layer(middleware::from_fn_with_state(
            response_pipeline(config),
            response_pipeline_middleware,
        ))
}
