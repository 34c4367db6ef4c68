pub mod cleanup;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod problem;
pub mod rate_limiter;
pub mod rewriter;
pub mod routes;
pub mod server;

pub use cleanup::CleanupService;
pub use config::Config;
pub use rate_limiter::{RateLimit, RateLimitConfig, RateLimitError, RateLimiter};
pub use rewriter::{DocsRewriter, RewriteRules};
pub use routes::{DataRoutes, create_router};
