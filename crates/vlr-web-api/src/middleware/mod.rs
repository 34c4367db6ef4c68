pub mod docs_rewrite;
pub mod pipeline;
pub mod rate_limit;

pub use docs_rewrite::DocsRewriteStage;
pub use pipeline::{
    ResponsePipeline, ResponseStage, RewriteError, StageOutcome, response_pipeline_middleware,
};
pub use rate_limit::rate_limit_middleware;
