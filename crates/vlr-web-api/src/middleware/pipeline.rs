//! Ordered response stages run on every outgoing response.
//!
//! A stage never fails the request: it either hands back a rewritten response,
//! skips, or reports a failure together with the original response.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Failed to read response body: {0}")]
    Body(String),
    #[error("Response body exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("Timed out after {0:?} reading response body")]
    Timeout(Duration),
    #[error("Response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub enum StageOutcome {
    Rewritten(Response),
    Skipped(Response),
    /// The response is the original one, replayed unmodified.
    Failed {
        response: Response,
        error: RewriteError,
    },
}

impl StageOutcome {
    pub fn into_response(self) -> Response {
        match self {
            StageOutcome::Rewritten(response)
            | StageOutcome::Skipped(response)
            | StageOutcome::Failed { response, .. } => response,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, StageOutcome::Rewritten(_))
    }
}

#[async_trait]
pub trait ResponseStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, response: Response) -> StageOutcome;
}

#[derive(Clone, Default)]
pub struct ResponsePipeline {
    stages: Vec<Arc<dyn ResponseStage>>,
}

impl ResponsePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl ResponseStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn run(&self, mut response: Response) -> Response {
        for stage in &self.stages {
            response = match stage.apply(response).await {
                StageOutcome::Rewritten(response) => {
                    debug!(stage = stage.name(), "Response rewritten");
                    response
                }
                StageOutcome::Skipped(response) => response,
                StageOutcome::Failed { response, error } => {
                    error!(
                        stage = stage.name(),
                        error = %error,
                        "Response stage failed, passing original response through"
                    );
                    response
                }
            };
        }
        response
    }
}

pub async fn response_pipeline_middleware(
    State(pipeline): State<ResponsePipeline>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::HEAD {
        return next.run(request).await;
    }

    let response = next.run(request).await;
    pipeline.run(response).await
}
