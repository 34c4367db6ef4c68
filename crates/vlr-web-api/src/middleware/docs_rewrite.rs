use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use futures::{
    StreamExt, future,
    stream::{self, BoxStream},
};
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::{
    config::DocsConfig,
    middleware::pipeline::{ResponseStage, RewriteError, StageOutcome},
    rewriter::{DocsRewriter, RewriteRules},
};

/// Buffers HTML responses and runs them through [`DocsRewriter`].
#[derive(Debug, Clone)]
pub struct DocsRewriteStage {
    rewriter: DocsRewriter,
    max_body_bytes: usize,
    read_timeout: Duration,
}

impl DocsRewriteStage {
    pub fn new(rewriter: DocsRewriter, max_body_bytes: usize, read_timeout: Duration) -> Self {
        Self {
            rewriter,
            max_body_bytes,
            read_timeout,
        }
    }

    pub fn from_config(config: &DocsConfig) -> Self {
        let rules = RewriteRules::new(&config.title, &config.favicon_path);
        Self::new(
            DocsRewriter::new(rules),
            config.max_body_bytes,
            config.read_timeout,
        )
    }
}

#[async_trait]
impl ResponseStage for DocsRewriteStage {
    fn name(&self) -> &'static str {
        "docs-rewrite"
    }

    async fn apply(&self, response: Response) -> StageOutcome {
        if !is_html(response.headers()) {
            return StageOutcome::Skipped(response);
        }

        if is_encoded(response.headers()) {
            debug!("Skipping rewrite of encoded HTML response");
            return StageOutcome::Skipped(response);
        }

        let (mut parts, body) = response.into_parts();

        let bytes = match buffer_body(body, self.max_body_bytes, self.read_timeout).await {
            Ok(bytes) => bytes,
            Err(Interrupted { error, replay }) => {
                return StageOutcome::Failed {
                    response: Response::from_parts(parts, replay),
                    error,
                };
            }
        };

        let rewrite = match std::str::from_utf8(&bytes).map(|html| self.rewriter.rewrite(html)) {
            Ok(rewrite) => rewrite,
            Err(error) => {
                return StageOutcome::Failed {
                    response: Response::from_parts(parts, Body::from(bytes)),
                    error: error.into(),
                };
            }
        };

        for substitution in &rewrite.substitutions {
            info!(stage = self.name(), "Documentation page: {}", substitution);
        }

        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(rewrite.html.len()));
        StageOutcome::Rewritten(Response::from_parts(parts, Body::from(rewrite.html)))
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .is_some_and(|value| !value.as_bytes().eq_ignore_ascii_case(b"identity"))
}

/// A buffering attempt that stopped early, with a body that replays the
/// original stream from its first byte.
struct Interrupted {
    error: RewriteError,
    replay: Body,
}

enum Tail {
    Rest(Body),
    Failed(axum::Error),
}

fn replay(chunks: Vec<Bytes>, tail: Tail) -> Body {
    let head = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
    let tail: BoxStream<'static, Result<Bytes, axum::Error>> = match tail {
        Tail::Rest(body) => StreamExt::boxed(body.into_data_stream()),
        Tail::Failed(err) => stream::once(future::ready(Err(err))).boxed(),
    };
    Body::from_stream(head.chain(tail))
}

async fn buffer_body(
    mut body: Body,
    max_bytes: usize,
    read_timeout: Duration,
) -> Result<Bytes, Interrupted> {
    let deadline = Instant::now() + read_timeout;
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut len = 0;

    loop {
        let frame = match timeout_at(deadline, body.frame()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                return Err(Interrupted {
                    error: RewriteError::Body(err.to_string()),
                    replay: replay(chunks, Tail::Failed(err)),
                });
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Interrupted {
                    error: RewriteError::Timeout(read_timeout),
                    replay: replay(chunks, Tail::Rest(body)),
                });
            }
        };

        // HTML pages carry no trailers
        let Ok(data) = frame.into_data() else {
            continue;
        };

        len += data.len();
        chunks.push(data);

        if len > max_bytes {
            return Err(Interrupted {
                error: RewriteError::BodyTooLarge { limit: max_bytes },
                replay: replay(chunks, Tail::Rest(body)),
            });
        }
    }

    Ok(match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.swap_remove(0),
        _ => Bytes::from(chunks.concat()),
    })
}
