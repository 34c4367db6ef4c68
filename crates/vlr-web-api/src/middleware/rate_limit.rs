use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, warn};

use crate::{
    problem::ProblemDetails,
    rate_limiter::{RateLimitError, RateLimitStatus, RateLimiter},
};

pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = extract_identifier(&request, rate_limiter.trusts_proxy_headers());

    match rate_limiter.check_and_increment(&identifier) {
        Ok(status) => {
            debug!("Rate limit check passed for identifier: {}", identifier);

            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &status);
            response
        }
        Err(RateLimitError::LimitExceeded {
            requests,
            limit,
            retry_after,
        }) => {
            warn!(
                "Rate limit exceeded for identifier '{}': {}/{} requests",
                identifier, requests, limit
            );

            let mut response = rate_limit_exceeded_response(&rate_limiter, retry_after);
            let status = RateLimitStatus {
                used: requests,
                limit,
                window_seconds: rate_limiter.window_size_seconds(),
            };
            add_rate_limit_headers(response.headers_mut(), &status);
            response
        }
        Err(err) => {
            // Only LimitExceeded comes out of counting; anything else fails open.
            warn!("Rate limiter error for identifier '{}': {}", identifier, err);
            next.run(request).await
        }
    }
}

/// The peer address keys the budget. Forwarding headers are client-controlled,
/// so they are only consulted when the deployment sits behind a proxy that
/// rewrites them.
fn extract_identifier(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(forwarded_for) = request.headers().get("x-forwarded-for")
            && let Ok(forwarded_str) = forwarded_for.to_str()
            && let Some(first_ip) = forwarded_str.split(',').next()
            && !first_ip.trim().is_empty()
        {
            return first_ip.trim().to_string();
        }

        if let Some(real_ip) = request.headers().get("x-real-ip")
            && let Ok(ip_str) = real_ip.to_str()
            && !ip_str.trim().is_empty()
        {
            return ip_str.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn rate_limit_exceeded_response(rate_limiter: &RateLimiter, retry_after: u64) -> Response {
    let limit = rate_limiter.limit();
    let mut response = ProblemDetails::new(StatusCode::TOO_MANY_REQUESTS)
        .with_type("about:blank")
        .with_detail("error", format!("Rate limit exceeded: {}", limit))
        .with_detail(
            "detail",
            format!("Too many requests, retry in {} seconds", retry_after),
        )
        .into_response();

    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn add_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert("X-RateLimit-Used", HeaderValue::from(status.used));
    headers.insert("X-RateLimit-Limit", HeaderValue::from(status.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(status.remaining()));
    headers.insert("X-RateLimit-Window", HeaderValue::from(status.window_seconds));
}
