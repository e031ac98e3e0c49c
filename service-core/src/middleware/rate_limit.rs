use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Allow `requests` per `window_seconds` per IP, with the whole allowance
/// available as a burst.
pub fn create_ip_rate_limiter(requests: u32, window_seconds: u64) -> IpRateLimiter {
    let requests = requests.max(1);
    let period_ms = ((window_seconds.max(1) * 1000) / requests as u64).max(1);
    let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(Duration::from_millis(period_ms))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Resolve the caller IP, preferring the first `x-forwarded-for` hop set by
/// the ingress.
fn client_ip(request: &Request) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(client_ip = %ip, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_burst_then_rejects() {
        let limiter = create_ip_rate_limiter(3, 60);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check_key(&ip).is_ok());
        }
        assert!(limiter.check_key(&ip).is_err());
    }

    #[test]
    fn limiter_tracks_ips_independently() {
        let limiter = create_ip_rate_limiter(1, 60);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check_key(&a).is_ok());
        assert!(limiter.check_key(&a).is_err());
        assert!(limiter.check_key(&b).is_ok());
    }
}
