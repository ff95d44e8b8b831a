use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use shared::error::{ApiError, ErrorCode};
use tracing::warn;

use super::reject;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) const TOO_MANY_REQUESTS: &str = "Too many requests";

/// Per-client-IP quotas guarding one group of routes. A request passes only
/// when every quota admits it.
pub(crate) struct RouteLimit {
    route: &'static str,
    limiters: Vec<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RouteLimit {
    /// `quotas` are `(requests, window)` pairs; a zero count or window adds no quota.
    pub(crate) fn new(route: &'static str, quotas: &[(u32, Duration)]) -> Arc<Self> {
        let limiters = quotas
            .iter()
            .filter_map(|&(count, window)| quota(count, window))
            .map(RateLimiter::keyed)
            .collect();
        Arc::new(Self { route, limiters })
    }

    pub(crate) fn admits(&self, client: IpAddr) -> bool {
        self.limiters
            .iter()
            .all(|limiter| limiter.check_key(&client).is_ok())
    }

    fn prune(&self) {
        for limiter in &self.limiters {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }
}

fn quota(count: u32, window: Duration) -> Option<Quota> {
    let burst = NonZeroU32::new(count)?;
    Quota::with_period(window / count).map(|quota| quota.allow_burst(burst))
}

#[derive(Clone)]
pub(crate) struct RateLimits {
    pub(crate) default: Arc<RouteLimit>,
    pub(crate) register: Arc<RouteLimit>,
    pub(crate) login: Arc<RouteLimit>,
}

impl RateLimits {
    /// 200/day and 50/hour for the API at large, 50/minute on register and
    /// 100/minute on login.
    pub(crate) fn standard() -> Self {
        Self {
            default: RouteLimit::new("default", &[(200, DAY), (50, HOUR)]),
            register: RouteLimit::new("register", &[(50, MINUTE)]),
            login: RouteLimit::new("login", &[(100, MINUTE)]),
        }
    }

    /// Drops per-client state that has fully replenished.
    pub(crate) fn prune(&self) {
        self.default.prune();
        self.register.prune();
        self.login.prune();
    }
}

pub(crate) async fn enforce(
    State(limit): State<Arc<RouteLimit>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request);
    if !limit.admits(client) {
        warn!(route = limit.route, %client, "rate limit exceeded");
        return reject(ApiError::new(ErrorCode::RateLimited, TOO_MANY_REQUESTS)).into_response();
    }
    next.run(request).await
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_quota_must_admit() {
        let limit = RouteLimit::new("test", &[(3, DAY), (2, HOUR)]);
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limit.admits(client));
        assert!(limit.admits(client));
        assert!(!limit.admits(client));
    }

    #[test]
    fn clients_are_counted_separately() {
        let limit = RouteLimit::new("test", &[(1, MINUTE)]);
        assert!(limit.admits(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!limit.admits(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(limit.admits(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    }

    #[test]
    fn zero_quota_is_ignored() {
        let limit = RouteLimit::new("test", &[(0, MINUTE), (1, Duration::ZERO)]);
        assert!(limit.limiters.is_empty());
        assert!(limit.admits(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn pruning_keeps_exhausted_clients_limited() {
        let limits = RateLimits {
            login: RouteLimit::new("login", &[(1, HOUR)]),
            ..RateLimits::standard()
        };
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limits.login.admits(client));
        limits.prune();
        assert!(!limits.login.admits(client));
    }
}
