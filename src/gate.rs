//! HTTP gate in front of the ban decider.
//!
//! Every request passes through [`abuse_gate`], which resolves the client IP,
//! asks the decider, and either rejects with 403 or hands the request on.
//! The inner handler simply answers `200 OK`, so the listener can serve as a
//! forward-auth endpoint for a reverse proxy (nginx `auth_request`, Traefik
//! ForwardAuth).

use crate::security::BanDecider;
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared state for the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub decider: Arc<BanDecider>,
    /// Peers allowed to report the client address in forwarding headers.
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl GateState {
    pub fn new(decider: Arc<BanDecider>, trusted_proxies: &[IpAddr]) -> Self {
        Self {
            decider,
            trusted_proxies: trusted_proxies.iter().map(|ip| ip.to_canonical()).collect(),
        }
    }
}

/// Body returned to banned clients.
pub fn ban_message(ip: IpAddr) -> String {
    format!("{} has been banned due to a bad abuse score", ip)
}

/// Resolve the client address for a request.
///
/// Forwarding headers are only read when the TCP peer is a trusted proxy.
/// `X-Forwarded-For` is walked from the right, skipping trusted proxies; the
/// first other address is the client. Anything left of it was written by the
/// client and is ignored. Without a usable entry `X-Real-IP` is tried, then
/// the peer itself. IPv4-mapped IPv6 addresses are reduced to plain IPv4.
pub fn client_ip(headers: &HeaderMap, peer: IpAddr, trusted_proxies: &[IpAddr]) -> IpAddr {
    let peer = peer.to_canonical();
    if !trusted_proxies.contains(&peer) {
        if headers.contains_key("x-forwarded-for") {
            debug!(peer = %peer, "Ignoring X-Forwarded-For from untrusted peer");
        }
        return peer;
    }

    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .collect::<Vec<_>>();

    for entry in forwarded.iter().rev() {
        // An unparseable hop ends the chain; nothing left of it is trusted.
        let Ok(ip) = entry.trim().parse::<IpAddr>() else {
            break;
        };
        let ip = ip.to_canonical();
        if !trusted_proxies.contains(&ip) {
            return ip;
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_canonical())
        .unwrap_or(peer)
}

/// Middleware rejecting requests from banned IPs.
pub async fn abuse_gate(
    State(state): State<GateState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), peer.ip(), &state.trusted_proxies);

    if state.decider.is_banned(ip).await {
        info!(ip = %ip, path = %request.uri().path(), "Rejected request from banned IP");
        return (StatusCode::FORBIDDEN, ban_message(ip)).into_response();
    }

    next.run(request).await
}

/// Inner handler for requests that pass the gate.
async fn allow() -> &'static str {
    "OK"
}

/// Build the gate router.
pub fn router(state: GateState) -> Router {
    Router::new()
        .fallback(allow)
        .layer(middleware::from_fn_with_state(state, abuse_gate))
}

/// Serve the gate on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: GateState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
