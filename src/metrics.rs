//! Request metrics and the Prometheus scrape endpoint.
//!
//! The dispatcher records a request duration histogram and an rcode
//! counter, both labelled by the serving listener address. When
//! [`Config::metrics_bind_addr`][`crate::config::Config::metrics_bind_addr`]
//! is set, the binary installs a Prometheus recorder and serves the
//! rendered registry over HTTP:
//!
//! ```bash
//! ❯ curl -s http://localhost:9100/metrics | grep ipref_
//! ipref_response_rcode_total{server="127.0.0.1:53",rcode="NoError"} 17
//! ```

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram, Histogram, Unit};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use trust_dns_server::client::op::ResponseCode;

pub(crate) const REQUEST_DURATION: &str = "ipref_request_duration_seconds";
pub(crate) const RESPONSE_RCODE: &str = "ipref_response_rcode_total";

/// Metric handles for one serving listener.
#[derive(Clone)]
pub struct HandlerMetrics {
    server: String,
    request_duration: Histogram,
}

impl HandlerMetrics {
    pub fn new(server: &str) -> Self {
        let server = server.to_string();
        let request_duration = {
            let histogram = histogram!(REQUEST_DURATION, "server" => server.clone());
            describe_histogram!(
                REQUEST_DURATION,
                Unit::Seconds,
                "histogram of the time each request took"
            );
            histogram
        };
        describe_counter!(RESPONSE_RCODE, Unit::Count, "counter of rcodes made per request");
        HandlerMetrics {
            server,
            request_duration,
        }
    }

    pub fn observe(&self, elapsed: Duration, rcode: ResponseCode) {
        self.request_duration.record(elapsed.as_secs_f64());
        counter!(
            RESPONSE_RCODE,
            "server" => self.server.clone(),
            "rcode" => format!("{rcode:?}")
        )
        .increment(1);
    }
}

/// Serve the scrape endpoint. The recorder must already be installed;
/// its handle renders the registry on demand.
pub fn serve(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&addr).serve(router(handle).into_make_service())
}

fn router(handle: PrometheusHandle) -> Router {
    let render = move || {
        let handle = handle.clone();
        async move { handle.render() }
    };
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/metrics", get(render))
        .layer(TraceLayer::new_for_http())
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observes_without_an_installed_recorder() {
        // handles degrade to no-ops when no recorder is installed
        let metrics = HandlerMetrics::new("127.0.0.1:5353");
        metrics.observe(Duration::from_millis(3), ResponseCode::NoError);
        metrics.observe(Duration::from_millis(5), ResponseCode::ServFail);
    }
}
