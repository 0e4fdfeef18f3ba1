use std::{future::Future, net::SocketAddr};

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use warp::{http::StatusCode, Filter, Rejection, Reply};

pub static FORWARDED_QUERIES: Lazy<PerUpstreamCounter> = Lazy::new(|| {
    PerUpstreamCounter::new(
        "dns_proxy_forwarded_queries",
        "Queries answered by the upstream in time",
    )
});

pub static FAILED_QUERIES: Lazy<PerUpstreamCounter> = Lazy::new(|| {
    PerUpstreamCounter::new(
        "dns_proxy_failed_queries",
        "Queries dropped after an upstream error or timeout",
    )
});

pub struct PerUpstreamCounter {
    counter: IntCounterVec,
}

impl PerUpstreamCounter {
    fn new(metric_name: &str, help: &str) -> Self {
        Self {
            counter: register_int_counter_vec!(metric_name, help, &["upstream"]).unwrap(),
        }
    }

    pub fn inc(&self, upstream: &str) {
        self.counter.with_label_values(&[upstream]).inc()
    }

    #[cfg(test)]
    pub fn get(&self, upstream: &str) -> u64 {
        self.counter.with_label_values(&[upstream]).get()
    }
}

fn routes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("metrics").and(warp::get()).map(|| {
        let mut buffer = Vec::new();
        match TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
            Ok(()) => warp::reply::with_status(
                String::from_utf8_lossy(&buffer).into_owned(),
                StatusCode::OK,
            ),
            Err(err) => {
                warp::reply::with_status(err.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    })
}

pub fn create_metrics_server(
    bind_addr: SocketAddr,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
    Ok(warp::serve(routes()).try_bind_ephemeral(bind_addr)?)
}
