use anyhow::Result;

use async_trait::async_trait;

mod round_robin;
mod udp;

pub use round_robin::*;
pub use udp::*;

use super::message::{Query, Response};

#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn send(&self, query: Query) -> Result<Response>;
}
