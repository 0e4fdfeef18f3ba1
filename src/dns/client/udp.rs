use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use tokio::{
    net::{lookup_host, UdpSocket},
    time::timeout,
};

use crate::dns::{
    message::{Query, Response},
    metrics::{FAILED_QUERIES, FORWARDED_QUERIES},
    MAX_PACKET_SIZE,
};

use super::DnsClient;

/// Forwards every query to one upstream over its own ephemeral socket.
/// Dropping the socket on timeout discards any late reply.
pub struct UdpClient {
    server_addr: String,
    timeout: Duration,
}

impl UdpClient {
    pub fn new(server_addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server_addr: server_addr.into(),
            timeout,
        }
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    async fn exchange(&self, query: &Query) -> Result<Response> {
        let server_addr = lookup_host(self.server_addr.as_str())
            .await?
            .next()
            .ok_or_else(|| anyhow!("Can't resolve upstream address"))?;
        let socket = UdpSocket::bind(unspecified_addr(&server_addr)).await?;
        socket.connect(server_addr).await?;
        socket.send(query.bytes()).await?;

        let mut buf = vec![0; MAX_PACKET_SIZE];
        loop {
            let read = socket.recv(&mut buf).await?;
            match Response::from_bytes(Bytes::copy_from_slice(&buf[..read])) {
                Ok(response) if response.header().id == query.header().id => return Ok(response),
                Ok(response) => debug!(
                    "Ignoring response #{} from {} while waiting for #{}",
                    response.header().id,
                    server_addr,
                    query.header().id
                ),
                Err(err) => debug!("Ignoring bad packet from {}: {:#}", server_addr, err),
            }
        }
    }
}

fn unspecified_addr(server_addr: &SocketAddr) -> SocketAddr {
    match server_addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

#[async_trait]
impl DnsClient for UdpClient {
    async fn send(&self, query: Query) -> Result<Response> {
        let response = match timeout(self.timeout, self.exchange(&query)).await {
            Ok(response) => response,
            Err(_) => Err(anyhow!("No response within {:?}", self.timeout)),
        };
        match response {
            Ok(response) => {
                FORWARDED_QUERIES.inc(&self.server_addr);
                Ok(response)
            }
            Err(err) => {
                FAILED_QUERIES.inc(&self.server_addr);
                Err(err).with_context(|| {
                    format!("Failed to forward query {} to {}", query, self.server_addr)
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::UdpClient;
    use crate::dns::{
        client::DnsClient,
        message::Query,
        test_utils::{
            answer, query_bytes, response_bytes, spawn_echo_upstream, spawn_silent_upstream,
        },
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn should_return_upstream_response() -> Result<()> {
        let upstream = spawn_echo_upstream().await?;
        let client = UdpClient::new(upstream.to_string(), Duration::from_secs(1));
        let query = Query::from_bytes(query_bytes(0x6d5c, "api.browser.yandex.com"))?;

        let response = client.send(query.clone()).await?;

        assert_eq!(response.bytes().as_ref(), answer(query.bytes()).as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn should_fail_after_timeout_when_upstream_is_silent() -> Result<()> {
        let upstream = spawn_silent_upstream().await?;
        let timeout = Duration::from_millis(200);
        let client = UdpClient::new(upstream.to_string(), timeout);
        let query = Query::from_bytes(query_bytes(1, "www.google.com"))?;

        let started = Instant::now();
        let err = client.send(query).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= timeout, "returned after {:?}", elapsed);
        assert!(
            elapsed < timeout + Duration::from_millis(50),
            "returned after {:?}",
            elapsed
        );
        let message = format!("{:#}", err);
        assert!(message.contains(&upstream.to_string()), "{}", message);
        assert!(message.contains("www.google.com"), "{}", message);
        assert!(message.contains("No response within"), "{}", message);
        Ok(())
    }

    #[tokio::test]
    async fn should_skip_responses_with_other_ids() -> Result<()> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let upstream = socket.local_addr()?;
        tokio::spawn(async move {
            let mut buf = [0; 512];
            let (_, sender) = socket.recv_from(&mut buf).await?;
            socket.send_to(b"garbage", sender).await?;
            socket
                .send_to(&response_bytes(2, "example.com"), sender)
                .await?;
            socket
                .send_to(&response_bytes(1, "example.com"), sender)
                .await?;
            Ok::<_, anyhow::Error>(())
        });
        let client = UdpClient::new(upstream.to_string(), Duration::from_secs(1));

        let response = client
            .send(Query::from_bytes(query_bytes(1, "example.com"))?)
            .await?;

        assert_eq!(response.header().id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn should_fail_on_unresolvable_upstream() -> Result<()> {
        let client = UdpClient::new("not an address", Duration::from_secs(1));

        let result = client
            .send(Query::from_bytes(query_bytes(1, "example.com"))?)
            .await;

        assert!(result.is_err());
        Ok(())
    }
}
