use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use bytes::Bytes;
use futures_util::{stream, Stream};
use tokio::net::UdpSocket;

pub mod client;
pub mod message;
pub mod metrics;
pub mod server;

pub const MAX_PACKET_SIZE: usize = 65_535;

/// Endless stream of datagrams received on `socket`, together with their senders.
pub fn create_udp_dns_stream(
    socket: Arc<UdpSocket>,
) -> impl Stream<Item = Result<(SocketAddr, Bytes)>> {
    let buf = vec![0; MAX_PACKET_SIZE];
    stream::unfold((socket, buf), |(socket, mut buf)| async move {
        let received = socket
            .recv_from(&mut buf)
            .await
            .map(|(read, sender)| (sender, Bytes::copy_from_slice(&buf[..read])))
            .map_err(anyhow::Error::from);
        Some((received, (socket, buf)))
    })
}
