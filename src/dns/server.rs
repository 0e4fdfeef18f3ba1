use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use log::{debug, error};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::{net::UdpSocket, task::JoinSet};

use super::{
    create_udp_dns_stream,
    message::{Query, Response},
};

/// Binds `bind_addr` and returns the bound address with the future that serves it.
/// Every query is handled in its own task; dropping the future aborts the ones still in flight.
pub async fn create_udp_server<Handler, HandlerResp>(
    bind_addr: SocketAddr,
    request_handler: Handler,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static)>
where
    Handler: Fn(Query) -> HandlerResp + Send + Sync + 'static,
    HandlerResp: Future<Output = Result<Response>> + Send + 'static,
{
    let socket = UdpSocket::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind udp socket on {}", bind_addr))?;
    let local_addr = socket.local_addr()?;
    let socket = Arc::new(socket);
    let mut requests = Box::pin(create_udp_dns_stream(socket.clone()));

    let requests_receiver = async move {
        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                request = requests.next() => {
                    let request = request.expect("Should be infinite");
                    if let Err(err) = dispatch(request, &request_handler, &socket, &mut handlers) {
                        error!("Error occured while receiving dns request: {:#}", err)
                    }
                }
                Some(handled) = handlers.join_next() => {
                    if let Err(err) = handled {
                        error!("Query handler crashed: {}", err);
                    }
                }
            }
        }
    };

    Ok((local_addr, requests_receiver))
}

fn dispatch<Handler, HandlerResp>(
    request: Result<(SocketAddr, Bytes)>,
    request_handler: &Handler,
    socket: &Arc<UdpSocket>,
    handlers: &mut JoinSet<()>,
) -> Result<()>
where
    Handler: Fn(Query) -> HandlerResp,
    HandlerResp: Future<Output = Result<Response>> + Send + 'static,
{
    let (sender, request) = request?;
    let query = Query::from_bytes(request)
        .with_context(|| format!("Bad dns query from {}", sender))?;
    debug!("Got query {} from {}", query, sender);
    let handler_fut = request_handler(query);
    let socket = socket.clone();
    handlers.spawn(async move {
        let response = match handler_fut.await {
            Ok(response) => response,
            Err(err) => {
                error!("Dropping query from {}: {:#}", sender, err);
                return;
            }
        };
        if let Err(err) = socket.send_to(response.bytes(), &sender).await {
            error!("Error occured while sending response to {}: {}", sender, err);
        }
    });
    Ok(())
}
