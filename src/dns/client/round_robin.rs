use std::sync::atomic::{AtomicUsize, Ordering};

use super::DnsClient;
use crate::dns::message::{Query, Response};
use anyhow::{bail, Result};
use async_trait::async_trait;

/// Fixed, non-empty list of items handed out in order, wrapping at the end.
pub struct RoundRobin<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> RoundRobin<T> {
    pub fn new(items: Vec<T>) -> Result<Self> {
        if items.is_empty() {
            bail!("Round robin needs at least one item");
        }
        Ok(Self {
            items,
            cursor: AtomicUsize::default(),
        })
    }

    /// Returns the item under the cursor and moves the cursor to the next one.
    /// Reading and advancing is a single atomic update, so concurrent callers never share a slot.
    pub fn next(&self) -> &T {
        let len = self.items.len();
        let idx = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                Some((cursor + 1) % len)
            })
            .unwrap_or_else(|cursor| cursor);
        &self.items[idx]
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

pub struct RoundRobinClient<C> {
    clients: RoundRobin<C>,
}

impl<C> RoundRobinClient<C> {
    pub fn new(clients: Vec<C>) -> Result<Self> {
        Ok(Self {
            clients: RoundRobin::new(clients)?,
        })
    }

    pub fn clients(&self) -> &[C] {
        self.clients.items()
    }
}

#[async_trait]
impl<C: DnsClient> DnsClient for RoundRobinClient<C> {
    async fn send(&self, query: Query) -> Result<Response> {
        let client = self.clients.next();
        client.send(query).await
    }
}
