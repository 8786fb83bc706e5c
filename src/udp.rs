use crate::error::{AdapterError, BoxError};
use crate::queue::BatchQueue;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

const SINK: &str = "udp";

/// Connectionless socket used by [`UdpAdapter`]. Dropping it closes it.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send_to(&self, payload: &[u8], host: &str, port: u16) -> io::Result<usize>;
}

/// Creates the adapter's socket on first use. `host` and `port` are the
/// destination the socket will send to.
#[async_trait]
pub trait DatagramBinder: Send + Sync {
    async fn bind(&self, host: &str, port: u16) -> Result<Box<dyn DatagramSocket>, BoxError>;
}

/// One element of the JSON array carried by a datagram.
#[derive(Debug, Clone, Serialize)]
pub struct UdpEntry {
    pub message: String,
    #[serde(rename = "type")]
    pub level_name: String,
    pub time: i64,
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&LogRecord> for UdpEntry {
    fn from(record: &LogRecord) -> Self {
        UdpEntry {
            message: record.message.clone(),
            level_name: record.level_name.clone(),
            time: record.unix_timestamp(),
            context: record.context.clone(),
        }
    }
}

/// Fire-and-forget adapter sending records as JSON datagrams.
///
/// Every flush is one datagram holding the JSON array of all pending
/// entries. Whether the datagram arrives is not observed: a failed
/// `send_to` is ignored and the entries are dropped. Only failing to create
/// the socket is reported, and then the entries stay queued.
///
/// Owners should call [`LogSink::shutdown`] before dropping the adapter so
/// that a transaction left open is flushed and the socket closed.
pub struct UdpAdapter {
    binder: Box<dyn DatagramBinder>,
    socket: Option<Box<dyn DatagramSocket>>,
    host: String,
    port: u16,
    queue: BatchQueue<UdpEntry>,
}

impl UdpAdapter {
    /// The socket is not created until the first datagram is sent.
    pub fn new(binder: Box<dyn DatagramBinder>, host: impl Into<String>, port: u16) -> Self {
        UdpAdapter {
            binder,
            socket: None,
            host: host.into(),
            port,
            queue: BatchQueue::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Entries waiting for the next flush.
    pub fn pending(&self) -> &[UdpEntry] {
        self.queue.pending()
    }

    async fn send(&mut self) -> Result<(), AdapterError> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let payload = serde_json::to_vec(self.queue.pending())?;

        if self.socket.is_none() {
            let socket = self.binder.bind(&self.host, self.port).await.map_err(|e| AdapterError::io(SINK, e))?;
            self.socket = Some(socket);
        }

        if let Some(socket) = self.socket.as_deref() {
            match socket.send_to(&payload, &self.host, self.port).await {
                Ok(sent) => tracing::trace!(bytes = sent, entries = self.queue.len(), "udp datagram sent"),
                Err(_) => tracing::trace!(entries = self.queue.len(), "udp datagram not sent"),
            }
        }

        self.queue.clear();
        Ok(())
    }
}

#[async_trait]
impl LogSink for UdpAdapter {
    async fn process(&mut self, record: &LogRecord) -> Result<(), AdapterError> {
        self.queue.push(UdpEntry::from(record));
        if !self.queue.is_active() {
            self.send().await?;
        }
        Ok(())
    }

    /// Flushes anything already pending, including entries left behind by a
    /// failed socket creation, then starts a new transaction.
    async fn begin(&mut self) -> Result<(), AdapterError> {
        self.send().await?;
        self.queue.activate();
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AdapterError> {
        if self.queue.needs_flush() {
            self.send().await?;
        }
        self.queue.deactivate();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AdapterError> {
        let dropped = self.queue.discard();
        tracing::trace!(dropped, "udp transaction rolled back");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.socket = None;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.queue.is_active()
    }

    /// Sends every pending entry, inside a transaction or not, then closes.
    async fn shutdown(&mut self) -> Result<(), AdapterError> {
        let sent = self.send().await;
        self.queue.deactivate();
        self.close().await?;
        sent
    }
}

/// [`DatagramBinder`] producing tokio UDP sockets bound to an ephemeral port.
///
/// By default the local address is the unspecified address of the
/// destination's family (`0.0.0.0:0` or `[::]:0`), resolved when the socket
/// is first needed. [`TokioBinder::new`] pins it instead.
#[derive(Debug, Clone, Default)]
pub struct TokioBinder {
    local_addr: Option<String>,
}

impl TokioBinder {
    pub fn new(local_addr: impl Into<String>) -> Self {
        TokioBinder {
            local_addr: Some(local_addr.into()),
        }
    }
}

/// Ephemeral local address able to reach `target`.
fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

#[async_trait]
impl DatagramBinder for TokioBinder {
    async fn bind(&self, host: &str, port: u16) -> Result<Box<dyn DatagramSocket>, BoxError> {
        let socket = match &self.local_addr {
            Some(local) => tokio::net::UdpSocket::bind(local.as_str()).await?,
            None => {
                let target = tokio::net::lookup_host((host, port))
                    .await?
                    .next()
                    .ok_or_else(|| format!("{} did not resolve to any address", host))?;
                tokio::net::UdpSocket::bind(unspecified_for(&target)).await?
            }
        };
        Ok(Box::new(socket))
    }
}

#[async_trait]
impl DatagramSocket for tokio::net::UdpSocket {
    async fn send_to(&self, payload: &[u8], host: &str, port: u16) -> io::Result<usize> {
        tokio::net::UdpSocket::send_to(self, payload, (host, port)).await
    }
}
