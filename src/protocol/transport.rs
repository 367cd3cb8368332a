use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::{FoldError, ProtocolError, Result};
use crate::protocol::Message;

/// Receive buffer size; large enough for any datagram the coordinator sends.
const RECV_BUFFER_SIZE: usize = 65_536;

/// Outcome of one bounded receive.
#[derive(Debug)]
pub enum Received {
    Message { message: Message, from: SocketAddr },
    /// Nothing arrived within the receive timeout.
    Timeout,
    /// A datagram arrived but did not decode. Already logged.
    Malformed { from: SocketAddr },
}

/// One bound UDP socket with a per-call receive timeout.
///
/// Delivery is best-effort: datagrams may be lost, reordered or duplicated.
#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    recv_timeout: Duration,
}

impl Transport {
    pub async fn bind(addr: SocketAddr, recv_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| FoldError::Bind { addr, source })?;
        Ok(Self {
            socket,
            recv_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    pub async fn send(&self, message: &Message, to: SocketAddr) -> Result<usize> {
        let bytes = message.encode()?;
        self.send_bytes(&bytes, to).await
    }

    pub async fn send_bytes(&self, bytes: &[u8], to: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(bytes, to).await?)
    }

    /// Waits at most the configured timeout for one datagram.
    pub async fn recv(&self) -> Result<Received> {
        self.recv_within(self.recv_timeout).await
    }

    pub async fn recv_within(&self, wait: Duration) -> Result<Received> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, from) = match tokio::time::timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Ok(Received::Timeout),
        };

        match Message::decode(&buf[..len]) {
            Ok(message) => Ok(Received::Message { message, from }),
            Err(e) => {
                log_malformed(from, len, &e);
                Ok(Received::Malformed { from })
            }
        }
    }
}

fn log_malformed(from: SocketAddr, len: usize, error: &ProtocolError) {
    tracing::warn!(from = %from, len, error = %error, "Dropping malformed datagram");
}

/// Best guess at the address other hosts can reach us on.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface.
pub async fn local_ip() -> IpAddr {
    async fn probe() -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
        Ok(socket.local_addr()?.ip())
    }

    match probe().await {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}
