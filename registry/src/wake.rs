use crate::errors::{Error, Result};
use crate::metrics::{WAKE_FAILURES_TOTAL, WAKE_PACKETS_TOTAL};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

const SYNC_STREAM: [u8; 6] = [0xFF; 6];
const MAC_REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = SYNC_STREAM.len() + MAC_REPETITIONS * 6;

/// Sends one wake-on-LAN packet per call. No retries and no confirmation
/// that the target actually woke.
#[async_trait]
pub trait WakeDispatcher: Send + Sync {
    async fn send(&self, mac_address: &str) -> Result<()>;
}

/// Parses `aa:bb:cc:dd:ee:ff`, `aa-bb-..`, `aabb.ccdd.eeff` or twelve
/// contiguous hex digits.
pub fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let digits: String = mac
        .trim()
        .chars()
        .filter(|c| !matches!(*c, ':' | '-' | '.'))
        .collect();

    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(bytes)
}

pub fn magic_packet(mac: [u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0u8; MAGIC_PACKET_LEN];
    packet[..SYNC_STREAM.len()].copy_from_slice(&SYNC_STREAM);
    for chunk in packet[SYNC_STREAM.len()..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// Broadcasts magic packets over UDP from an ephemeral socket
#[derive(Debug, Clone)]
pub struct UdpDispatcher {
    target: SocketAddr,
}

impl UdpDispatcher {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    async fn transmit(&self, mac_address: &str) -> std::io::Result<()> {
        let mac = parse_mac(mac_address).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("malformed MAC address '{}'", mac_address),
            )
        })?;
        let packet = magic_packet(mac);

        let bind_addr: SocketAddr = if self.target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        let sent = socket.send_to(&packet, self.target).await?;
        debug!("Sent {} byte magic packet to {}", sent, self.target);
        Ok(())
    }
}

#[async_trait]
impl WakeDispatcher for UdpDispatcher {
    async fn send(&self, mac_address: &str) -> Result<()> {
        match self.transmit(mac_address).await {
            Ok(()) => {
                WAKE_PACKETS_TOTAL.inc();
                info!("Magic packet sent to {} via {}", mac_address, self.target);
                Ok(())
            }
            Err(e) => {
                WAKE_FAILURES_TOTAL.inc();
                error!("Failed to send WOL packet to {}: {}", mac_address, e);
                Err(Error::Dispatch(e.to_string()))
            }
        }
    }
}
