//! Art-Net protocol implementation (Art-Net 4)
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use lightminion_core::{Frame, UniverseId, UNIVERSE_SIZE};

use super::DmxSink;
use crate::{error::ControlError, Result};

const ARTNET_HEADER: &[u8; 8] = b"Art-Net\0";
const OP_POLL: u16 = 0x2000;
const OP_POLL_REPLY: u16 = 0x2100;
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;
/// Highest 15-bit Port-Address
const MAX_PORT_ADDRESS: u16 = 0x7FFF;
/// Upper bound on datagrams handled per readiness notification
const MAX_DRAIN: usize = 64;

/// Art-Net sender for outputting DMX data
pub struct ArtNetSender {
    socket: UdpSocket,
    target: SocketAddr,
    sequences: HashMap<UniverseId, u8>,
}

impl ArtNetSender {
    /// Create a new Art-Net sender
    ///
    /// # Arguments
    /// * `target` - Destination address (typically "255.255.255.255:6454")
    pub fn new(target: &str) -> Result<Self> {
        let target: SocketAddr = target.parse().map_err(|e| {
            ControlError::DmxError(format!("Invalid Art-Net target address: {}", e))
        })?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        tracing::info!("Art-Net sender created -> {}", target);

        Ok(Self {
            socket,
            target,
            sequences: HashMap::new(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Next sequence number for a universe (1-255; 0 disables sequencing)
    fn next_sequence(&mut self, universe: UniverseId) -> u8 {
        let sequence = self.sequences.entry(universe).or_insert(0);
        *sequence = if *sequence == u8::MAX { 1 } else { *sequence + 1 };
        *sequence
    }

    /// Build an Art-Net DMX packet (OpDmx)
    fn build_artnet_packet(port_address: u16, sequence: u8, channels: &Frame) -> Vec<u8> {
        let mut packet = vec![0u8; 18 + UNIVERSE_SIZE];

        // Header: "Art-Net\0"
        packet[0..8].copy_from_slice(ARTNET_HEADER);

        // OpCode: OpDmx (0x5000)
        packet[8..10].copy_from_slice(&OP_DMX.to_le_bytes());

        // Protocol version (14)
        packet[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());

        packet[12] = sequence;

        // Physical (0)
        packet[13] = 0;

        // Universe (Port-Address)
        packet[14..16].copy_from_slice(&port_address.to_le_bytes());

        // Length (512 channels, big-endian)
        packet[16..18].copy_from_slice(&(UNIVERSE_SIZE as u16).to_be_bytes());

        // DMX data
        packet[18..].copy_from_slice(channels);

        packet
    }

    fn opcode(packet: &[u8]) -> Option<u16> {
        if packet.len() < 10 || &packet[0..8] != ARTNET_HEADER {
            return None;
        }
        Some(u16::from_le_bytes([packet[8], packet[9]]))
    }
}

impl DmxSink for ArtNetSender {
    fn send_frame(&mut self, universe: UniverseId, frame: &Frame) -> Result<()> {
        let port_address = universe.get();
        if port_address > MAX_PORT_ADDRESS {
            return Err(ControlError::DmxError(format!(
                "Invalid Art-Net universe: {} (must be 1-{})",
                port_address, MAX_PORT_ADDRESS
            )));
        }

        let sequence = self.next_sequence(universe);
        let packet = Self::build_artnet_packet(port_address, sequence, frame);
        self.socket.send_to(&packet, self.target)?;

        tracing::trace!("Sent Art-Net DMX packet for universe {}", universe);
        Ok(())
    }

    fn poll_ready(&mut self) -> Result<bool> {
        let mut peek = [0u8; 1];
        match self.socket.peek_from(&mut peek) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn socket_ready(&mut self) -> Result<()> {
        let mut buf = [0u8; 1024];
        for _ in 0..MAX_DRAIN {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            };
            match Self::opcode(&buf[..len]) {
                Some(OP_POLL) => tracing::trace!("ArtPoll from {}", from),
                Some(OP_POLL_REPLY) => tracing::trace!("ArtPollReply from {}", from),
                Some(op) => tracing::trace!("Art-Net opcode {:#06x} from {}", op, from),
                None => tracing::trace!("Ignoring {} byte datagram from {}", len, from),
            }
        }
        Ok(())
    }
}
