//! sACN (E1.31) protocol implementation
//!
//! sACN (Streaming ACN) is a protocol for transmitting DMX512 over IP multicast.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use uuid::Uuid;

use lightminion_core::{Frame, UniverseId, UNIVERSE_SIZE};

use super::DmxSink;
use crate::{error::ControlError, Result};

const SACN_PORT: u16 = 5568;
const PACKET_SIZE: usize = 638;
const MAX_UNIVERSE: u16 = 63999;
const ACN_PACKET_IDENTIFIER: [u8; 12] = [
    0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
];

/// sACN sender for outputting DMX data
pub struct SacnSender {
    socket: UdpSocket,
    sequences: HashMap<UniverseId, u8>,
    priority: u8,
    source_name: String,
    cid: [u8; 16], // Component ID (UUID)
}

impl SacnSender {
    /// Create a new sACN sender
    ///
    /// # Arguments
    /// * `source_name` - Source name (up to 63 bytes are transmitted)
    pub fn new(source_name: &str) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_multicast_loop_v4(false)?;
        socket.set_nonblocking(true)?;

        // Generate a UUID for this component
        let cid = *Uuid::new_v4().as_bytes();

        tracing::info!("sACN sender created ({})", source_name);

        Ok(Self {
            socket,
            sequences: HashMap::new(),
            priority: 100, // Default priority
            source_name: source_name.to_string(),
            cid,
        })
    }

    /// Set the priority (0-200, default 100)
    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority.min(200);
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Multicast group for a universe: 239.255.hi.lo
    pub fn multicast_addr(universe: UniverseId) -> SocketAddrV4 {
        let [hi, lo] = universe.get().to_be_bytes();
        SocketAddrV4::new(Ipv4Addr::new(239, 255, hi, lo), SACN_PORT)
    }

    fn next_sequence(&mut self, universe: UniverseId) -> u8 {
        let sequence = self.sequences.entry(universe).or_insert(u8::MAX);
        *sequence = sequence.wrapping_add(1);
        *sequence
    }

    /// Build an sACN packet
    fn build_sacn_packet(&self, universe: u16, sequence: u8, channels: &Frame) -> Vec<u8> {
        let mut packet = vec![0u8; PACKET_SIZE]; // Full E1.31 packet size

        // Root Layer
        let mut offset = 0;

        // Preamble Size (16-bit)
        packet[offset..offset + 2].copy_from_slice(&0x0010u16.to_be_bytes());
        offset += 2;

        // Post-amble Size (16-bit)
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        packet[offset..offset + 12].copy_from_slice(&ACN_PACKET_IDENTIFIER);
        offset += 12;

        // Flags and Length (16-bit): 0x7000 | (638 - 16)
        let root_length = PACKET_SIZE - 16;
        packet[offset..offset + 2].copy_from_slice(&(0x7000u16 | root_length as u16).to_be_bytes());
        offset += 2;

        // Vector (32-bit): VECTOR_ROOT_E131_DATA (0x00000004)
        packet[offset..offset + 4].copy_from_slice(&0x00000004u32.to_be_bytes());
        offset += 4;

        // CID (16 bytes)
        packet[offset..offset + 16].copy_from_slice(&self.cid);
        offset += 16;

        // Framing Layer
        // Flags and Length (16-bit): 0x7000 | (638 - 38)
        let framing_length = PACKET_SIZE - 38;
        packet[offset..offset + 2]
            .copy_from_slice(&(0x7000u16 | framing_length as u16).to_be_bytes());
        offset += 2;

        // Vector (32-bit): VECTOR_E131_DATA_PACKET (0x00000002)
        packet[offset..offset + 4].copy_from_slice(&0x00000002u32.to_be_bytes());
        offset += 4;

        // Source Name (64 bytes, null-terminated)
        let source_bytes = self.source_name.as_bytes();
        let copy_len = source_bytes.len().min(63);
        packet[offset..offset + copy_len].copy_from_slice(&source_bytes[..copy_len]);
        offset += 64;

        packet[offset] = self.priority;
        offset += 1;

        // Synchronization Address (16-bit) - 0 for no sync
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        packet[offset] = sequence;
        offset += 1;

        // Options (1 byte) - 0 for none
        packet[offset] = 0;
        offset += 1;

        packet[offset..offset + 2].copy_from_slice(&universe.to_be_bytes());
        offset += 2;

        // DMP Layer
        // Flags and Length (16-bit): 0x7000 | (638 - 115)
        let dmp_length = PACKET_SIZE - 115;
        packet[offset..offset + 2].copy_from_slice(&(0x7000u16 | dmp_length as u16).to_be_bytes());
        offset += 2;

        // Vector (1 byte): VECTOR_DMP_SET_PROPERTY (0x02)
        packet[offset] = 0x02;
        offset += 1;

        // Address Type & Data Type (1 byte): 0xa1
        packet[offset] = 0xa1;
        offset += 1;

        // First Property Address (16-bit): 0x0000
        packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
        offset += 2;

        // Address Increment (16-bit): 0x0001
        packet[offset..offset + 2].copy_from_slice(&0x0001u16.to_be_bytes());
        offset += 2;

        // Property value count (16-bit): 513 (start code + 512 channels)
        packet[offset..offset + 2].copy_from_slice(&(UNIVERSE_SIZE as u16 + 1).to_be_bytes());
        offset += 2;

        // DMX Start Code (1 byte): 0x00
        packet[offset] = 0x00;
        offset += 1;

        packet[offset..offset + UNIVERSE_SIZE].copy_from_slice(channels);

        packet
    }
}

impl DmxSink for SacnSender {
    fn send_frame(&mut self, universe: UniverseId, frame: &Frame) -> Result<()> {
        if universe.get() > MAX_UNIVERSE {
            return Err(ControlError::DmxError(format!(
                "Invalid sACN universe: {} (must be 1-{})",
                universe, MAX_UNIVERSE
            )));
        }

        let sequence = self.next_sequence(universe);
        let packet = self.build_sacn_packet(universe.get(), sequence, frame);
        self.socket.send_to(&packet, Self::multicast_addr(universe))?;

        tracing::trace!("Sent sACN DMX packet for universe {}", universe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uni(id: u16) -> UniverseId {
        UniverseId::new(id).unwrap()
    }

    #[test]
    fn test_sacn_sender_creation() {
        assert!(SacnSender::new("LightMinion").is_ok());
    }

    #[test]
    fn test_invalid_universe() {
        let mut sender = SacnSender::new("LightMinion").unwrap();
        assert!(sender.send_frame(uni(64000), &[0u8; 512]).is_err());
    }

    #[test]
    fn test_sacn_packet_structure() {
        let sender = SacnSender::new("LightMinion").unwrap();
        let mut channels = [0u8; 512];
        channels[0] = 42;
        let packet = sender.build_sacn_packet(7, 3, &channels);

        assert_eq!(packet.len(), 638);
        assert_eq!(&packet[4..16], &ACN_PACKET_IDENTIFIER);
        assert_eq!(&packet[44..55], b"LightMinion");
        // Sequence, universe, start code, first channel
        assert_eq!(packet[111], 3);
        assert_eq!(&packet[113..115], &[0, 7]);
        assert_eq!(packet[125], 0x00);
        assert_eq!(packet[126], 42);
    }

    #[test]
    fn test_priority_setting() {
        let mut sender = SacnSender::new("LightMinion").unwrap();
        sender.set_priority(150);
        let packet = sender.build_sacn_packet(1, 0, &[0u8; 512]);
        // Priority is at offset 108
        assert_eq!(packet[108], 150);

        sender.set_priority(255);
        assert_eq!(sender.priority(), 200);
    }

    #[test]
    fn test_sequence_per_universe() {
        let mut sender = SacnSender::new("LightMinion").unwrap();
        assert_eq!(sender.next_sequence(uni(1)), 0);
        assert_eq!(sender.next_sequence(uni(1)), 1);
        assert_eq!(sender.next_sequence(uni(9)), 0);
    }

    #[test]
    fn test_multicast_addr() {
        assert_eq!(
            SacnSender::multicast_addr(uni(1)).to_string(),
            "239.255.0.1:5568"
        );
        assert_eq!(
            SacnSender::multicast_addr(uni(258)).to_string(),
            "239.255.1.2:5568"
        );
    }
}
