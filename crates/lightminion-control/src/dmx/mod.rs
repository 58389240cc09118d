//! DMX output system
//!
//! A [`DmxSink`] transmits one universe frame at a time. Two network sinks
//! are provided:
//!
//! ## Art-Net
//!
//! Art-Net is a UDP broadcast protocol for DMX transmission over Ethernet.
//! - Uses UDP broadcast (255.255.255.255:6454) or unicast to a node
//! - Includes per-universe sequence numbering
//! - Nodes may talk back (ArtPoll, ArtPollReply); those packets are drained
//!   when the socket becomes readable
//!
//! ## sACN (E1.31)
//!
//! sACN (Streaming ACN) is a multicast protocol for DMX transmission.
//! - Uses IP multicast (239.255.x.x:5568)
//! - Supports universes 1-63999
//! - Includes priority
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lightminion_control::dmx::{ArtNetSender, DmxSink};
//! use lightminion_core::UniverseId;
//!
//! # fn main() -> lightminion_control::Result<()> {
//! let mut sender = ArtNetSender::new("255.255.255.255:6454")?;
//! let mut frame = [0u8; 512];
//! frame[0] = 255;
//! sender.send_frame(UniverseId::new(1)?, &frame)?;
//! # Ok(())
//! # }
//! ```

pub mod artnet;
pub mod sacn;

pub use artnet::ArtNetSender;
pub use sacn::SacnSender;

use lightminion_core::{Frame, OutputConfig, Protocol, UniverseId};

use crate::Result;

/// Destination for universe frames
pub trait DmxSink: Send {
    /// Transmit the full frame of one universe
    fn send_frame(&mut self, universe: UniverseId, frame: &Frame) -> Result<()>;

    /// Non-blocking check whether the sink's socket has incoming data.
    fn poll_ready(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Handle a readable socket. Only called after `poll_ready` returned true.
    fn socket_ready(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DmxSink for Box<dyn DmxSink> {
    fn send_frame(&mut self, universe: UniverseId, frame: &Frame) -> Result<()> {
        (**self).send_frame(universe, frame)
    }

    fn poll_ready(&mut self) -> Result<bool> {
        (**self).poll_ready()
    }

    fn socket_ready(&mut self) -> Result<()> {
        (**self).socket_ready()
    }
}

/// Create the sink described by the output configuration
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn DmxSink>> {
    Ok(match config.protocol {
        Protocol::ArtNet => Box::new(ArtNetSender::new(&config.target)?),
        Protocol::Sacn => {
            let mut sender = SacnSender::new(&config.source_name)?;
            sender.set_priority(config.priority);
            Box::new(sender)
        }
    })
}
