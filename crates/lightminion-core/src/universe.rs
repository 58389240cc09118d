//! Universe output buffers
//!
//! One 512-slot buffer of 8-bit levels per universe, created lazily the first
//! time a universe is referenced and kept for the life of the process.

use std::collections::BTreeMap;
use std::fmt;

use crate::{error::CoreError, Result};

/// Number of channels in a DMX512 universe
pub const UNIVERSE_SIZE: usize = 512;

/// The full set of channel levels for one universe
pub type Frame = [u8; UNIVERSE_SIZE];

/// Universe identifier (positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniverseId(u16);

impl UniverseId {
    pub fn new(id: u16) -> Result<Self> {
        if id == 0 {
            return Err(CoreError::InvalidUniverse(0));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for UniverseId {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self> {
        let id = u16::try_from(value).map_err(|_| CoreError::InvalidUniverse(value))?;
        Self::new(id)
    }
}

impl From<UniverseId> for u16 {
    fn from(id: UniverseId) -> u16 {
        id.0
    }
}

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based DMX channel address (1-512)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelAddress(u16);

impl ChannelAddress {
    pub fn new(address: u16) -> Result<Self> {
        if address == 0 || address as usize > UNIVERSE_SIZE {
            return Err(CoreError::InvalidAddress(address as i64));
        }
        Ok(Self(address))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// 0-based index into a [`Frame`]
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<i64> for ChannelAddress {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self> {
        let address = u16::try_from(value).map_err(|_| CoreError::InvalidAddress(value))?;
        Self::new(address)
    }
}

/// One channel slot: a universe plus an address within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub universe: UniverseId,
    pub address: ChannelAddress,
}

impl Slot {
    pub fn new(universe: UniverseId, address: ChannelAddress) -> Self {
        Self { universe, address }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.universe, self.address.get())
    }
}

/// Owns the output buffer of every universe seen so far
#[derive(Debug, Default, Clone)]
pub struct UniverseStore {
    universes: BTreeMap<UniverseId, Box<Frame>>,
}

impl UniverseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the buffer for a universe, creating an all-zero one if needed
    pub fn get_or_create(&mut self, universe: UniverseId) -> &mut Frame {
        self.universes.entry(universe).or_insert_with(|| {
            tracing::debug!("Creating buffer for universe {}", universe);
            Box::new([0u8; UNIVERSE_SIZE])
        })
    }

    /// Set a channel level, clamped to 0-255
    pub fn set(&mut self, universe: UniverseId, address: ChannelAddress, value: i64) {
        let level = value.clamp(0, u8::MAX as i64) as u8;
        self.get_or_create(universe)[address.index()] = level;
    }

    /// Write a level into a slot
    pub fn write(&mut self, slot: Slot, level: u8) {
        self.get_or_create(slot.universe)[slot.address.index()] = level;
    }

    /// Current level of a slot (0 for universes never referenced)
    pub fn get(&self, slot: Slot) -> u8 {
        self.universes
            .get(&slot.universe)
            .map(|frame| frame[slot.address.index()])
            .unwrap_or(0)
    }

    /// Read-only view of a universe buffer for transmission
    pub fn snapshot(&self, universe: UniverseId) -> Option<&Frame> {
        self.universes.get(&universe).map(|frame| &**frame)
    }

    /// All universes in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (UniverseId, &Frame)> {
        self.universes.iter().map(|(id, frame)| (*id, &**frame))
    }

    pub fn contains(&self, universe: UniverseId) -> bool {
        self.universes.contains_key(&universe)
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }
}
