use std::fmt;

const SLOT_BITS: u32 = 16;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

/// Largest generation a slot may carry. Identifiers stay non-negative as `i32`, so a slot whose
/// generation reaches this value is retired instead of being reissued.
pub(crate) const MAX_GENERATION: u16 = 0x7fff;

/// Number of slots addressable by an [`InstanceId`].
pub(crate) const MAX_SLOTS: usize = 1 << SLOT_BITS;

/// Opaque identifier of a live instance: `(generation << 16) | slot`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InstanceId(u32);

impl InstanceId {
    pub(crate) fn new(slot: usize, generation: u16) -> Self {
        debug_assert!(slot < MAX_SLOTS);
        debug_assert!(generation <= MAX_GENERATION);
        Self((u32::from(generation) << SLOT_BITS) | (slot as u32 & SLOT_MASK))
    }

    /// Decodes an identifier received from the host. Negative values never name an instance.
    pub fn from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    pub fn as_raw(self) -> i32 {
        // Generations are capped at `MAX_GENERATION`, so the top bit is never set.
        self.0 as i32
    }

    pub(crate) fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }

    pub(crate) fn generation(self) -> u16 {
        (self.0 >> SLOT_BITS) as u16
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}
