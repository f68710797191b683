/*++

Licensed under the Apache-2.0 license.

File Name:

    key_slot.rs

Abstract:

    File contains the AES key slot bookkeeping.

--*/

use tegra_se_error::{SeError, SeResult};

/// Number of hardware AES key slots
pub const NUM_KEY_SLOTS: u32 = 16;

/// Slot holding the Secure Boot Key
pub const SBK_SLOT: u32 = 14;

/// Slot holding the Secure Storage Key
pub const SSK_SLOT: u32 = 15;

/// Slot the suspend sequence generates the Secure Root Key into
pub const SRK_SLOT: u32 = 0;

/// Tracks which AES key slots are owned.
///
/// The SBK and SSK slots start out used and are never handed out or freed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlotTable {
    used: [bool; NUM_KEY_SLOTS as usize],
}

impl Default for KeySlotTable {
    fn default() -> Self {
        let mut used = [false; NUM_KEY_SLOTS as usize];
        used[SBK_SLOT as usize] = true;
        used[SSK_SLOT as usize] = true;
        Self { used }
    }
}

impl KeySlotTable {
    /// Claim the lowest free slot
    pub fn allocate(&mut self) -> SeResult<u32> {
        let slot = self
            .used
            .iter()
            .position(|used| !used)
            .ok_or(SeError::KEY_SLOT_EXHAUSTED)?;
        self.used[slot] = true;
        Ok(slot as u32)
    }

    /// Return a user slot to the pool.
    ///
    /// Out of range indices and the reserved slots are ignored.
    pub fn release(&mut self, slot: u32) {
        if Self::is_reserved(slot) || slot >= NUM_KEY_SLOTS {
            return;
        }
        self.used[slot as usize] = false;
    }

    /// Whether `slot` is currently owned
    pub fn is_used(&self, slot: u32) -> bool {
        self.used.get(slot as usize).copied().unwrap_or(false)
    }

    /// Number of slots available to [`KeySlotTable::allocate`]
    pub fn free_count(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    /// Whether `slot` is the SBK or SSK slot
    pub fn is_reserved(slot: u32) -> bool {
        slot == SBK_SLOT || slot == SSK_SLOT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion() {
        let mut table = KeySlotTable::default();
        let slots: Vec<u32> = (0..14).map(|_| table.allocate().unwrap()).collect();
        assert_eq!(slots, (0..14).collect::<Vec<u32>>());
        assert_eq!(table.allocate(), Err(SeError::KEY_SLOT_EXHAUSTED));

        table.release(5);
        assert_eq!(table.allocate(), Ok(5));
    }

    #[test]
    fn test_reserved_slots_never_released() {
        let mut table = KeySlotTable::default();
        table.release(SBK_SLOT);
        table.release(SSK_SLOT);
        table.release(NUM_KEY_SLOTS);
        assert!(table.is_used(SBK_SLOT));
        assert!(table.is_used(SSK_SLOT));

        for _ in 0..14 {
            let slot = table.allocate().unwrap();
            assert!(!KeySlotTable::is_reserved(slot));
        }
        assert_eq!(table.free_count(), 0);
    }

    #[test]
    fn test_release_unused_slot() {
        let mut table = KeySlotTable::default();
        table.release(3);
        assert_eq!(table.free_count(), 14);
        assert!(!table.is_used(3));
        assert!(!table.is_used(100));
    }
}
