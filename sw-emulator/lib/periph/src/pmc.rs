/*++

Licensed under the Apache-2.0 license.

File Name:

    pmc.rs

Abstract:

    File contains the power management controller scratch registers the
    Security Engine driver leaves its suspend state in.

--*/

use tegra_se_emu_bus::{Bus, BusError};
use tegra_se_emu_types::{RvAddr, RvData, RvSize};
use tegra_se_registers::pmc;

const REG_COUNT: usize = (pmc::BANK_SIZE / 4) as usize;

/// PMC register file. Registers hold whatever was last written.
pub struct Pmc {
    regs: Vec<u32>,
}

impl Default for Pmc {
    fn default() -> Self {
        Self::new()
    }
}

impl Pmc {
    pub fn new() -> Self {
        Self {
            regs: vec![0; REG_COUNT],
        }
    }

    /// Four secure scratch words starting at SECURE_SCRATCH4
    pub fn srk_words(&self) -> [u32; 4] {
        let base = (pmc::SECURE_SCRATCH4 / 4) as usize;
        let mut words = [0u32; 4];
        words.copy_from_slice(&self.regs[base..base + 4]);
        words
    }

    pub fn set_srk_words(&mut self, words: [u32; 4]) {
        let base = (pmc::SECURE_SCRATCH4 / 4) as usize;
        self.regs[base..base + 4].copy_from_slice(&words);
    }
}

impl Bus for Pmc {
    fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word || addr >= pmc::BANK_SIZE {
            Err(BusError::LoadAccessFault)?
        }
        if addr % 4 != 0 {
            Err(BusError::LoadAddrMisaligned)?
        }
        Ok(self.regs[(addr / 4) as usize])
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word || addr >= pmc::BANK_SIZE {
            Err(BusError::StoreAccessFault)?
        }
        if addr % 4 != 0 {
            Err(BusError::StoreAddrMisaligned)?
        }
        self.regs[(addr / 4) as usize] = val;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_registers() {
        let mut regs = Pmc::new();
        regs.write(RvSize::Word, pmc::SCRATCH43, 0x8000_1000).unwrap();
        assert_eq!(regs.read(RvSize::Word, pmc::SCRATCH43).unwrap(), 0x8000_1000);

        regs.set_srk_words([1, 2, 3, 4]);
        assert_eq!(regs.read(RvSize::Word, pmc::SECURE_SCRATCH4 + 12).unwrap(), 4);
        assert_eq!(regs.srk_words(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_bad_access() {
        let mut regs = Pmc::new();
        assert_eq!(
            regs.read(RvSize::HalfWord, 0),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!(
            regs.write(RvSize::Word, 2, 0),
            Err(BusError::StoreAddrMisaligned)
        );
        assert_eq!(
            regs.write(RvSize::Word, pmc::BANK_SIZE, 0),
            Err(BusError::StoreAccessFault)
        );
    }
}
