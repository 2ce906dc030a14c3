//! Register read/write tracking for ABI classification.
//!
//! Each register carries a two-bit lattice: `READ_ORIG` records that the
//! value the register held on function entry was observed, `WRITE` that the
//! register was assigned. A read after a write is an ordinary read and does
//! not set `READ_ORIG`; that distinction is what makes entry-block liveness
//! usable as an argument classifier.

use bitflags::bitflags;

bitflags! {
    /// Per-register usage status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Usage: u8 {
        /// The entry value was read before any write.
        const READ_ORIG = 0b01;
        /// The register was written.
        const WRITE = 0b10;
    }
}

/// Usage status over the guest register files.
///
/// GPR/FPR/VR feed the ABI classifier; the condition register fields and
/// LR/CTR/XER are tracked for completeness but never influence a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUsage {
    pub gpr: [Usage; 32],
    pub fpr: [Usage; 32],
    pub vr: [Usage; 32],
    pub cr: [Usage; 8],
    pub lr: Usage,
    pub ctr: Usage,
    pub xer: Usage,
}

impl Default for RegisterUsage {
    fn default() -> Self {
        Self {
            gpr: [Usage::empty(); 32],
            fpr: [Usage::empty(); 32],
            vr: [Usage::empty(); 32],
            cr: [Usage::empty(); 8],
            lr: Usage::empty(),
            ctr: Usage::empty(),
            xer: Usage::empty(),
        }
    }
}

fn read(status: &mut Usage) {
    if !status.contains(Usage::WRITE) {
        *status |= Usage::READ_ORIG;
    }
}

fn write(status: &mut Usage) {
    *status |= Usage::WRITE;
}

impl RegisterUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_gpr(&mut self, reg: usize) {
        read(&mut self.gpr[reg]);
    }

    pub fn write_gpr(&mut self, reg: usize) {
        write(&mut self.gpr[reg]);
    }

    pub fn read_fpr(&mut self, reg: usize) {
        read(&mut self.fpr[reg]);
    }

    pub fn write_fpr(&mut self, reg: usize) {
        write(&mut self.fpr[reg]);
    }

    pub fn read_vr(&mut self, reg: usize) {
        read(&mut self.vr[reg]);
    }

    pub fn write_vr(&mut self, reg: usize) {
        write(&mut self.vr[reg]);
    }

    pub fn read_cr(&mut self, field: usize) {
        read(&mut self.cr[field]);
    }

    pub fn write_cr(&mut self, field: usize) {
        write(&mut self.cr[field]);
    }

    pub fn read_lr(&mut self) {
        read(&mut self.lr);
    }

    pub fn write_lr(&mut self) {
        write(&mut self.lr);
    }

    pub fn read_ctr(&mut self) {
        read(&mut self.ctr);
    }

    pub fn write_ctr(&mut self) {
        write(&mut self.ctr);
    }

    pub fn read_xer(&mut self) {
        read(&mut self.xer);
    }

    pub fn write_xer(&mut self) {
        write(&mut self.xer);
    }

    /// Read of an SPR by number; only LR, CTR and XER are tracked.
    pub fn read_spr(&mut self, spr: u32) {
        match spr {
            1 => self.read_xer(),
            8 => self.read_lr(),
            9 => self.read_ctr(),
            _ => {}
        }
    }

    /// Write of an SPR by number; only LR, CTR and XER are tracked.
    pub fn write_spr(&mut self, spr: u32) {
        match spr {
            1 => self.write_xer(),
            8 => self.write_lr(),
            9 => self.write_ctr(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_write_marks_entry_liveness() {
        let mut usage = RegisterUsage::new();
        usage.read_gpr(3);
        usage.write_gpr(3);
        assert_eq!(usage.gpr[3], Usage::READ_ORIG | Usage::WRITE);
    }

    #[test]
    fn read_after_write_is_ordinary() {
        let mut usage = RegisterUsage::new();
        usage.write_gpr(4);
        usage.read_gpr(4);
        assert_eq!(usage.gpr[4], Usage::WRITE);
    }

    #[test]
    fn untracked_sprs_are_ignored() {
        let mut usage = RegisterUsage::new();
        usage.write_spr(287); // PVR
        assert_eq!(usage, RegisterUsage::new());
    }
}
