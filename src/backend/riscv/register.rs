//! Register allocation
//!
//! No spilling: every pool is a fixed table scanned in lexicographic name
//! order, and the first free register wins. Running out is a compile error.

use std::fmt;

use crate::utils::{Error, Result};

/// The register pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// Caller-saved scratch `t0..t6`
    General,
    /// Caller-saved floating scratch `ft0..ft11`
    Float,
    /// Callee-saved `s1..s11`, for values that must survive a call
    Saved,
    /// Callee-saved floating `fs0..fs11`
    SavedFloat,
}

const GENERAL: [&str; 7] = ["t0", "t1", "t2", "t3", "t4", "t5", "t6"];
const FLOAT: [&str; 12] = [
    "ft0", "ft1", "ft10", "ft11", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "ft8", "ft9",
];
const SAVED: [&str; 11] = ["s1", "s10", "s11", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9"];
const SAVED_FLOAT: [&str; 12] = [
    "fs0", "fs1", "fs10", "fs11", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
];

impl RegisterClass {
    fn names(self) -> &'static [&'static str] {
        match self {
            Self::General => &GENERAL,
            Self::Float => &FLOAT,
            Self::Saved => &SAVED,
            Self::SavedFloat => &SAVED_FLOAT,
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::General => 0,
            Self::Float => 1,
            Self::Saved => 2,
            Self::SavedFloat => 3,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Float => "float",
            Self::Saved => "saved",
            Self::SavedFloat => "saved float",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::SavedFloat)
    }

    /// The callee-saved pool for values of this class
    pub fn saved(self) -> Self {
        if self.is_float() {
            Self::SavedFloat
        } else {
            Self::Saved
        }
    }
}

/// A machine register handed out by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    class: RegisterClass,
    index: usize,
}

impl Register {
    pub fn class(&self) -> RegisterClass {
        self.class
    }

    pub fn name(&self) -> &'static str {
        self.class.names()[self.index]
    }

    pub fn is_float(&self) -> bool {
        self.class.is_float()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset-backed allocator over the four pools
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    in_use: [u16; 4],
    /// Callee-saved registers handed out since the last `take_touched`
    touched: [u16; 4],
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the first free register of `class`
    pub fn alloc(&mut self, class: RegisterClass) -> Result<Register> {
        let slot = class.slot();
        let index = (0..class.names().len())
            .find(|i| self.in_use[slot] & (1 << i) == 0)
            .ok_or(Error::RegisterExhausted { class: class.describe() })?;

        self.in_use[slot] |= 1 << index;
        self.touched[slot] |= 1 << index;
        let reg = Register { class, index };
        log::trace!("alloc {}", reg);
        Ok(reg)
    }

    pub fn free(&mut self, reg: Register) {
        log::trace!("free {}", reg);
        self.in_use[reg.class.slot()] &= !(1 << reg.index);
    }

    #[cfg(test)]
    pub fn is_free(&self, reg: Register) -> bool {
        self.in_use[reg.class.slot()] & (1 << reg.index) == 0
    }

    /// No register of any pool is held
    pub fn all_free(&self) -> bool {
        self.in_use.iter().all(|bits| *bits == 0)
    }

    /// Callee-saved registers used since the last call, in scan order.
    /// Clears the record.
    pub fn take_touched(&mut self) -> Vec<Register> {
        let mut regs = Vec::new();
        for class in [RegisterClass::Saved, RegisterClass::SavedFloat] {
            let slot = class.slot();
            for index in 0..class.names().len() {
                if self.touched[slot] & (1 << index) != 0 {
                    regs.push(Register { class, index });
                }
            }
        }
        self.touched = [0; 4];
        regs
    }
}
