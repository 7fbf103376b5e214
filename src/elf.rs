//! ELF header classification.
//!
//! [`classify`] looks at the fixed-layout identification and header fields of
//! an ELF object and reports its word size and target machine. Anything that
//! is not a well-formed ELF header is [`Classification::NotObject`]; this is
//! data, not an error.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

pub const HEADER_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

pub use constants::*;

mod constants {
    pub const EI_CLASS: usize = 4;
    pub const EI_DATA: usize = 5;
    pub const E_MACHINE: usize = 18;

    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;
    pub const ELFDATA2LSB: u8 = 1;
    pub const ELFDATA2MSB: u8 = 2;

    pub const ELF32_EHDR_SIZE: usize = 52;
    pub const ELF64_EHDR_SIZE: usize = 64;

    pub const EM_386: u16 = 0x03;
    pub const EM_MIPS: u16 = 0x08;
    pub const EM_ARM: u16 = 0x28;
}

/// Addressing model declared by the ELF class byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    fn from_class(class: u8) -> Option<Self> {
        match class {
            ELFCLASS32 => Some(Self::Bits32),
            ELFCLASS64 => Some(Self::Bits64),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }

    fn header_size(self) -> usize {
        match self {
            Self::Bits32 => ELF32_EHDR_SIZE,
            Self::Bits64 => ELF64_EHDR_SIZE,
        }
    }
}

impl fmt::Display for WordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bit", self.bits())
    }
}

/// Instruction-set family from `e_machine`.
///
/// ARM ABI revisions (armeabi, armeabi-v7a) share one code and are not told
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    Arm,
    Intel,
    Mips,
    /// Any other code, kept for diagnostics.
    Unknown(u16),
}

impl MachineKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            EM_ARM => Self::Arm,
            EM_386 => Self::Intel,
            EM_MIPS => Self::Mips,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Arm => EM_ARM,
            Self::Intel => EM_386,
            Self::Mips => EM_MIPS,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arm => f.write_str("ARM"),
            Self::Intel => f.write_str("Intel"),
            Self::Mips => f.write_str("MIPS"),
            Self::Unknown(code) => write!(f, "Unknown ({code:#06x})"),
        }
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NotObject,
    Object {
        word_size: WordSize,
        machine: MachineKind,
    },
}

/// Classify a byte sequence by its ELF header.
///
/// The byte-order field is honoured when reading `e_machine`, so big-endian
/// objects classify correctly.
pub fn classify(bytes: &[u8]) -> Classification {
    if bytes.len() < EI_DATA + 1 || bytes[..4] != HEADER_MAGIC {
        return Classification::NotObject;
    }

    let Some(word_size) = WordSize::from_class(bytes[EI_CLASS]) else {
        return Classification::NotObject;
    };
    if bytes.len() < word_size.header_size() {
        return Classification::NotObject;
    }

    let field = &bytes[E_MACHINE..E_MACHINE + 2];
    let code = match bytes[EI_DATA] {
        ELFDATA2LSB => LittleEndian::read_u16(field),
        ELFDATA2MSB => BigEndian::read_u16(field),
        _ => return Classification::NotObject,
    };

    Classification::Object {
        word_size,
        machine: MachineKind::from_code(code),
    }
}
