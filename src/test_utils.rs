//! Builders for in-memory packages and ELF headers used by the tests.
//!
//! The ZIP writer is hand-rolled so tests can forge members whose headers
//! disagree with their data.
//!
//! # Panics
//!
//! Functions here panic on I/O errors; they only ever write to a `Vec`.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// Build a minimal ELF header.
///
/// `class` and `data` go into `EI_CLASS` and `EI_DATA` verbatim, so invalid
/// values can be produced. The result is 64 bytes long for class 2 and 52
/// bytes otherwise; `e_machine` is written in the byte order `data` names
/// (big-endian for 2, little-endian for anything else).
#[must_use]
pub fn fake_elf(class: u8, data: u8, machine: u16) -> Vec<u8> {
    let len = if class == 2 { 64 } else { 52 };
    let mut elf = vec![0u8; len];
    elf[..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    elf[4] = class;
    elf[5] = data;
    elf[6] = 1;
    let (e_type, e_machine) = if data == 2 {
        (3u16.to_be_bytes(), machine.to_be_bytes())
    } else {
        (3u16.to_le_bytes(), machine.to_le_bytes())
    };
    elf[16..18].copy_from_slice(&e_type);
    elf[18..20].copy_from_slice(&e_machine);
    elf
}

struct Entry {
    name: String,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    payload: Vec<u8>,
}

/// Writes a ZIP container entry by entry.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
    comment: Vec<u8>,
    zip64: bool,
}

fn crc_of(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

impl ZipBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, method: u16, crc32: u32, size: usize, payload: Vec<u8>) -> Self {
        self.entries.push(Entry {
            name: name.to_owned(),
            method,
            crc32,
            uncompressed_size: u32::try_from(size).unwrap(),
            payload,
        });
        self
    }

    /// A directory entry; `name` should end with `/`.
    #[must_use]
    pub fn directory(self, name: &str) -> Self {
        self.push(name, 0, 0, 0, Vec::new())
    }

    #[must_use]
    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.push(name, 0, crc_of(data), data.len(), data.to_vec())
    }

    #[must_use]
    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.push(name, 8, crc_of(data), data.len(), deflate(data))
    }

    /// A STORED member whose headers claim `declared` bytes for both sizes.
    #[must_use]
    pub fn stored_with_declared_size(self, name: &str, data: &[u8], declared: u32) -> Self {
        self.push(name, 0, crc_of(data), declared as usize, data.to_vec())
    }

    /// A DEFLATE member whose headers claim `declared` uncompressed bytes.
    #[must_use]
    pub fn deflated_with_declared_size(self, name: &str, data: &[u8], declared: u32) -> Self {
        self.push(name, 8, crc_of(data), declared as usize, deflate(data))
    }

    /// A STORED member with the given CRC-32 instead of the real one.
    #[must_use]
    pub fn stored_with_crc(self, name: &str, data: &[u8], crc32: u32) -> Self {
        self.push(name, 0, crc32, data.len(), data.to_vec())
    }

    /// A DEFLATE member whose payload is written as given.
    #[must_use]
    pub fn raw_deflate(self, name: &str, payload: &[u8], declared: u32) -> Self {
        self.push(name, 8, 0, declared as usize, payload.to_vec())
    }

    /// A member tagged with an arbitrary compression method.
    #[must_use]
    pub fn with_method(self, name: &str, data: &[u8], method: u16) -> Self {
        self.push(name, method, crc_of(data), data.len(), data.to_vec())
    }

    #[must_use]
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Locate the central directory through ZIP64 records.
    #[must_use]
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(u32::try_from(out.len()).unwrap());
            out.write_all(b"PK\x03\x04").unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(entry.crc32).unwrap();
            out.write_u32::<LittleEndian>(entry.stored_size()).unwrap();
            out.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(u16::try_from(entry.name.len()).unwrap())
                .unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_all(entry.name.as_bytes()).unwrap();
            out.write_all(&entry.payload).unwrap();
        }

        let cd_offset = out.len();
        for (entry, offset) in self.entries.iter().zip(offsets) {
            out.write_all(b"PK\x01\x02").unwrap();
            out.write_u16::<LittleEndian>(0x031E).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(entry.crc32).unwrap();
            out.write_u32::<LittleEndian>(entry.stored_size()).unwrap();
            out.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(u16::try_from(entry.name.len()).unwrap())
                .unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(offset).unwrap();
            out.write_all(entry.name.as_bytes()).unwrap();
        }
        let cd_size = out.len() - cd_offset;
        let total = self.entries.len();

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.write_all(b"PK\x06\x06").unwrap();
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(total as u64).unwrap();
            out.write_u64::<LittleEndian>(total as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_offset as u64).unwrap();

            out.write_all(b"PK\x06\x07").unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (entries16, size32, offset32) = if self.zip64 {
            (0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (
                u16::try_from(total).unwrap(),
                u32::try_from(cd_size).unwrap(),
                u32::try_from(cd_offset).unwrap(),
            )
        };
        out.write_all(b"PK\x05\x06").unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(entries16).unwrap();
        out.write_u16::<LittleEndian>(entries16).unwrap();
        out.write_u32::<LittleEndian>(size32).unwrap();
        out.write_u32::<LittleEndian>(offset32).unwrap();
        out.write_u16::<LittleEndian>(u16::try_from(self.comment.len()).unwrap())
            .unwrap();
        out.write_all(&self.comment).unwrap();

        out
    }
}

impl Entry {
    fn stored_size(&self) -> u32 {
        // Forged STORED members declare more data than they carry.
        if self.method == 0 {
            self.uncompressed_size.max(u32::try_from(self.payload.len()).unwrap())
        } else {
            u32::try_from(self.payload.len()).unwrap()
        }
    }
}
