use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{ArchiveMember, CompressionMethod};

/// An opened ZIP container with its central directory already parsed.
///
/// The data source is held behind an [`Arc`] and released when the last
/// handle is dropped, whatever path the caller leaves by.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    members: Vec<ArchiveMember>,
}

impl ZipArchive<LocalFileReader> {
    /// Open a ZIP container on the local filesystem.
    pub async fn open_path(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let reader =
            LocalFileReader::new(path).map_err(|e| ArchiveError::unreadable(label.clone(), e))?;
        Self::open(Arc::new(reader), label).await
    }
}

impl<R: ReadAt> ZipArchive<R> {
    /// Open a container and read its central directory.
    ///
    /// Member data is not touched here; corrupt members surface from
    /// [`read_member`](Self::read_member).
    pub async fn open(reader: Arc<R>, label: impl Into<String>) -> Result<Self> {
        let parser = ZipParser::new(reader, label);
        let members = parser.list_members().await?;
        debug!(archive = parser.label(), members = members.len(), "opened archive");
        Ok(Self { parser, members })
    }

    /// Members in central directory order, duplicates included.
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Path or URL the archive was opened from.
    pub fn label(&self) -> &str {
        self.parser.label()
    }

    /// Decompress one member fully into memory.
    ///
    /// The result is verified against the member's declared uncompressed
    /// length and its stored CRC-32.
    pub async fn read_member(&self, member: &ArchiveMember) -> Result<Vec<u8>> {
        let name = member.name.as_str();

        if let CompressionMethod::Unknown(method) = member.compression {
            return Err(unsupported(member, method));
        }

        let data_offset = self
            .parser
            .data_offset(member)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => ArchiveError::Truncated {
                    name: name.to_owned(),
                    expected: member.compressed_size,
                    actual: 0,
                },
                _ => ArchiveError::corrupt(name, e),
            })?;

        let available = self.parser.reader().size().saturating_sub(data_offset);
        if member.compressed_size > available {
            return Err(ArchiveError::Truncated {
                name: name.to_owned(),
                expected: member.compressed_size,
                actual: available,
            });
        }

        let compressed_len = usize::try_from(member.compressed_size)
            .map_err(|_| ArchiveError::corrupt(name, "member does not fit in memory"))?;
        let mut compressed = vec![0u8; compressed_len];
        let n = self
            .parser
            .reader()
            .read_at(data_offset, &mut compressed)
            .await
            .map_err(|e| ArchiveError::corrupt(name, e))?;
        if n < compressed.len() {
            return Err(ArchiveError::Truncated {
                name: name.to_owned(),
                expected: member.compressed_size,
                actual: n as u64,
            });
        }

        let data = match member.compression {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => inflate(member, &compressed)?,
            CompressionMethod::Unknown(method) => return Err(unsupported(member, method)),
        };

        if data.len() as u64 != member.uncompressed_size {
            return Err(ArchiveError::Truncated {
                name: name.to_owned(),
                expected: member.uncompressed_size,
                actual: data.len() as u64,
            });
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != member.crc32 {
            return Err(ArchiveError::corrupt(
                name,
                format!(
                    "CRC-32 mismatch: stored {:08x}, computed {:08x}",
                    member.crc32,
                    crc.sum()
                ),
            ));
        }

        Ok(data)
    }
}

fn unsupported(member: &ArchiveMember, method: u16) -> ArchiveError {
    ArchiveError::UnsupportedMethod {
        name: member.name.clone(),
        method,
    }
}

/// Upper bound on DEFLATE expansion (258-byte matches from 2-bit codes).
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Inflate a DEFLATE stream, stopping one byte past the declared size.
///
/// The declared size comes from the archive and is not trusted for the
/// up-front reservation. Output past it is a corrupt member, output short of
/// it is left for the caller to report as truncation.
fn inflate(member: &ArchiveMember, compressed: &[u8]) -> Result<Vec<u8>> {
    let declared = member.uncompressed_size;
    let reserve = declared.min((compressed.len() as u64).saturating_mul(MAX_DEFLATE_RATIO));
    let reserve = usize::try_from(reserve)
        .map_err(|_| ArchiveError::corrupt(&member.name, "member does not fit in memory"))?;

    let mut data: Vec<u8> = Vec::new();
    data.try_reserve_exact(reserve)
        .map_err(|e| ArchiveError::corrupt(&member.name, e))?;
    DeflateDecoder::new(compressed)
        .take(declared.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ArchiveError::Truncated {
                name: member.name.clone(),
                expected: declared,
                actual: data.len() as u64,
            },
            _ => ArchiveError::corrupt(&member.name, e),
        })?;

    if data.len() as u64 > declared {
        return Err(ArchiveError::corrupt(
            &member.name,
            format!("inflates past its declared {declared} bytes"),
        ));
    }

    Ok(data)
}
