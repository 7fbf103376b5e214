//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all members
//! 4. For a member's content, read its Local File Header to find the data
//!
//! Nothing here needs sequential access to the container, so the same code
//! serves local files, in-memory buffers and HTTP Range requests.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use crate::error::{ArchiveError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Location of the central directory, from the classic or ZIP64 EOCD.
#[derive(Debug, Clone, Copy)]
struct DirectoryLocation {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type to support local files, memory buffers and
/// HTTP sources. Errors raised while locating or parsing the central
/// directory are reported as [`ArchiveError::Unreadable`] against `label`.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
    /// Path or URL used in error messages
    label: String,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>, label: impl Into<String>) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            label: label.into(),
        }
    }

    fn unreadable(&self, reason: impl ToString) -> ArchiveError {
        ArchiveError::unreadable(self.label.clone(), reason)
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// Returns the EOCD record and its offset in the file.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(self.unreadable("not a valid ZIP file"));
        }

        // Common case first: no archive comment.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader
            .read_exact_at(offset, &mut buf)
            .await
            .map_err(|e| self.unreadable(e))?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf).map_err(|e| self.unreadable(e))?;
            return Ok((eocd, offset));
        }

        // The EOCD sits earlier when the archive carries a comment.
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader
            .read_exact_at(search_start, &mut buf)
            .await
            .map_err(|e| self.unreadable(e))?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            // The comment length must account for exactly the trailing bytes.
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd = EndOfCentralDirectory::from_bytes(
                    &buf[i..i + EndOfCentralDirectory::SIZE],
                )
                .map_err(|e| self.unreadable(e))?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        Err(self.unreadable("not a valid ZIP file"))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has fields saturated to 0xFFFF or
    /// 0xFFFFFFFF.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The locator sits immediately before the regular EOCD
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| self.unreadable("missing ZIP64 locator"))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await
            .map_err(|e| self.unreadable(e))?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf).map_err(|e| self.unreadable(e))?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await
            .map_err(|e| self.unreadable(e))?;

        Zip64EOCD::from_bytes(&eocd64_buf).map_err(|e| self.unreadable(e))
    }

    async fn locate_directory(&self) -> Result<DirectoryLocation> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let location = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            DirectoryLocation {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            }
        } else {
            DirectoryLocation {
                offset: u64::from(eocd.cd_offset),
                size: u64::from(eocd.cd_size),
                entries: u64::from(eocd.total_entries),
            }
        };

        let end = location.offset.checked_add(location.size);
        if end.is_none_or(|end| end > self.size) {
            return Err(self.unreadable("central directory extends past end of file"));
        }
        if location.entries > location.size / CDFH_MIN_SIZE as u64 {
            return Err(self.unreadable(format!(
                "central directory of {} bytes cannot hold {} entries",
                location.size, location.entries
            )));
        }

        Ok(location)
    }

    /// List all members of the archive in central directory order.
    pub async fn list_members(&self) -> Result<Vec<ArchiveMember>> {
        let location = self.locate_directory().await?;

        // One read for the whole directory: a single Range request over HTTP.
        let mut cd_data = vec![0u8; location.size as usize];
        self.reader
            .read_exact_at(location.offset, &mut cd_data)
            .await
            .map_err(|e| self.unreadable(e))?;

        let mut members = Vec::with_capacity(location.entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..location.entries {
            let member = parse_cdfh(&mut cursor)
                .map_err(|e| self.unreadable(format!("central directory entry {index}: {e}")))?;
            members.push(member);
        }

        Ok(members)
    }

    /// Get the offset of a member's stored data.
    ///
    /// The Local File Header has its own variable-length fields which may
    /// differ from the central directory's copy, so it has to be read.
    pub async fn data_offset(&self, member: &ArchiveMember) -> io::Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(member.lfh_offset, &mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid local file header",
            ));
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_field_length = u64::from(cursor.read_u16::<LittleEndian>()?);

        Ok(member.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Parse one Central Directory File Header at the cursor position.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> io::Result<ArchiveMember> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid central directory file header",
        ));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let mut uncompressed_size = u64::from(cursor.read_u32::<LittleEndian>()?);
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Package tools do not always set the UTF-8 flag; keep the entry anyway.
    let name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    let is_directory = ArchiveMember::names_directory(&name);

    let extra_field_end = cursor.position() + u64::from(extra_field_length);

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = cursor.position() + u64::from(field_size);

        if header_id == 0x0001 {
            // ZIP64 extended information: a value is present only when the
            // header field is saturated, in this fixed order.
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    let entry_end = extra_field_end + u64::from(file_comment_length);
    if entry_end > cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "central directory entry runs past the directory",
        ));
    }
    cursor.set_position(entry_end);

    Ok(ArchiveMember {
        name,
        is_directory,
        compression: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
    })
}
