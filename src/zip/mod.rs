//! ZIP container reading.
//!
//! Package archives (APK, AAR, JAR) are ZIP containers. This module walks
//! the container and hands out each member's content as an owned buffer.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`reader`]: [`ZipArchive`], the handle used to list and read members
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first, then the Central Directory. Members are only
//! read when asked for, each one through its Local File Header.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED (no compression) and DEFLATE methods
//! - CRC-32 and length verification of every member read
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod parser;
mod reader;
mod structures;

pub use parser::ZipParser;
pub use reader::ZipArchive;
pub use structures::*;
