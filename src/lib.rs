//! # apkarch
//!
//! Report which instruction set and word size each native library inside an
//! application package targets.
//!
//! Package archives usually keep native code under directories named after
//! an ABI (`lib/armeabi`, `lib/x86`), but those names are only a convention.
//! This crate reads the ELF header of every member instead.
//!
//! ## Features
//!
//! - Read ZIP-based packages (APK, AAR, JAR) from disk, memory or HTTP
//! - ZIP64, STORED and DEFLATE members, with CRC-32 verification
//! - Endian-aware ELF header classification
//! - Corrupt members are skipped without losing the rest of the package
//!
//! ARM ABI revisions share one ELF machine code and are reported as `ARM`.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use apkarch::{InspectOptions, PackageInspector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let inspector = PackageInspector::new(InspectOptions::default());
//!     let report = inspector.inspect_path(Path::new("app.apk")).await?;
//!     for lib in &report.libraries {
//!         println!("{}\t{}\t{}", lib.name, lib.word_size, lib.machine);
//!     }
//!     println!("{} Library files", report.count());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod elf;
pub mod error;
pub mod inspect;
pub mod io;
#[doc(hidden)]
pub mod test_utils;
pub mod zip;

pub use cli::Cli;
pub use elf::{Classification, MachineKind, WordSize, classify};
pub use error::ArchiveError;
pub use inspect::{
    InspectOptions, InspectionReport, LibraryEntry, PackageInspector, PackageSource,
    SkippedMember,
};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ArchiveMember, ZipArchive};
