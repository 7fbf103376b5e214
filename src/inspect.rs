//! Per-package orchestration: walk members, classify, collect the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::elf::{Classification, MachineKind, WordSize, classify};
use crate::error::{ArchiveError, Result};
use crate::io::{HttpRangeReader, ReadAt};
use crate::zip::ZipArchive;

/// Default cap on a single member's declared size (512 MiB).
pub const DEFAULT_MAX_MEMBER_SIZE: u64 = 512 * 1024 * 1024;

/// Inspector settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    /// Members declaring more bytes than this are skipped unread.
    pub max_member_size: u64,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            max_member_size: DEFAULT_MAX_MEMBER_SIZE,
        }
    }
}

/// A member recognised as an ELF object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    pub word_size: WordSize,
    pub machine: MachineKind,
}

/// A member that could not be read and was left out of the report.
#[derive(Debug)]
pub struct SkippedMember {
    pub name: String,
    pub error: ArchiveError,
}

/// Outcome of inspecting one package.
#[derive(Debug)]
pub struct InspectionReport {
    /// Path or URL of the package.
    pub source: String,
    /// Object members, in central directory order.
    pub libraries: Vec<LibraryEntry>,
    /// Members skipped because their data could not be read.
    pub skipped: Vec<SkippedMember>,
}

impl InspectionReport {
    fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            libraries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Number of object members found.
    pub fn count(&self) -> usize {
        self.libraries.len()
    }
}

/// Where a package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Path(PathBuf),
    Url(String),
}

impl PackageSource {
    /// Treat `http://` and `https://` arguments as URLs, anything else as a path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_owned())
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Classifies every native object inside a package.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageInspector {
    options: InspectOptions,
}

impl PackageInspector {
    pub fn new(options: InspectOptions) -> Self {
        Self { options }
    }

    /// Inspect a package on the local filesystem.
    pub async fn inspect_path(&self, path: &Path) -> Result<InspectionReport> {
        let archive = ZipArchive::open_path(path).await?;
        self.inspect_archive(&archive).await
    }

    /// Inspect a package served over HTTP with Range support.
    pub async fn inspect_url(&self, url: &str) -> Result<InspectionReport> {
        let reader = HttpRangeReader::new(url.to_owned())
            .await
            .map_err(|e| ArchiveError::unreadable(url, e))?;
        let reader = Arc::new(reader);
        let report = self.inspect(reader.clone(), url).await;
        debug!(%url, transferred = reader.transferred_bytes(), "remote inspection finished");
        report
    }

    pub async fn inspect_source(&self, source: &PackageSource) -> Result<InspectionReport> {
        match source {
            PackageSource::Path(path) => self.inspect_path(path).await,
            PackageSource::Url(url) => self.inspect_url(url).await,
        }
    }

    /// Inspect a package from any random-access source.
    pub async fn inspect<R: ReadAt>(
        &self,
        reader: Arc<R>,
        label: impl Into<String>,
    ) -> Result<InspectionReport> {
        let archive = ZipArchive::open(reader, label).await?;
        self.inspect_archive(&archive).await
    }

    async fn inspect_archive<R: ReadAt>(&self, archive: &ZipArchive<R>) -> Result<InspectionReport> {
        let mut report = InspectionReport::new(archive.label());

        for member in archive.members() {
            if member.is_directory {
                continue;
            }

            let declared = member.uncompressed_size.max(member.compressed_size);
            let data = if declared > self.options.max_member_size {
                Err(ArchiveError::TooLarge {
                    name: member.name.clone(),
                    size: declared,
                    limit: self.options.max_member_size,
                })
            } else {
                archive.read_member(member).await
            };

            let data = match data {
                Ok(data) => data,
                Err(error) => {
                    warn!(archive = archive.label(), member = %member.name, %error, "skipping member");
                    report.skipped.push(SkippedMember {
                        name: member.name.clone(),
                        error,
                    });
                    continue;
                }
            };

            match classify(&data) {
                Classification::Object { word_size, machine } => {
                    debug!(member = %member.name, %word_size, %machine, "found native library");
                    report.libraries.push(LibraryEntry {
                        name: member.name.clone(),
                        word_size,
                        machine,
                    });
                }
                Classification::NotObject => trace!(member = %member.name, "not an object"),
            }
        }

        Ok(report)
    }

    /// Inspect several packages with up to `jobs` of them in flight.
    ///
    /// Results come back in the order of `sources`. A package that cannot be
    /// opened yields its own `Err` and does not affect the others.
    pub async fn inspect_many(
        &self,
        sources: Vec<PackageSource>,
        jobs: usize,
    ) -> Vec<Result<InspectionReport>> {
        let permits = Arc::new(Semaphore::new(jobs.max(1)));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.iter().cloned().enumerate() {
            let inspector = *self;
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = permits.acquire_owned().await;
                (index, inspector.inspect_source(&source).await)
            });
        }

        let mut results: Vec<Option<Result<InspectionReport>>> =
            sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "inspection task failed"),
            }
        }

        results
            .into_iter()
            .zip(&sources)
            .map(|(result, source)| {
                result.unwrap_or_else(|| {
                    Err(ArchiveError::unreadable(source.label(), "inspection task failed"))
                })
            })
            .collect()
    }
}
