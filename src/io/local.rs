use super::ReadAt;
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Local file reader with random access support
pub struct LocalFileReader {
    #[cfg(any(unix, windows))]
    file: std::fs::File,
    #[cfg(not(any(unix, windows)))]
    file: std::sync::Mutex<std::fs::File>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            ));
        }

        #[cfg(not(any(unix, windows)))]
        let file = std::sync::Mutex::new(file);

        Ok(Self {
            file,
            size: metadata.len(),
        })
    }

    /// A single positional read, possibly short.
    fn read_once(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file.seek_read(buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self
                .file
                .lock()
                .map_err(|_| io::Error::other("file lock poisoned"))?;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        // Positional reads may return early; keep going until EOF.
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_once(offset + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
