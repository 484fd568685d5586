//! Filesystem capability consumed by the decoder and the tile-set router.
//!
//! The decode layers never touch the filesystem directly. They receive a
//! `TileFs` that opens files by name and returns handles supporting
//! random-access reads. `io::ErrorKind::NotFound` from `open` is the one
//! error the router recovers from; everything else is fatal.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// An open file supporting positioned reads.
///
/// Dropping the handle releases the underlying file descriptor.
pub trait ReadAtFile: Send + Sync {
    /// Read into `buf` starting at `offset`, returning the number of bytes
    /// read. Like `pread`, a single call may return fewer bytes than
    /// requested; 0 means end of file.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Read exactly `buf.len()` bytes at `offset`, or report how many bytes
    /// were available before end of file.
    fn read_full_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut read = 0;
        while read < buf.len() {
            match self.read_at(&mut buf[read..], offset + read as u64)? {
                0 => break,
                n => read += n,
            }
        }
        Ok(read)
    }
}

impl std::fmt::Debug for dyn ReadAtFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReadAtFile")
    }
}

/// Opens files by name.
pub trait TileFs: Send + Sync {
    fn open(&self, filename: &str) -> io::Result<Arc<dyn ReadAtFile>>;
}

/// A `TileFs` rooted at a directory on the local filesystem.
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TileFs for DirFs {
    fn open(&self, filename: &str) -> io::Result<Arc<dyn ReadAtFile>> {
        let file = File::open(self.root.join(filename))?;
        Ok(Arc::new(LocalFile { file }))
    }
}

struct LocalFile {
    file: File,
}

#[cfg(unix)]
impl ReadAtFile for LocalFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&self.file, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAtFile for LocalFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(&self.file, buf, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dir_fs_reads_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        File::create(&path)
            .unwrap()
            .write_all(b"0123456789")
            .unwrap();

        let fs = DirFs::new(dir.path());
        let file = fs.open("data.bin").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(file.read_full_at(&mut buf, 3).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        // Reading past the end reports the short count instead of erroring.
        let mut buf = [0u8; 8];
        assert_eq!(file.read_full_at(&mut buf, 6).unwrap(), 4);
    }

    #[test]
    fn dir_fs_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFs::new(dir.path());
        let err = fs.open("nope.tif").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
