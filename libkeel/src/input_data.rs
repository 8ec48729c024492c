//! Ownership of input file bytes. Files are registered in the order we ingest
//! them and torn down in the reverse order, so that buffers created from other
//! buffers (e.g. objects extracted from archives, or the file synthesised
//! around a binary blob) are always freed before their parents.

use crate::error::Context as _;
use crate::error::Result;
use memmap2::Mmap;
use std::cell::RefCell;
use std::fmt::Display;
use std::ops::Deref;
use std::path::Path;

/// Identifies an ingested input file by its position in the link context's
/// file pool.
#[derive(derive_more::Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("file-{_0}")]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub(crate) const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Identifies an input object that may not be a regular file on disk, or may
/// be an entry in an archive.
#[derive(Clone, Copy)]
pub struct InputRef<'data> {
    /// The display identifier, usually a file path. Empty for files we
    /// synthesised ourselves.
    pub name: &'data [u8],

    /// Set when the file was extracted from an archive.
    pub archive_name: Option<&'data [u8]>,

    pub data: &'data [u8],
}

impl<'data> InputRef<'data> {
    pub fn new(name: &'data [u8], data: &'data [u8]) -> Self {
        Self {
            name,
            archive_name: None,
            data,
        }
    }

    pub fn with_archive_name(self, archive_name: Option<&'data [u8]>) -> Self {
        Self {
            archive_name,
            ..self
        }
    }

    /// The path component after the final separator. Shared objects without a
    /// DT_SONAME are identified by this.
    pub(crate) fn basename(&self) -> &'data [u8] {
        match memchr::memrchr(b'/', self.name) {
            Some(pos) => &self.name[pos + 1..],
            None => self.name,
        }
    }
}

impl Display for InputRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            return Display::fmt("(internal)", f);
        }
        if let Some(archive_name) = self.archive_name {
            write!(
                f,
                "{}({})",
                String::from_utf8_lossy(archive_name),
                String::from_utf8_lossy(self.name)
            )
        } else {
            Display::fmt(&String::from_utf8_lossy(self.name), f)
        }
    }
}

impl std::fmt::Debug for InputRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// A memory-mapped input file.
#[derive(Debug)]
pub struct FileData {
    bytes: Mmap,
}

impl FileData {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open input file `{}`", path.display()))?;

        // Safety: Unfortunately, this is a bit of a compromise. Basically this
        // is only safe if our users manage to avoid editing the input files
        // while we've got them mapped. It'd be great if there were a way to
        // protect against unsoundness when the input files were modified
        // externally, but there isn't - at least on Linux. Not only could the
        // bytes change without notice, but the mapped file could be truncated
        // causing any access to result in a SIGBUS.
        //
        // For our use case, mmap just has too many advantages. There are
        // likely large parts of our input files that we don't need to read, so
        // reading all our input files up front isn't really an option.
        let bytes = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap input file `{}`", path.display()))?;

        Ok(FileData { bytes })
    }
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

/// Receives copies of inputs that were read from outside the original
/// command-line set, e.g. members referenced by thin archives, so that the
/// driver can assemble a reproducer.
pub trait Reproducer {
    fn add_file(&mut self, path: &Path, data: &[u8]);
}

#[derive(Debug)]
enum OwnedBuffer {
    Mapped(FileData),
    Bytes(Box<[u8]>),
    #[cfg(test)]
    Probe(tests::DropProbe),
}

/// A process-wide append-only pool that owns the bytes of every ingested file.
///
/// Buffers are never dropped or mutated while the registry is alive, and both
/// variants store their bytes behind a stable heap allocation, which is what
/// makes it sound to hand out slices that borrow from the registry itself
/// while continuing to append.
#[derive(Default, Debug)]
pub struct FileRegistry {
    buffers: RefCell<Vec<OwnedBuffer>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a mapped file and returns a view of its contents.
    pub fn add_file_data(&self, data: FileData) -> &[u8] {
        let slice: *const [u8] = &*data;
        self.buffers.borrow_mut().push(OwnedBuffer::Mapped(data));
        // SAFETY: The mapping lives until the registry is dropped and the
        // pointed-to pages don't move when `buffers` reallocates.
        unsafe { &*slice }
    }

    /// Takes ownership of a byte vector (e.g. a synthesised ELF file) and
    /// returns a view of its contents.
    pub fn add_bytes(&self, bytes: Vec<u8>) -> &[u8] {
        let boxed = bytes.into_boxed_slice();
        let slice: *const [u8] = &*boxed;
        self.buffers.borrow_mut().push(OwnedBuffer::Bytes(boxed));
        // SAFETY: As for `add_file_data`; the boxed slice's storage is stable.
        unsafe { &*slice }
    }

    /// Maps the file at `path` and registers the mapping.
    pub fn open_file(&self, path: &Path) -> Result<&[u8]> {
        Ok(self.add_file_data(FileData::new(path)?))
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.borrow().len()
    }
}

impl Drop for FileRegistry {
    fn drop(&mut self) {
        // Buffers are freed in reverse order so that buffers created from
        // other buffers are freed before their parents.
        let mut buffers = self.buffers.borrow_mut();
        while buffers.pop().is_some() {}
    }
}
