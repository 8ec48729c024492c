//! Code to read ar files. We don't use a generic archive reader because we
//! want to borrow the data of each entry and extract members by the offsets
//! stored in the archive's symbol index.

use crate::bail;
use crate::ensure;
use crate::error::Context as _;
use crate::error::Result;
use crate::input_data::FileId;
use crate::input_data::FileRegistry;
use crate::input_data::InputRef;
use crate::input_data::Reproducer;
use crate::symbol_db::SymbolDb;
use crate::timing_phase;
use bytemuck::Pod;
use bytemuck::Zeroable;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt as _;
use std::path::Path;
use std::path::PathBuf;

#[derive(Zeroable, Pod, Clone, Copy)]
#[repr(C)]
struct EntryHeader {
    ident: [u8; 16],
    _timestamp: [u8; 12],
    _owner_id: [u8; 6],
    _group_id: [u8; 6],
    _mode: [u8; 8],
    size: [u8; 10],
    end: [u8; 2],
}

const _ASSERTS: () = {
    assert!(size_of::<EntryHeader>() == 60);
};

const HEADER_SIZE: usize = size_of::<EntryHeader>();

/// One entry of an archive. Callers that need every member (e.g.
/// --whole-archive) iterate these; lazy loading goes through the symbol
/// index instead.
pub enum ArchiveEntry<'data> {
    /// The archive's symbol index: names mapped to member header offsets.
    SymbolIndex { data: &'data [u8], wide: bool },

    /// The extended filenames table ("//").
    Filenames(ExtendedFilenames<'data>),

    /// A member stored inline in the archive.
    Regular(ArchiveContent<'data>),

    /// A member of a thin archive, referencing a file on disk.
    Thin(ThinEntry<'data>),
}

#[derive(Clone, Copy)]
pub struct ExtendedFilenames<'data> {
    data: &'data [u8],
}

pub struct ArchiveContent<'data> {
    ident: &'data str,
    pub data: &'data [u8],

    /// Offset of the entry's header within the archive. The symbol index
    /// refers to members by this offset.
    pub header_offset: usize,
}

impl<'data> ArchiveContent<'data> {
    pub fn name(&self, filenames: Option<ExtendedFilenames<'data>>) -> &'data [u8] {
        member_name(self.ident, filenames)
    }
}

pub struct ThinEntry<'data> {
    ident: &'data str,
}

impl<'data> ThinEntry<'data> {
    pub fn name(&self, filenames: Option<ExtendedFilenames<'data>>) -> &'data [u8] {
        member_name(self.ident, filenames)
    }
}

pub struct ArchiveIterator<'data> {
    data: &'data [u8],
    offset: usize,
    is_thin: bool,
}

enum IdentifierKind {
    InlineContent,
    FileReference,
    Filenames,
    SymbolIndex { wide: bool },
}

impl<'data> ArchiveIterator<'data> {
    /// Create an iterator from the bytes of the whole archive, including the
    /// magic.
    pub fn from_archive_bytes(data: &'data [u8]) -> Result<Self> {
        if let Some(rest) = data.strip_prefix(&object::archive::MAGIC) {
            Ok(Self {
                data: rest,
                offset: object::archive::MAGIC.len(),
                is_thin: false,
            })
        } else if let Some(rest) = data.strip_prefix(&object::archive::THIN_MAGIC) {
            Ok(Self {
                data: rest,
                offset: object::archive::THIN_MAGIC.len(),
                is_thin: true,
            })
        } else {
            bail!("missing archive header");
        }
    }

    fn next_result(&mut self) -> Result<Option<ArchiveEntry<'data>>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let header_offset = self.offset;
        let (entry, consumed) = parse_entry(self.data, self.is_thin, header_offset)?;
        self.data = &self.data[consumed..];
        self.offset += consumed;
        Ok(Some(entry))
    }
}

impl<'data> Iterator for ArchiveIterator<'data> {
    type Item = Result<ArchiveEntry<'data>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_result().transpose()
    }
}

/// Parses the entry that starts at the beginning of `data`. Returns the
/// decoded entry and the number of bytes consumed including padding.
fn parse_entry(
    data: &[u8],
    is_thin: bool,
    header_offset: usize,
) -> Result<(ArchiveEntry<'_>, usize)> {
    ensure!(data.len() >= HEADER_SIZE, "short archive entry header");
    let (header_bytes, rest) = data.split_at(HEADER_SIZE);
    let header: &EntryHeader = bytemuck::from_bytes(header_bytes);

    let size = parse_decimal(&header.size).context("invalid archive entry size")?;
    let ident = std::str::from_utf8(&header.ident)
        .context("archive ident is invalid UTF-8")?
        .trim_end();

    let ident_kind = match ident {
        "/" => IdentifierKind::SymbolIndex { wide: false },
        "/SYM64/" => IdentifierKind::SymbolIndex { wide: true },
        "//" => IdentifierKind::Filenames,
        _ if is_thin => IdentifierKind::FileReference,
        _ => IdentifierKind::InlineContent,
    };

    // The size field of a thin member reference describes the referenced
    // file, not the entry itself; the entry has no inline data.
    let entry_size = match ident_kind {
        IdentifierKind::FileReference => 0,
        _ => {
            ensure!(
                rest.len() >= size,
                "archive entry size is {size}, but only {} bytes left",
                rest.len()
            );
            size
        }
    };

    let entry = match ident_kind {
        IdentifierKind::SymbolIndex { wide } => ArchiveEntry::SymbolIndex {
            data: &rest[..entry_size],
            wide,
        },
        IdentifierKind::Filenames => ArchiveEntry::Filenames(ExtendedFilenames {
            data: &rest[..entry_size],
        }),
        IdentifierKind::InlineContent => ArchiveEntry::Regular(ArchiveContent {
            ident,
            data: &rest[..entry_size],
            header_offset,
        }),
        IdentifierKind::FileReference => ArchiveEntry::Thin(ThinEntry { ident }),
    };

    let padded = entry_size.next_multiple_of(2).min(rest.len());
    Ok((entry, HEADER_SIZE + padded))
}

fn parse_decimal(field: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(field)?.trim_end();
    Ok(text.parse()?)
}

impl<'data> ExtendedFilenames<'data> {
    /// The filename starting at `offset` in the table. Entries end with
    /// "/\n"; scanning for '/' wouldn't work for names containing one, so we
    /// scan for '\n' and strip the trailing '/'.
    fn name_at(&self, offset: usize) -> &'data [u8] {
        let data = self.data.get(offset..).unwrap_or_default();
        let end = memchr::memchr(b'\n', data).unwrap_or(data.len());
        let name = &data[..end];
        name.strip_suffix(b"/").unwrap_or(name)
    }
}

/// Resolves an entry's identifier: either inline in the header, or a "/NN"
/// reference into the extended filenames table.
fn member_name<'data>(
    ident: &'data str,
    filenames: Option<ExtendedFilenames<'data>>,
) -> &'data [u8] {
    if let Some(rest) = ident.strip_prefix('/')
        && let Some(filenames) = filenames
        && let Ok(offset) = rest.trim_end_matches('/').trim_end().parse::<usize>()
    {
        return filenames.name_at(offset);
    }
    ident.trim_end_matches('/').as_bytes()
}

/// A symbol from the archive's index.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSymbol<'data> {
    pub name: &'data [u8],

    /// Offset of the defining member's header within the archive.
    pub member_offset: u64,
}

/// A member buffer produced by lazy extraction.
#[derive(Debug, Clone, Copy)]
pub struct MemberBuffer<'data> {
    pub name: &'data [u8],
    pub data: &'data [u8],
}

/// Parses the GNU symbol index: a big-endian count, that many big-endian
/// member header offsets, then the NUL-terminated symbol names.
fn parse_symbol_index<'data>(
    data: &'data [u8],
    wide: bool,
    input: &InputRef<'data>,
) -> Result<Vec<ArchiveSymbol<'data>>> {
    let word = if wide { 8 } else { 4 };
    let read_word = |bytes: &[u8]| -> u64 {
        if wide {
            u64::from_be_bytes(bytes.try_into().unwrap())
        } else {
            u64::from(u32::from_be_bytes(bytes.try_into().unwrap()))
        }
    };

    ensure!(data.len() >= word, "{input}: truncated archive symbol table");
    let count = read_word(&data[..word]) as usize;
    let offsets_end = count
        .checked_mul(word)
        .and_then(|len| len.checked_add(word))
        .filter(|end| *end <= data.len())
        .with_context(|| format!("{input}: truncated archive symbol table"))?;

    let mut names = &data[offsets_end..];
    let mut symbols = Vec::with_capacity(count);
    for i in 0..count {
        let offset = read_word(&data[word + i * word..word + (i + 1) * word]);
        let end = memchr::memchr(0, names)
            .with_context(|| format!("{input}: truncated archive symbol table"))?;
        symbols.push(ArchiveSymbol {
            name: &names[..end],
            member_offset: offset,
        });
        names = &names[end + 1..];
    }
    Ok(symbols)
}

pub struct ArchiveFile<'data> {
    pub input: InputRef<'data>,
    pub file_id: FileId,
    pub is_thin: bool,

    filenames: Option<ExtendedFilenames<'data>>,

    /// Header offsets of members we've already started extracting. A second
    /// request for the same member yields no buffer, which tells the caller
    /// that extraction is already in flight.
    seen: hashbrown::HashSet<u64>,
}

impl<'data> ArchiveFile<'data> {
    /// Walks the archive once to find the symbol index and the filename
    /// table, then installs one lazy symbol per index entry.
    pub(crate) fn parse(
        input: InputRef<'data>,
        file_id: FileId,
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result<Box<Self>> {
        timing_phase!("Parse archive", file = %input);

        let mut iterator = ArchiveIterator::from_archive_bytes(input.data)
            .with_context(|| format!("failed to parse archive `{input}`"))?;
        let is_thin = iterator.is_thin;

        let mut index = None;
        let mut filenames = None;
        for entry in &mut iterator {
            match entry.with_context(|| format!("failed to parse archive `{input}`"))? {
                ArchiveEntry::SymbolIndex { data, wide } => {
                    if index.is_none() {
                        index = Some((data, wide));
                    }
                }
                ArchiveEntry::Filenames(table) => filenames = Some(table),
                ArchiveEntry::Regular(_) | ArchiveEntry::Thin(_) => {}
            }
        }

        let archive = Box::new(ArchiveFile {
            input,
            file_id,
            is_thin,
            filenames,
            seen: hashbrown::HashSet::new(),
        });

        if let Some((data, wide)) = index {
            for symbol in parse_symbol_index(data, wide, &archive.input)? {
                symbol_db.add_lazy_archive(file_id, symbol.name, symbol.member_offset);
            }
        }

        Ok(archive)
    }

    /// Returns a buffer for the member that defines `sym`. The member is
    /// extracted at most once; a repeated request returns `None` so the
    /// caller knows the member is already being consumed.
    pub fn get_member(
        &mut self,
        sym: &ArchiveSymbol<'data>,
        registry: &'data FileRegistry,
        reproducer: Option<&mut (dyn Reproducer + 'data)>,
    ) -> Result<Option<MemberBuffer<'data>>> {
        if !self.seen.insert(sym.member_offset) {
            return Ok(None);
        }

        let (ident, data) = self.member_at(sym.member_offset).with_context(|| {
            format!(
                "could not get the member for symbol {}",
                String::from_utf8_lossy(sym.name)
            )
        })?;
        let name = member_name(ident, self.filenames);

        if let Some(data) = data {
            return Ok(Some(MemberBuffer { name, data }));
        }

        // Thin archive: the entry references a file relative to the
        // archive's directory.
        let path = self.thin_member_path(name);
        let data = registry.open_file(&path).with_context(|| {
            format!(
                "could not get the buffer for the member defining symbol {}",
                String::from_utf8_lossy(sym.name)
            )
        })?;
        if let Some(reproducer) = reproducer {
            reproducer.add_file(&path, data);
        }
        Ok(Some(MemberBuffer { name, data }))
    }

    /// Parses the member whose header starts at `offset`. Inline members
    /// yield their data; thin members yield `None`.
    fn member_at(&self, offset: u64) -> Result<(&'data str, Option<&'data [u8]>)> {
        let offset = usize::try_from(offset)?;
        let tail = self
            .input
            .data
            .get(offset..)
            .context("member offset is out of bounds")?;
        let (entry, _) = parse_entry(tail, self.is_thin, offset)?;
        match entry {
            ArchiveEntry::Regular(content) => Ok((content.ident, Some(content.data))),
            ArchiveEntry::Thin(thin) => Ok((thin.ident, None)),
            ArchiveEntry::SymbolIndex { .. } | ArchiveEntry::Filenames(_) => {
                bail!("member offset does not name a member")
            }
        }
    }

    fn thin_member_path(&self, name: &[u8]) -> PathBuf {
        let archive_path = Path::new(OsStr::from_bytes(self.input.name));
        let parent = archive_path.parent().unwrap_or(Path::new(""));
        parent.join(Path::new(OsStr::from_bytes(name)))
    }
}

impl std::fmt::Display for ArchiveFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.input, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ident: &str, data: &[u8]) -> Vec<u8> {
        let mut header = vec![b' '; HEADER_SIZE];
        header[..ident.len()].copy_from_slice(ident.as_bytes());
        let size = format!("{}", data.len());
        header[48..48 + size.len()].copy_from_slice(size.as_bytes());
        header[58] = b'`';
        header[59] = b'\n';
        header.extend_from_slice(data);
        if data.len() % 2 == 1 {
            header.push(b'\n');
        }
        header
    }

    fn symbol_index(entries: &[(&str, u32)]) -> Vec<u8> {
        let mut data = (entries.len() as u32).to_be_bytes().to_vec();
        for (_, offset) in entries {
            data.extend_from_slice(&offset.to_be_bytes());
        }
        for (name, _) in entries {
            data.extend_from_slice(name.as_bytes());
            data.push(0);
        }
        data
    }

    /// An archive with one index entry `bar` pointing at member `bar.o`.
    fn simple_archive() -> (Vec<u8>, u32) {
        let mut bytes = object::archive::MAGIC.to_vec();
        let index = symbol_index(&[("bar", 0)]);
        let index_entry = entry("/", &index);
        let member_offset = (bytes.len() + index_entry.len()) as u32;

        // Re-encode now that we know where the member lands.
        let index = symbol_index(&[("bar", member_offset)]);
        bytes.extend_from_slice(&entry("/", &index));
        bytes.extend_from_slice(&entry("bar.o/", b"MEMBER-BYTES"));
        (bytes, member_offset)
    }

    #[test]
    fn test_iterate_and_index() {
        let (bytes, member_offset) = simple_archive();
        let entries: Vec<_> = ArchiveIterator::from_archive_bytes(&bytes)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries.len(), 2);

        let ArchiveEntry::SymbolIndex { data, wide } = &entries[0] else {
            panic!("expected symbol index first");
        };
        assert!(!*wide);
        let input = InputRef::new(b"foo.a", &bytes);
        let symbols = parse_symbol_index(data, *wide, &input).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, b"bar");
        assert_eq!(symbols[0].member_offset, u64::from(member_offset));

        let ArchiveEntry::Regular(content) = &entries[1] else {
            panic!("expected a regular member");
        };
        assert_eq!(content.data, b"MEMBER-BYTES");
        assert_eq!(content.header_offset, member_offset as usize);
        assert_eq!(content.name(None), b"bar.o");
    }

    #[test]
    fn test_thin_archive_entries() {
        let mut bytes = object::archive::THIN_MAGIC.to_vec();
        // Thin member headers carry the referenced file's size; there's no
        // inline data.
        let mut header = vec![b' '; HEADER_SIZE];
        header[..8].copy_from_slice(b"x/y.o/  ");
        header[48] = b'4';
        header[58] = b'`';
        header[59] = b'\n';
        bytes.extend_from_slice(&header);

        let entries: Vec<_> = ArchiveIterator::from_archive_bytes(&bytes)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        let ArchiveEntry::Thin(thin) = &entries[0] else {
            panic!("expected a thin member");
        };
        assert_eq!(thin.name(None), b"x/y.o");
    }

    #[test]
    fn test_get_member_extracts_at_most_once() {
        let (bytes, member_offset) = simple_archive();
        let registry = FileRegistry::new();
        let mut symbol_db = SymbolDb::new();
        let input = InputRef::new(b"foo.a", &bytes);
        let mut archive = ArchiveFile::parse(input, FileId::new(0), &mut symbol_db).unwrap();
        assert_eq!(symbol_db.num_symbols(), 1);

        let sym = ArchiveSymbol {
            name: b"bar",
            member_offset: u64::from(member_offset),
        };
        let first = archive.get_member(&sym, &registry, None).unwrap();
        assert_eq!(first.unwrap().data, b"MEMBER-BYTES");
        let second = archive.get_member(&sym, &registry, None).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_extended_filenames() {
        let table = ExtendedFilenames {
            data: b"a-very-long-name.o/\nanother/name.o/\n",
        };
        assert_eq!(member_name("/0", Some(table)), b"a-very-long-name.o");
        assert_eq!(member_name("/20", Some(table)), b"another/name.o");
        assert_eq!(member_name("short.o/", Some(table)), b"short.o");
        assert_eq!(member_name("short.o/", None), b"short.o");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(b"123       ").unwrap(), 123);
        assert_eq!(parse_decimal(b"0         ").unwrap(), 0);
        assert!(parse_decimal(b"12a       ").is_err());
    }

    #[test]
    fn test_truncated_archive() {
        let mut bytes = object::archive::MAGIC.to_vec();
        bytes.extend_from_slice(&entry("x.o/", b"0123456789")[..40]);
        let result: Result<Vec<_>> = ArchiveIterator::from_archive_bytes(&bytes)
            .unwrap()
            .collect();
        assert!(result.is_err());
    }
}
