//! Entry points for ingesting input files. A `LinkContext` carries the
//! process-wide state the parsers need: the configuration, the buffer
//! registry, the COMDAT signature set, the symbol table facade and the pool
//! of parsed files.

use crate::archive::ArchiveFile;
use crate::archive::ArchiveSymbol;
use crate::archive::MemberBuffer;
use crate::bail;
use crate::binary_blob;
use crate::bitcode::BitcodeFile;
use crate::bitcode::BitcodeReaderFactory;
use crate::comdat::ComdatGroups;
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::Context as _;
use crate::error::Result;
use crate::file_kind::BITCODE_MAGIC;
use crate::file_kind::FileKind;
use crate::input_data::FileId;
use crate::input_data::FileRegistry;
use crate::input_data::InputRef;
use crate::input_data::Reproducer;
use crate::lazy_object::LazyObjectFile;
use crate::object_file::ObjectFile;
use crate::shared_file::SharedFile;
use crate::symbol_db::SymbolDb;
use crate::symbol_db::SymbolDef;
use crate::symbol_db::SymbolId;

pub enum ParsedInput<'data> {
    Object(Box<ObjectFile<'data>>),
    Shared(Box<SharedFile<'data>>),
    Archive(Box<ArchiveFile<'data>>),
    Bitcode(Box<BitcodeFile<'data>>),
    LazyObject(Box<LazyObjectFile<'data>>),
}

impl std::fmt::Display for ParsedInput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedInput::Object(file) => std::fmt::Display::fmt(&file.input, f),
            ParsedInput::Shared(file) => std::fmt::Display::fmt(&file.input, f),
            ParsedInput::Archive(file) => std::fmt::Display::fmt(&file.input, f),
            ParsedInput::Bitcode(file) => std::fmt::Display::fmt(&file.input, f),
            ParsedInput::LazyObject(file) => std::fmt::Display::fmt(&file.input, f),
        }
    }
}

pub struct LinkContext<'data> {
    pub config: Config,
    registry: &'data FileRegistry,
    pub symbol_db: SymbolDb<'data>,
    pub comdat_groups: ComdatGroups<'data>,
    pub diagnostics: Diagnostics,

    /// Every ingested file, in ingest order. Torn down in reverse.
    files: Vec<ParsedInput<'data>>,

    /// The first ELF file we saw. The driver uses it to infer target
    /// defaults it wasn't told about.
    pub first_elf: Option<FileId>,

    bitcode_factory: Option<&'data dyn BitcodeReaderFactory<'data>>,
    reproducer: Option<Box<dyn Reproducer + 'data>>,
}

impl<'data> LinkContext<'data> {
    pub fn new(config: Config, registry: &'data FileRegistry) -> Self {
        Self {
            config,
            registry,
            symbol_db: SymbolDb::new(),
            comdat_groups: ComdatGroups::new(),
            diagnostics: Diagnostics::new(),
            files: Vec::new(),
            first_elf: None,
            bitcode_factory: None,
            reproducer: None,
        }
    }

    pub fn set_bitcode_reader_factory(
        &mut self,
        factory: &'data dyn BitcodeReaderFactory<'data>,
    ) {
        self.bitcode_factory = Some(factory);
    }

    pub fn set_reproducer(&mut self, reproducer: Box<dyn Reproducer + 'data>) {
        self.reproducer = Some(reproducer);
    }

    /// Ingests a buffer, dispatching on its magic.
    pub fn ingest(&mut self, data: &'data [u8], name: &'data [u8]) -> Result<FileId> {
        let kind = FileKind::identify_bytes(data)
            .with_context(|| InputRef::new(name, data).to_string())?;
        match kind {
            FileKind::ElfObject | FileKind::Bitcode => self.add_object_file(data, name, None),
            FileKind::ElfDynamic => self.add_shared_file(data, name),
            FileKind::Archive | FileKind::ThinArchive => self.add_archive(data, name),
        }
    }

    /// Ingests a relocatable object or a bitcode module. `archive_name` is
    /// set when the buffer was extracted from an archive.
    pub fn add_object_file(
        &mut self,
        data: &'data [u8],
        name: &'data [u8],
        archive_name: Option<&'data [u8]>,
    ) -> Result<FileId> {
        let input = InputRef::new(name, data).with_archive_name(archive_name);
        let file_id = self.next_file_id();

        if data.starts_with(BITCODE_MAGIC) {
            let Some(factory) = self.bitcode_factory else {
                bail!("{input}: no bitcode reader available");
            };
            let file = BitcodeFile::new(input, file_id, factory)?;
            file.parse(&mut self.comdat_groups, &mut self.symbol_db)?;
            self.files.push(ParsedInput::Bitcode(file));
        } else {
            let file = ObjectFile::parse(
                input,
                file_id,
                &self.config,
                &mut self.comdat_groups,
                &mut self.symbol_db,
                &mut self.diagnostics,
            )?;
            self.files.push(ParsedInput::Object(file));
            self.note_elf(file_id);
        }
        Ok(file_id)
    }

    /// Ingests a shared object. Only the SONAME is read; call
    /// `parse_shared_rest` once the driver has decided the DSO is needed.
    pub fn add_shared_file(&mut self, data: &'data [u8], name: &'data [u8]) -> Result<FileId> {
        let input = InputRef::new(name, data);
        let file_id = self.next_file_id();
        let file = SharedFile::parse(input, file_id, &self.config)?;
        self.files.push(ParsedInput::Shared(file));
        self.note_elf(file_id);
        Ok(file_id)
    }

    /// Phase 2 of shared-object parsing: publishes the DSO's symbols.
    pub fn parse_shared_rest(&mut self, file_id: FileId) -> Result {
        let ParsedInput::Shared(file) = &mut self.files[file_id.as_usize()] else {
            bail!("file {file_id} is not a shared object");
        };
        file.parse_rest(&mut self.symbol_db)
    }

    /// Ingests an archive: installs one lazy symbol per index entry.
    pub fn add_archive(&mut self, data: &'data [u8], name: &'data [u8]) -> Result<FileId> {
        let input = InputRef::new(name, data);
        let file_id = self.next_file_id();
        let file = ArchiveFile::parse(input, file_id, &mut self.symbol_db)?;
        self.files.push(ParsedInput::Archive(file));
        Ok(file_id)
    }

    /// Wraps an opaque byte buffer in a synthetic relocatable ELF and ingests
    /// it as a regular object.
    pub fn add_binary_file(&mut self, data: &[u8], name: &'data [u8]) -> Result<FileId> {
        let bytes = binary_blob::create_elf(data, name, &self.config)?;
        let data = self.registry.add_bytes(bytes);
        self.add_object_file(data, name, None)
    }

    /// Ingests a file whose symbols become lazy placeholders; the full parse
    /// happens only when one of them is demanded.
    pub fn add_lazy_object_file(
        &mut self,
        data: &'data [u8],
        name: &'data [u8],
    ) -> Result<FileId> {
        let input = InputRef::new(name, data);
        let file_id = self.next_file_id();
        let file = LazyObjectFile::parse(input, file_id, &mut self.symbol_db, self.bitcode_factory)?;
        self.files.push(ParsedInput::LazyObject(file));
        Ok(file_id)
    }

    /// Extracts the archive member that defines a LazyArchive publication.
    /// Returns None when the member is already being consumed.
    pub fn get_archive_member(&mut self, id: SymbolId) -> Result<Option<MemberBuffer<'data>>> {
        let entry = self.symbol_db.symbol(id);
        let &SymbolDef::LazyArchive { member_offset } = &entry.def else {
            bail!("symbol {} was not published by an archive", entry.name);
        };
        let name = entry.name.bytes();
        let file_id = entry.file_id;

        let ParsedInput::Archive(archive) = &mut self.files[file_id.as_usize()] else {
            bail!("file {file_id} is not an archive");
        };
        let sym = ArchiveSymbol {
            name,
            member_offset,
        };
        archive.get_member(&sym, self.registry, self.reproducer.as_deref_mut())
    }

    /// Claims a lazy object's buffer for a full parse; None when already
    /// claimed.
    pub fn take_lazy_object_buffer(&mut self, file_id: FileId) -> Result<Option<&'data [u8]>> {
        let ParsedInput::LazyObject(file) = &mut self.files[file_id.as_usize()] else {
            bail!("file {file_id} is not a lazy object");
        };
        Ok(file.buffer())
    }

    pub fn file(&self, file_id: FileId) -> &ParsedInput<'data> {
        &self.files[file_id.as_usize()]
    }

    pub fn files(&self) -> &[ParsedInput<'data>] {
        &self.files
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    fn next_file_id(&self) -> FileId {
        FileId::new(self.files.len() as u32)
    }

    fn note_elf(&mut self, file_id: FileId) {
        if self.first_elf.is_none() {
            self.first_elf = Some(file_id);
        }
    }
}

impl Drop for LinkContext<'_> {
    fn drop(&mut self) {
        // Parsed files go away in reverse ingest order, mirroring the buffer
        // registry's teardown.
        while self.files.pop().is_some() {}
    }
}
