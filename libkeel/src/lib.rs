//! The input-file ingestion layer of the keel linker: takes raw byte buffers
//! for relocatable objects, shared objects, archives, LTO bitcode and raw
//! binary blobs, and turns them into in-memory representations with a
//! populated symbol table, ready for symbol resolution and layout.

pub(crate) use anyhow::bail;
pub(crate) use anyhow::ensure;

pub(crate) mod archive;
pub(crate) mod binary_blob;
pub(crate) mod bitcode;
pub(crate) mod comdat;
pub(crate) mod config;
pub(crate) mod diagnostics;
pub(crate) mod elf;
pub mod error;
pub(crate) mod file_kind;
pub(crate) mod hash;
pub(crate) mod input_data;
pub(crate) mod lazy_object;
pub(crate) mod object_file;
pub(crate) mod parsing;
pub(crate) mod shared_file;
pub(crate) mod symbol;
pub(crate) mod symbol_db;
pub(crate) mod timing;

pub use archive::ArchiveContent;
pub use archive::ArchiveEntry;
pub use archive::ArchiveFile;
pub use archive::ArchiveIterator;
pub use archive::ArchiveSymbol;
pub use archive::ExtendedFilenames;
pub use archive::MemberBuffer;
pub use archive::ThinEntry;
pub use bitcode::BitcodeFile;
pub use bitcode::BitcodeReader;
pub use bitcode::BitcodeReaderFactory;
pub use bitcode::BitcodeSymbol;
pub use bitcode::BitcodeSymbolFlags;
pub use comdat::ComdatGroups;
pub use config::Config;
pub use config::Strip;
pub use diagnostics::Diagnostics;
pub use elf::Class;
pub use elf::ElfSymbolInfo;
pub use file_kind::FileKind;
pub use input_data::FileData;
pub use input_data::FileId;
pub use input_data::FileRegistry;
pub use input_data::InputRef;
pub use input_data::Reproducer;
pub use lazy_object::LazyObjectFile;
pub use object_file::EhFrameSection;
pub use object_file::InputSection;
pub use object_file::LocalSymbol;
pub use object_file::LocalSymbolKind;
pub use object_file::MergeSection;
pub use object_file::MipsAbiflagsSection;
pub use object_file::MipsOptionsSection;
pub use object_file::MipsReginfoSection;
pub use object_file::ObjectFile;
pub use object_file::SectionHeaderInfo;
pub use object_file::SectionSlot;
pub use object_file::SymbolBody;
pub use parsing::LinkContext;
pub use parsing::ParsedInput;
pub use shared_file::SharedFile;
pub use shared_file::VersionDef;
pub use symbol::SymbolName;
pub use symbol_db::SymbolDb;
pub use symbol_db::SymbolDef;
pub use symbol_db::SymbolEntry;
pub use symbol_db::SymbolId;
