//! A file whose defined symbol names are published immediately but whose
//! full parse is deferred until one of those names is demanded (`--start-lib`
//! semantics: an object that behaves like an archive member of its own).

use crate::bail;
use crate::bitcode::BitcodeReaderFactory;
use crate::bitcode::BitcodeSymbolFlags;
use crate::elf;
use crate::elf::Class;
use crate::error::Context as _;
use crate::error::Result;
use crate::file_kind::BITCODE_MAGIC;
use crate::input_data::FileId;
use crate::input_data::InputRef;
use crate::symbol_db::SymbolDb;
use crate::timing_phase;
use itertools::Itertools as _;
use object::Endianness;
use object::read::elf::FileHeader;
use object::read::elf::SectionHeader as _;
use object::read::elf::Sym as _;

pub struct LazyObjectFile<'data> {
    pub input: InputRef<'data>,
    pub file_id: FileId,

    /// Whether the buffer has already been claimed for a full parse.
    seen: bool,
}

impl<'data> LazyObjectFile<'data> {
    /// Publishes one lazy symbol per globally-visible defined name.
    pub(crate) fn parse(
        input: InputRef<'data>,
        file_id: FileId,
        symbol_db: &mut SymbolDb<'data>,
        bitcode_factory: Option<&dyn BitcodeReaderFactory<'data>>,
    ) -> Result<Box<Self>> {
        timing_phase!("Parse lazy object", file = %input);

        let file = Box::new(LazyObjectFile {
            input,
            file_id,
            seen: false,
        });
        for name in file.symbol_names(bitcode_factory)? {
            symbol_db.add_lazy_object(name, file_id);
        }
        Ok(file)
    }

    /// Claims the backing buffer for a full parse. The second request
    /// returns nothing, which tells the caller the file is already being
    /// consumed.
    pub fn buffer(&mut self) -> Option<&'data [u8]> {
        if self.seen {
            return None;
        }
        self.seen = true;
        Some(self.input.data)
    }

    /// Returns the globally-visible defined symbol names without performing a
    /// full parse.
    fn symbol_names(
        &self,
        bitcode_factory: Option<&dyn BitcodeReaderFactory<'data>>,
    ) -> Result<Vec<&'data [u8]>> {
        if self.input.data.starts_with(BITCODE_MAGIC) {
            let Some(factory) = bitcode_factory else {
                bail!("{}: no bitcode reader available", self.input);
            };
            let reader = factory.create(self.input.data, self.input.name)?;
            let names = reader
                .symbols()
                .iter()
                .filter(|sym| !sym.flags.contains(BitcodeSymbolFlags::UNDEFINED))
                .map(|sym| sym.name)
                .collect_vec();
            return Ok(names);
        }

        let (class, _) = elf::parse_ident(self.input.data).with_context(|| self.input.to_string())?;
        match class {
            Class::Elf32 => self.elf_symbol_names::<elf::Elf32>(),
            Class::Elf64 => self.elf_symbol_names::<elf::Elf64>(),
        }
    }

    /// Lightweight pass: finds the first SHT_SYMTAB and returns the names of
    /// its non-local, non-undefined entries.
    fn elf_symbol_names<Elf: FileHeader<Endian = Endianness>>(
        &self,
    ) -> Result<Vec<&'data [u8]>> {
        let data = self.input.data;
        let header = Elf::parse(data).with_context(|| self.input.to_string())?;
        let e = header.endian()?;
        let sections = header.sections(e, data)?;

        for (index, section) in sections.enumerate() {
            if section.sh_type(e) != object::elf::SHT_SYMTAB {
                continue;
            }
            let symbols =
                elf::SymbolTable::<Elf>::parse(e, data, &sections, index, section)?;
            let first_non_local = section.sh_info(e) as usize;
            let syms = symbols.symbols();
            anyhow::ensure!(
                first_non_local <= syms.len(),
                "{}: invalid sh_info in symbol table",
                self.input
            );

            let mut names = Vec::new();
            for sym in &syms[first_non_local..] {
                if sym.st_shndx(e) != object::elf::SHN_UNDEF {
                    names.push(symbols.symbol_name(e, sym)?);
                }
            }
            return Ok(names);
        }
        Ok(Vec::new())
    }
}

impl std::fmt::Display for LazyObjectFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.input, f)
    }
}
