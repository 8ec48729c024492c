//! Typed, bounds-checked views over the parts of an ELF file that ingestion
//! consumes. All accessors borrow from the input buffer; nothing here copies
//! section contents.
//!
//! The four ELF flavours are handled with two monomorphisations (32 and
//! 64-bit headers) of the `object` crate's generic reader, each carrying its
//! endianness at runtime. Offsets and sizes are widened to u64 as soon as
//! they leave the typed headers.

use crate::bail;
use crate::ensure;
use crate::error::Result;
use keel_utils::elf::SectionType;
use keel_utils::elf::sht;
use object::Endianness;
use object::SectionIndex;
use object::SymbolIndex;
use object::read::elf::FileHeader;
use object::read::elf::SectionHeader as _;
use object::read::elf::Sym as _;

pub(crate) type Elf32 = object::elf::FileHeader32<Endianness>;
pub(crate) type Elf64 = object::elf::FileHeader64<Endianness>;

pub(crate) type SectionTable<'data, Elf> = object::read::elf::SectionTable<'data, Elf>;
pub(crate) type SymbolTable<'data, Elf> = object::read::elf::SymbolTable<'data, Elf>;
pub(crate) type VerdefIterator<'data, Elf> = object::read::elf::VerdefIterator<'data, Elf>;
pub(crate) type Versym = object::elf::Versym<Endianness>;

/// The width of an ELF file, from `EI_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Elf32,
    Elf64,
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Class::Elf32 => "ELF32".fmt(f),
            Class::Elf64 => "ELF64".fmt(f),
        }
    }
}

/// Reads `(class, endian)` from the ELF identifier. Anything outside the four
/// valid combinations is an error.
pub(crate) fn parse_ident(data: &[u8]) -> Result<(Class, Endianness)> {
    ensure!(data.starts_with(&object::elf::ELFMAG), "not an ELF file");
    ensure!(data.len() > 5, "file too short");
    let class = match data[4] {
        object::elf::ELFCLASS32 => Class::Elf32,
        object::elf::ELFCLASS64 => Class::Elf64,
        c => bail!("invalid file class: {c}"),
    };
    let endian = match data[5] {
        object::elf::ELFDATA2LSB => Endianness::Little,
        object::elf::ELFDATA2MSB => Endianness::Big,
        d => bail!("invalid data encoding: {d}"),
    };
    Ok((class, endian))
}

pub(crate) struct File<'data, Elf: FileHeader<Endian = Endianness>> {
    pub(crate) endian: Endianness,
    pub(crate) data: &'data [u8],
    pub(crate) emachine: u16,
    pub(crate) sections: SectionTable<'data, Elf>,

    /// This may be symtab or dynsym depending on the file type.
    pub(crate) symbols: SymbolTable<'data, Elf>,

    /// `sh_info` of the symbol table section: the index of the first
    /// non-local symbol. Unset when the file has no symbol table.
    pub(crate) symtab_info: Option<u32>,

    pub(crate) versym: &'data [Versym],

    /// An iterator over the version definitions and the corresponding linked
    /// string table index.
    pub(crate) verdef: Option<(VerdefIterator<'data, Elf>, SectionIndex)>,

    /// Number of verdef records according to `sh_info` of the verdef section.
    pub(crate) verdefnum: u32,
}

impl<'data, Elf: FileHeader<Endian = Endianness>> File<'data, Elf> {
    pub(crate) fn parse(data: &'data [u8], is_dynamic: bool) -> Result<Self> {
        let header = Elf::parse(data)?;
        let endian = header.endian()?;
        let emachine = header.e_machine(endian);
        let sections = header.sections(endian, data)?;

        let mut symbols = SymbolTable::default();
        let mut symtab_info = None;
        let mut versym: &[Versym] = &[];
        let mut verdef = None;
        let mut verdefnum = 0;

        // Find all the sections we're interested in with a single scan of the
        // section table so as to avoid multiple scans.
        for (section_index, section) in sections.enumerate() {
            match SectionType::from_header(endian, section) {
                sht::DYNSYM if is_dynamic => {
                    symbols = SymbolTable::parse(endian, data, &sections, section_index, section)?;
                    symtab_info = Some(section.sh_info(endian));
                }
                sht::SYMTAB if !is_dynamic => {
                    symbols = SymbolTable::parse(endian, data, &sections, section_index, section)?;
                    symtab_info = Some(section.sh_info(endian));
                }
                sht::GNU_VERSYM => {
                    versym = section.data_as_array(endian, data)?;
                }
                sht::GNU_VERDEF => {
                    verdef = section.gnu_verdef(endian, data)?;
                    verdefnum = section.sh_info(endian);
                }
                _ => {}
            }
        }

        Ok(Self {
            endian,
            data,
            emachine,
            sections,
            symbols,
            symtab_info,
            versym,
            verdef,
            verdefnum,
        })
    }

    pub(crate) fn section(&self, index: SectionIndex) -> Result<&'data Elf::SectionHeader> {
        Ok(self.sections.section(index)?)
    }

    pub(crate) fn section_name(&self, section: &Elf::SectionHeader) -> Result<&'data [u8]> {
        Ok(self.sections.section_name(self.endian, section)?)
    }

    /// Returns the raw section data. SHT_NOBITS sections yield an empty slice.
    pub(crate) fn section_data(&self, section: &Elf::SectionHeader) -> Result<&'data [u8]> {
        Ok(section.data(self.endian, self.data)?)
    }

    pub(crate) fn symbol(&self, index: SymbolIndex) -> Result<&'data Elf::Sym> {
        Ok(self.symbols.symbol(index)?)
    }

    pub(crate) fn symbol_name(&self, symbol: &Elf::Sym) -> Result<&'data [u8]> {
        Ok(self.symbols.symbol_name(self.endian, symbol)?)
    }

    /// Resolves a symbol's section index, following the extended-index table
    /// for `SHN_XINDEX`. Reserved indices other than `SHN_XINDEX` resolve to
    /// no section.
    pub(crate) fn symbol_section(
        &self,
        symbol: &Elf::Sym,
        index: SymbolIndex,
    ) -> Result<Option<SectionIndex>> {
        Ok(self.symbols.symbol_section(self.endian, symbol, index)?)
    }

    /// The index of the first non-local symbol. Checked against the symbol
    /// count so that slicing by it can't go out of bounds.
    pub(crate) fn first_non_local(&self) -> Result<usize> {
        let Some(info) = self.symtab_info else {
            return Ok(0);
        };
        let first = info as usize;
        ensure!(
            first <= self.symbols.len(),
            "invalid sh_info in symbol table"
        );
        Ok(first)
    }

    pub(crate) fn has_symbols(&self) -> bool {
        self.symtab_info.is_some()
    }

    pub(crate) fn dynamic_tags(&self) -> Result<&'data [Elf::Dyn]> {
        use crate::error::Context as _;

        if let Some(dynamic) = self.sections.dynamic(self.endian, self.data).transpose() {
            return dynamic
                .map(|(dynamic, _)| dynamic)
                .context("Failed to read dynamic table");
        }
        Ok(&[])
    }
}

/// Decoded width-independent copies of the symbol fields the facade stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfSymbolInfo {
    pub value: u64,
    pub size: u64,
    pub ty: u8,
    pub binding: keel_utils::elf::SymbolBinding,
    pub visibility: keel_utils::elf::SymbolVisibility,
}

impl ElfSymbolInfo {
    pub(crate) fn new<Elf: FileHeader<Endian = Endianness>>(
        endian: Endianness,
        sym: &Elf::Sym,
        binding: keel_utils::elf::SymbolBinding,
    ) -> Self {
        Self {
            value: sym.st_value(endian).into(),
            size: sym.st_size(endian).into(),
            ty: sym.st_type(),
            binding,
            visibility: keel_utils::elf::SymbolVisibility::from_st_other(sym.st_visibility()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ident() {
        let mut ident = [0u8; 16];
        ident[..4].copy_from_slice(&object::elf::ELFMAG);
        ident[4] = object::elf::ELFCLASS32;
        ident[5] = object::elf::ELFDATA2MSB;
        let (class, endian) = parse_ident(&ident).unwrap();
        assert_eq!(class, Class::Elf32);
        assert_eq!(endian, Endianness::Big);

        ident[4] = 0;
        assert!(parse_ident(&ident).is_err());
        ident[4] = object::elf::ELFCLASS64;
        ident[5] = 0;
        assert!(parse_ident(&ident).is_err());
        assert!(parse_ident(b"\x7fELF").is_err());
        assert!(parse_ident(b"not elf at all!!").is_err());
    }
}
