//! Parsing of relocatable ELF objects. This is a two-pass process: the first
//! pass walks the section headers, deduplicates COMDAT groups and classifies
//! each section; the second pass walks the symbol table and publishes every
//! non-local symbol through the symbol table facade.

use crate::bail;
use crate::comdat::ComdatGroups;
use crate::config::Config;
use crate::config::Strip;
use crate::diagnostics::Diagnostics;
use crate::elf;
use crate::elf::Class;
use crate::elf::ElfSymbolInfo;
use crate::elf::File;
use crate::ensure;
use crate::error::Context as _;
use crate::error::Result;
use crate::hash::PreHashed;
use crate::input_data::FileId;
use crate::input_data::InputRef;
use crate::symbol::SymbolName;
use crate::symbol_db::SymbolDb;
use crate::symbol_db::SymbolId;
use crate::timing_phase;
use keel_utils::elf::SectionFlags;
use keel_utils::elf::SectionType;
use keel_utils::elf::SymbolBinding;
use keel_utils::elf::mips;
use keel_utils::elf::secnames;
use keel_utils::elf::shf;
use keel_utils::elf::sht;
use object::Endian as _;
use object::Endianness;
use object::SectionIndex;
use object::SymbolIndex;
use object::read::elf::FileHeader;
use object::read::elf::SectionHeader as _;
use object::read::elf::Sym as _;

/// Decoded, width-independent copy of the section header fields that later
/// link stages need.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeaderInfo {
    pub ty: SectionType,
    pub flags: SectionFlags,
    pub link: u32,
    pub info: u32,
    pub entsize: u64,
    pub addralign: u64,
    pub size: u64,
    pub offset: u64,
}

/// What a section header index turned into. Every header index of an object
/// maps to exactly one slot after the section pass.
#[derive(Debug)]
pub enum SectionSlot<'data> {
    /// An intentional hole: SHT_NULL, string and symbol tables, group
    /// definitions and relocation sections that were attached to their
    /// targets.
    Unused,

    /// The section was eliminated: SHF_EXCLUDE, a duplicate COMDAT group
    /// member, ignored metadata, or stripped debug info.
    Discarded,

    Regular(InputSection<'data>),

    /// SHF_MERGE section whose entries may be deduplicated during layout.
    Merge(MergeSection<'data>),

    /// `.eh_frame`; handled separately because exception frames are merged
    /// and indexed at layout time.
    EhFrame(EhFrameSection<'data>),

    MipsReginfo(MipsReginfoSection<'data>),
    MipsOptions(MipsOptionsSection<'data>),
    MipsAbiflags(MipsAbiflagsSection<'data>),
}

impl SectionSlot<'_> {
    pub fn is_discarded(&self) -> bool {
        matches!(self, SectionSlot::Discarded)
    }
}

#[derive(Debug)]
pub struct InputSection<'data> {
    pub index: SectionIndex,
    pub name: &'data [u8],
    pub header: SectionHeaderInfo,
    pub data: &'data [u8],

    /// Relocation sections whose `sh_info` points at this section.
    pub relocation_sections: Vec<SectionIndex>,
}

#[derive(Debug)]
pub struct MergeSection<'data> {
    pub index: SectionIndex,
    pub name: &'data [u8],
    pub header: SectionHeaderInfo,
    pub data: &'data [u8],
}

#[derive(Debug)]
pub struct EhFrameSection<'data> {
    pub index: SectionIndex,
    pub name: &'data [u8],
    pub header: SectionHeaderInfo,
    pub data: &'data [u8],

    /// At most one relocation section may target an exception-frame section.
    pub relocation_section: Option<SectionIndex>,
}

#[derive(Debug)]
pub struct MipsReginfoSection<'data> {
    pub index: SectionIndex,
    pub data: &'data [u8],
    pub gp0: u64,
}

#[derive(Debug)]
pub struct MipsOptionsSection<'data> {
    pub index: SectionIndex,
    pub data: &'data [u8],

    /// `ri_gp_value` from the ODK_REGINFO descriptor, if present.
    pub gp0: Option<u64>,
}

#[derive(Debug)]
pub struct MipsAbiflagsSection<'data> {
    pub index: SectionIndex,
    pub data: &'data [u8],
}

/// A symbol-table entry of an object file after parsing. Locals get
/// file-private bodies; everything else has been published through the
/// symbol table facade and is referenced by ID.
#[derive(Debug)]
pub enum SymbolBody<'data> {
    Local(LocalSymbol<'data>),
    Global(SymbolId),
}

#[derive(Debug)]
pub struct LocalSymbol<'data> {
    pub name: &'data [u8],
    pub kind: LocalSymbolKind,
}

#[derive(Debug)]
pub enum LocalSymbolKind {
    Undefined,
    DefinedRegular {
        value: u64,
        size: u64,
        ty: u8,
        section: Option<SectionIndex>,
    },
}

#[derive(Debug)]
pub struct ObjectFile<'data> {
    pub input: InputRef<'data>,
    pub file_id: FileId,
    pub class: Class,
    pub endian: Endianness,
    pub emachine: u16,

    /// One entry per section header, in header order.
    pub sections: Vec<SectionSlot<'data>>,

    /// One entry per symbol table entry, in symbol order (including the null
    /// symbol at index 0).
    pub symbols: Vec<SymbolBody<'data>>,

    first_non_local: usize,
    has_symtab: bool,
}

impl<'data> ObjectFile<'data> {
    pub(crate) fn parse(
        input: InputRef<'data>,
        file_id: FileId,
        config: &Config,
        comdat_groups: &mut ComdatGroups<'data>,
        symbol_db: &mut SymbolDb<'data>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Box<Self>> {
        timing_phase!("Parse object", file = %input);

        let (class, _) = elf::parse_ident(input.data).with_context(|| input.to_string())?;
        match class {
            Class::Elf32 => Self::parse_with::<elf::Elf32>(
                input,
                file_id,
                class,
                config,
                comdat_groups,
                symbol_db,
                diagnostics,
            ),
            Class::Elf64 => Self::parse_with::<elf::Elf64>(
                input,
                file_id,
                class,
                config,
                comdat_groups,
                symbol_db,
                diagnostics,
            ),
        }
    }

    fn parse_with<Elf: FileHeader<Endian = Endianness>>(
        input: InputRef<'data>,
        file_id: FileId,
        class: Class,
        config: &Config,
        comdat_groups: &mut ComdatGroups<'data>,
        symbol_db: &mut SymbolDb<'data>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Box<Self>> {
        let file = File::<Elf>::parse(input.data, false)
            .with_context(|| format!("failed to parse object file `{input}`"))?;

        let mut obj = Box::new(ObjectFile {
            input,
            file_id,
            class,
            endian: file.endian,
            emachine: file.emachine,
            sections: Vec::new(),
            symbols: Vec::new(),
            first_non_local: 0,
            has_symtab: file.has_symbols(),
        });

        obj.initialize_sections(&file, config, comdat_groups, diagnostics)?;
        obj.initialize_symbols(&file, symbol_db)?;

        Ok(obj)
    }

    /// First pass: walk section headers in index order, deduplicate COMDAT
    /// groups and classify everything else.
    fn initialize_sections<Elf: FileHeader<Endian = Endianness>>(
        &mut self,
        file: &File<'data, Elf>,
        config: &Config,
        comdat_groups: &mut ComdatGroups<'data>,
        diagnostics: &mut Diagnostics,
    ) -> Result {
        let e = file.endian;
        let num_sections = file.sections.len();
        let mut slots: Vec<SectionSlot<'data>> = std::iter::repeat_with(|| SectionSlot::Unused)
            .take(num_sections)
            .collect();

        for (index, sec) in file.sections.enumerate() {
            // A previous group may have already discarded this section.
            if slots[index.0].is_discarded() {
                continue;
            }

            if SectionFlags::from_header(e, sec).contains(shf::EXCLUDE) {
                slots[index.0] = SectionSlot::Discarded;
                continue;
            }

            match SectionType::from_header(e, sec) {
                sht::GROUP => {
                    slots[index.0] = SectionSlot::Discarded;
                    let signature = group_signature(file, sec, &self.input)?;
                    if comdat_groups.insert(signature, self.file_id) {
                        continue;
                    }
                    // Duplicate group: every member is discarded.
                    for entry in group_entries(file, sec, &self.input)? {
                        let member = entry.get(e) as usize;
                        ensure!(
                            member < num_sections,
                            "{}: invalid section index in group: {member}",
                            self.input
                        );
                        slots[member] = SectionSlot::Discarded;
                    }
                }
                // The symbol table, string tables and the extended-index
                // table are consumed via the decoder, not kept as sections.
                sht::SYMTAB | sht::SYMTAB_SHNDX | sht::STRTAB | sht::NULL => {}
                _ => self.create_input_section(file, index, sec, &mut slots, config, diagnostics)?,
            }
        }

        self.sections = slots;
        Ok(())
    }

    fn create_input_section<Elf: FileHeader<Endian = Endianness>>(
        &self,
        file: &File<'data, Elf>,
        index: SectionIndex,
        sec: &'data Elf::SectionHeader,
        slots: &mut [SectionSlot<'data>],
        config: &Config,
        diagnostics: &mut Diagnostics,
    ) -> Result {
        let e = file.endian;
        let name = file.section_name(sec)?;
        let header = header_info::<Elf>(e, sec);

        match header.ty {
            // ARM metadata; attributes are ignored at present.
            sht::ARM_ATTRIBUTES => {
                slots[index.0] = SectionSlot::Discarded;
                return Ok(());
            }
            // The MIPS sections contribute global state (ri_gp_value), so
            // they're retained as their own variants.
            sht::MIPS_REGINFO => {
                let data = file.section_data(sec)?;
                let gp0 = parse_reginfo_gp(data, e, &self.input)?;
                slots[index.0] = SectionSlot::MipsReginfo(MipsReginfoSection { index, data, gp0 });
                return Ok(());
            }
            sht::MIPS_OPTIONS => {
                let data = file.section_data(sec)?;
                let gp0 = parse_options_gp(data, e, &self.input)?;
                slots[index.0] = SectionSlot::MipsOptions(MipsOptionsSection { index, data, gp0 });
                return Ok(());
            }
            sht::MIPS_ABIFLAGS => {
                let data = file.section_data(sec)?;
                slots[index.0] = SectionSlot::MipsAbiflags(MipsAbiflagsSection { index, data });
                return Ok(());
            }
            sht::REL | sht::RELA => {
                // For relocatable output we don't interpret relocations, just
                // copy the sections through.
                if config.relocatable {
                    slots[index.0] = SectionSlot::Regular(InputSection {
                        index,
                        name,
                        header,
                        data: file.section_data(sec)?,
                        relocation_sections: Vec::new(),
                    });
                    return Ok(());
                }
                self.attach_relocation_section(index, &header, slots)?;
                return Ok(());
            }
            _ => {}
        }

        // Presence of PT_GNU_STACK in the output is decided by the command
        // line, so the marker section itself is ignored.
        if name == secnames::NOTE_GNU_STACK {
            slots[index.0] = SectionSlot::Discarded;
            return Ok(());
        }

        if name == secnames::NOTE_GNU_SPLIT_STACK {
            diagnostics.error(format!(
                "{}: objects using splitstacks are not supported",
                self.input
            ));
            slots[index.0] = SectionSlot::Discarded;
            return Ok(());
        }

        if config.strip != Strip::None && name.starts_with(secnames::DEBUG_PREFIX) {
            slots[index.0] = SectionSlot::Discarded;
            return Ok(());
        }

        if name == secnames::EH_FRAME && !config.relocatable {
            slots[index.0] = SectionSlot::EhFrame(EhFrameSection {
                index,
                name,
                header,
                data: file.section_data(sec)?,
                relocation_section: None,
            });
            return Ok(());
        }

        let data = file.section_data(sec)?;
        slots[index.0] = if should_merge(config, &header, &self.input)? {
            SectionSlot::Merge(MergeSection {
                index,
                name,
                header,
                data,
            })
        } else {
            SectionSlot::Regular(InputSection {
                index,
                name,
                header,
                data,
                relocation_sections: Vec::new(),
            })
        };
        Ok(())
    }

    /// Associates a relocation section with the section named by its
    /// `sh_info`. The relocation section itself occupies an `Unused` slot.
    fn attach_relocation_section(
        &self,
        index: SectionIndex,
        header: &SectionHeaderInfo,
        slots: &mut [SectionSlot<'data>],
    ) -> Result {
        let target = header.info as usize;
        ensure!(
            target < slots.len(),
            "{}: invalid relocated section index: {target}",
            self.input
        );
        match &mut slots[target] {
            // A relocation section should be part of the group of the section
            // it relocates, but LLVM 3.3 and earlier didn't do that, so a
            // relocation section whose target was discarded is dropped
            // silently.
            SectionSlot::Discarded => {}
            SectionSlot::Regular(target_section) => {
                target_section.relocation_sections.push(index);
            }
            SectionSlot::EhFrame(target_section) => {
                ensure!(
                    target_section.relocation_section.is_none(),
                    "{}: multiple relocation sections to .eh_frame are not supported",
                    self.input
                );
                target_section.relocation_section = Some(index);
            }
            // Anything that isn't a regular or exception-frame section
            // (mergeable sections, MIPS metadata) can't have relocations
            // applied to it.
            SectionSlot::Merge(_)
            | SectionSlot::MipsReginfo(_)
            | SectionSlot::MipsOptions(_)
            | SectionSlot::MipsAbiflags(_) => {
                bail!(
                    "{}: relocations pointing to SHF_MERGE are not supported",
                    self.input
                );
            }
            SectionSlot::Unused => {
                bail!("{}: unsupported relocation reference", self.input);
            }
        }
        Ok(())
    }

    /// Second pass: build one body per symbol table entry.
    fn initialize_symbols<Elf: FileHeader<Endian = Endianness>>(
        &mut self,
        file: &File<'data, Elf>,
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result {
        self.first_non_local = file
            .first_non_local()
            .with_context(|| self.input.to_string())?;

        let syms = file.symbols.symbols();
        self.symbols.reserve(syms.len());
        for (i, sym) in syms.iter().enumerate() {
            let body = self.create_symbol_body(file, sym, SymbolIndex(i), symbol_db)?;
            self.symbols.push(body);
        }
        Ok(())
    }

    fn create_symbol_body<Elf: FileHeader<Endian = Endianness>>(
        &self,
        file: &File<'data, Elf>,
        sym: &'data Elf::Sym,
        index: SymbolIndex,
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result<SymbolBody<'data>> {
        let e = file.endian;
        let section = self.section_of_symbol(file, sym, index)?;

        if sym.st_bind() == object::elf::STB_LOCAL {
            let name = file.symbol_name(sym)?;
            let kind = if sym.st_shndx(e) == object::elf::SHN_UNDEF {
                LocalSymbolKind::Undefined
            } else {
                LocalSymbolKind::DefinedRegular {
                    value: sym.st_value(e).into(),
                    size: sym.st_size(e).into(),
                    ty: sym.st_type(),
                    section,
                }
            };
            return Ok(SymbolBody::Local(LocalSymbol { name, kind }));
        }

        let name = file.symbol_name(sym)?;
        let binding = SymbolBinding::from_raw(sym.st_bind()).ok_or_else(|| {
            anyhow::anyhow!("{}: unexpected binding: {}", self.input, sym.st_bind())
        })?;
        let visibility = keel_utils::elf::SymbolVisibility::from_st_other(sym.st_visibility());

        let id = match sym.st_shndx(e) {
            object::elf::SHN_UNDEF => symbol_db.add_undefined(
                name,
                binding,
                visibility,
                sym.st_type(),
                false,
                self.file_id,
            ),
            object::elf::SHN_COMMON => symbol_db.add_common(
                name,
                sym.st_size(e).into(),
                sym.st_value(e).into(),
                binding,
                visibility,
                sym.st_type(),
                self.file_id,
            ),
            _ => {
                let discarded =
                    section.is_some_and(|idx| self.sections[idx.0].is_discarded());
                if discarded {
                    // The defining section was eliminated by COMDAT
                    // deduplication; the symbol degrades to a reference.
                    symbol_db.add_undefined(
                        name,
                        binding,
                        visibility,
                        sym.st_type(),
                        false,
                        self.file_id,
                    )
                } else {
                    symbol_db.add_regular(
                        name,
                        ElfSymbolInfo::new::<Elf>(e, sym, binding),
                        section,
                        self.file_id,
                    )
                }
            }
        };
        Ok(SymbolBody::Global(id))
    }

    /// Looks up the section a symbol refers to, if any. A null section is
    /// allowed: broken assemblers have been seen associating STT_SECTION
    /// symbols with non-allocated tables.
    fn section_of_symbol<Elf: FileHeader<Endian = Endianness>>(
        &self,
        file: &File<'data, Elf>,
        sym: &Elf::Sym,
        index: SymbolIndex,
    ) -> Result<Option<SectionIndex>> {
        let Some(section_index) = file
            .symbol_section(sym, index)
            .with_context(|| self.input.to_string())?
        else {
            return Ok(None);
        };
        ensure!(
            section_index.0 < file.sections.len(),
            "{}: invalid section index: {}",
            self.input,
            section_index.0
        );
        Ok(Some(section_index))
    }

    pub fn section(&self, index: SectionIndex) -> &SectionSlot<'data> {
        &self.sections[index.0]
    }

    /// All symbol bodies, skipping the reserved null entry.
    pub fn symbols(&self) -> &[SymbolBody<'data>] {
        if !self.has_symtab {
            return &self.symbols;
        }
        self.symbols.get(1..).unwrap_or_default()
    }

    /// File-private bodies of the local symbols, skipping the null entry.
    /// Empty when the symbol table claims no non-reserved locals.
    pub fn local_symbols(&self) -> &[SymbolBody<'data>] {
        if !self.has_symtab {
            return &self.symbols;
        }
        self.symbols
            .get(1..self.first_non_local.max(1))
            .unwrap_or_default()
    }

    pub fn non_local_symbols(&self) -> &[SymbolBody<'data>] {
        if !self.has_symtab {
            return &self.symbols;
        }
        self.symbols
            .get(self.first_non_local..)
            .unwrap_or_default()
    }

    /// The GP0 value for MIPS objects: 64-bit objects carry it in the
    /// ODK_REGINFO descriptor of `.MIPS.options`, 32-bit objects in
    /// `.reginfo`. Zero when neither is present.
    pub fn mips_gp0(&self) -> u64 {
        match self.class {
            Class::Elf64 => self
                .sections
                .iter()
                .find_map(|slot| match slot {
                    SectionSlot::MipsOptions(s) => s.gp0,
                    _ => None,
                })
                .unwrap_or(0),
            Class::Elf32 => self
                .sections
                .iter()
                .find_map(|slot| match slot {
                    SectionSlot::MipsReginfo(s) => Some(s.gp0),
                    _ => None,
                })
                .unwrap_or(0),
        }
    }
}

impl std::fmt::Display for ObjectFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.input, f)
    }
}

fn header_info<Elf: FileHeader<Endian = Endianness>>(
    endian: Endianness,
    sec: &Elf::SectionHeader,
) -> SectionHeaderInfo {
    SectionHeaderInfo {
        ty: SectionType::from_header(endian, sec),
        flags: SectionFlags::from_header(endian, sec),
        link: sec.sh_link(endian),
        info: sec.sh_info(endian),
        entsize: sec.sh_entsize(endian).into(),
        addralign: sec.sh_addralign(endian).into(),
        size: sec.sh_size(endian).into(),
        offset: sec.sh_offset(endian).into(),
    }
}

/// Reads a COMDAT group's signature: `sh_link` names a symbol table and
/// `sh_info` the signature symbol within it.
fn group_signature<'data, Elf: FileHeader<Endian = Endianness>>(
    file: &File<'data, Elf>,
    sec: &Elf::SectionHeader,
    input: &InputRef<'data>,
) -> Result<PreHashed<SymbolName<'data>>> {
    let e = file.endian;
    let link = SectionIndex(sec.sh_link(e) as usize);
    let symtab_sec = file
        .section(link)
        .with_context(|| format!("{input}: invalid symbol table in SHT_GROUP"))?;
    ensure!(
        SectionType::from_header(e, symtab_sec) == sht::SYMTAB,
        "{input}: invalid symbol table in SHT_GROUP"
    );
    let symtab = elf::SymbolTable::<Elf>::parse(e, file.data, &file.sections, link, symtab_sec)?;
    let sym = symtab.symbol(SymbolIndex(sec.sh_info(e) as usize))?;
    let name = symtab.symbol_name(e, sym)?;
    Ok(SymbolName::prehashed(name))
}

/// Returns the group's member section indices. Only the COMDAT group format
/// is supported: the first word of the contents must be GRP_COMDAT.
fn group_entries<'data, Elf: FileHeader<Endian = Endianness>>(
    file: &File<'data, Elf>,
    sec: &Elf::SectionHeader,
    input: &InputRef<'data>,
) -> Result<&'data [object::U32Bytes<Endianness>]> {
    let entries: &[object::U32Bytes<Endianness>] =
        sec.data_as_array(file.endian, file.data)?;
    ensure!(
        entries.first().map(|entry| entry.get(file.endian)) == Some(object::elf::GRP_COMDAT),
        "{input}: unsupported SHT_GROUP format"
    );
    Ok(&entries[1..])
}

fn should_merge(config: &Config, header: &SectionHeaderInfo, input: &InputRef) -> Result<bool> {
    // Section merging costs link time; at -O0 we don't do it at all.
    if config.optimize == 0 {
        return Ok(false);
    }

    // A mergeable section with size 0 has no data to merge, and a string
    // section of size 0 doesn't even end with a null. Treat both as
    // non-mergeable rather than making a fuss.
    if header.size == 0 {
        return Ok(false);
    }

    // The ELF spec is unclear about a zero sh_entsize and compilers have
    // shipped string-merge sections with one (Rust 1.13 did), so accept it
    // and degrade to non-mergeable.
    if header.entsize == 0 {
        return Ok(false);
    }
    ensure!(
        header.size % header.entsize == 0,
        "{input}: SHF_MERGE section size must be a multiple of sh_entsize"
    );

    if !header.flags.contains(shf::MERGE) {
        return Ok(false);
    }
    ensure!(
        !header.flags.contains(shf::WRITE),
        "{input}: writable SHF_MERGE section is not supported"
    );

    // Without SHF_STRINGS, entries whose alignment exceeds sh_entsize would
    // need padding after every entity, which the producer could have
    // expressed by just using a larger sh_entsize.
    if header.flags.contains(shf::STRINGS) {
        return Ok(true);
    }
    Ok(header.addralign <= header.entsize)
}

fn parse_reginfo_gp(data: &[u8], endian: Endianness, input: &InputRef) -> Result<u64> {
    ensure!(
        data.len() >= mips::REGINFO32_SIZE,
        "{input}: invalid size of .reginfo section"
    );
    let field = &data[mips::REGINFO32_GP_OFFSET..mips::REGINFO32_GP_OFFSET + 4];
    Ok(endian.read_u32_bytes(field.try_into().unwrap()) as u64)
}

/// Walks the descriptor chain of a `.MIPS.options` section looking for the
/// ODK_REGINFO record.
fn parse_options_gp(data: &[u8], endian: Endianness, input: &InputRef) -> Result<Option<u64>> {
    let mut rest = data;
    while !rest.is_empty() {
        ensure!(
            rest.len() >= mips::OPTIONS_HEADER_SIZE,
            "{input}: invalid size of .MIPS.options section"
        );
        let kind = rest[0];
        let size = rest[1] as usize;
        ensure!(
            size >= mips::OPTIONS_HEADER_SIZE && size <= rest.len(),
            "{input}: invalid size of .MIPS.options section"
        );
        if kind == mips::ODK_REGINFO {
            let payload = &rest[mips::OPTIONS_HEADER_SIZE..size];
            ensure!(
                payload.len() >= mips::REGINFO64_SIZE,
                "{input}: invalid size of .MIPS.options section"
            );
            let field = &payload[mips::REGINFO64_GP_OFFSET..mips::REGINFO64_GP_OFFSET + 8];
            return Ok(Some(endian.read_u64_bytes(field.try_into().unwrap())));
        }
        rest = &rest[size..];
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputRef<'static> {
        InputRef::new(b"test.o", b"")
    }

    fn merge_header(flags: SectionFlags, entsize: u64, size: u64, addralign: u64) -> SectionHeaderInfo {
        SectionHeaderInfo {
            ty: sht::PROGBITS,
            flags,
            link: 0,
            info: 0,
            entsize,
            addralign,
            size,
            offset: 0,
        }
    }

    #[test]
    fn test_should_merge_boundaries() {
        let config = Config::default();
        let strings = shf::MERGE.with(shf::STRINGS);

        // Zero size and zero entsize silently degrade.
        assert!(!should_merge(&config, &merge_header(strings, 1, 0, 1), &input()).unwrap());
        assert!(!should_merge(&config, &merge_header(strings, 0, 8, 1), &input()).unwrap());

        // SHF_STRINGS merges regardless of alignment.
        assert!(should_merge(&config, &merge_header(strings, 1, 8, 16), &input()).unwrap());

        // Without SHF_STRINGS the alignment must not exceed the entry size.
        assert!(should_merge(&config, &merge_header(shf::MERGE, 4, 8, 4), &input()).unwrap());
        assert!(!should_merge(&config, &merge_header(shf::MERGE, 4, 8, 8), &input()).unwrap());

        // Writable merge sections are fatal, as are ragged sizes.
        assert!(
            should_merge(
                &config,
                &merge_header(shf::MERGE.with(shf::WRITE), 4, 8, 4),
                &input()
            )
            .is_err()
        );
        assert!(should_merge(&config, &merge_header(strings, 4, 10, 1), &input()).is_err());

        // -O0 turns merging off entirely.
        let config = Config {
            optimize: 0,
            ..Config::default()
        };
        assert!(!should_merge(&config, &merge_header(strings, 1, 8, 1), &input()).unwrap());
    }

    #[test]
    fn test_mips_reginfo_gp() {
        let mut data = vec![0u8; mips::REGINFO32_SIZE];
        data[mips::REGINFO32_GP_OFFSET..mips::REGINFO32_GP_OFFSET + 4]
            .copy_from_slice(&0x1234_5678u32.to_be_bytes());
        assert_eq!(
            parse_reginfo_gp(&data, Endianness::Big, &input()).unwrap(),
            0x1234_5678
        );
        assert!(parse_reginfo_gp(&data[..8], Endianness::Big, &input()).is_err());
    }

    #[test]
    fn test_mips_options_gp() {
        // One ODK_NULL-ish descriptor followed by an ODK_REGINFO one.
        let mut data = vec![0u8; 8];
        data[0] = 9;
        data[1] = 8;

        let mut reginfo = vec![0u8; mips::OPTIONS_HEADER_SIZE + mips::REGINFO64_SIZE];
        reginfo[0] = mips::ODK_REGINFO;
        reginfo[1] = reginfo.len() as u8;
        let gp_start = mips::OPTIONS_HEADER_SIZE + mips::REGINFO64_GP_OFFSET;
        reginfo[gp_start..gp_start + 8].copy_from_slice(&0xdead_beefu64.to_le_bytes());
        data.extend_from_slice(&reginfo);

        assert_eq!(
            parse_options_gp(&data, Endianness::Little, &input()).unwrap(),
            Some(0xdead_beef)
        );
        assert_eq!(
            parse_options_gp(&data[..8], Endianness::Little, &input()).unwrap(),
            None
        );
        // A descriptor with a zero size would never advance.
        let bad = vec![0u8; 8];
        assert!(parse_options_gp(&bad, Endianness::Little, &input()).is_err());
    }
}
