//! Parsing of shared objects. This happens in two phases: the SONAME is
//! extracted first so that the driver can decide (e.g. under --as-needed)
//! whether the DSO is wanted at all; the version definitions and exported
//! symbols are only walked when `parse_rest` is called.

use crate::bail;
use crate::config::Config;
use crate::elf;
use crate::elf::Class;
use crate::elf::ElfSymbolInfo;
use crate::elf::File;
use crate::ensure;
use crate::error::Context as _;
use crate::error::Result;
use crate::input_data::FileId;
use crate::input_data::InputRef;
use crate::symbol::SymbolName;
use crate::symbol_db::SymbolDb;
use crate::timing_phase;
use keel_utils::elf::SymbolBinding;
use object::Endianness;
use object::read::elf::Dyn as _;
use object::read::elf::FileHeader;
use object::read::elf::Sym as _;

/// A version definition from the DSO's verdef chain, indexed by `vd_ndx`.
#[derive(Debug, Clone, Copy)]
pub struct VersionDef<'data> {
    pub index: u16,
    pub flags: u16,
    pub name: &'data [u8],
}

#[derive(Debug)]
pub struct SharedFile<'data> {
    pub input: InputRef<'data>,
    pub file_id: FileId,
    pub class: Class,
    pub endian: Endianness,
    pub emachine: u16,

    /// The DSO's runtime identity: DT_SONAME when present, otherwise the
    /// basename of the file path.
    pub soname: &'data [u8],

    /// Whether this DSO was added under --as-needed semantics.
    pub as_needed: bool,

    /// Version definitions indexed by `vd_ndx`. Entries that aren't
    /// definitions are None. Always has at least length 1.
    pub verdefs: Vec<Option<VersionDef<'data>>>,

    /// Names this DSO imports. Used by the driver when pruning DT_NEEDED.
    pub undefs: Vec<SymbolName<'data>>,
}

impl<'data> SharedFile<'data> {
    /// Phase 1: records the SONAME without touching the symbol table.
    pub(crate) fn parse(
        input: InputRef<'data>,
        file_id: FileId,
        config: &Config,
    ) -> Result<Box<Self>> {
        timing_phase!("Parse shared object", file = %input);

        let (class, _) = elf::parse_ident(input.data).with_context(|| input.to_string())?;
        let (endian, emachine, dt_soname) = match class {
            Class::Elf32 => parse_soname::<elf::Elf32>(&input)?,
            Class::Elf64 => parse_soname::<elf::Elf64>(&input)?,
        };

        Ok(Box::new(SharedFile {
            input,
            file_id,
            class,
            endian,
            emachine,
            soname: dt_soname.unwrap_or_else(|| input.basename()),
            as_needed: config.as_needed,
            verdefs: Vec::new(),
            undefs: Vec::new(),
        }))
    }

    /// Phase 2: walks the verdef chain and publishes one shared symbol per
    /// exported global. Must be called after `parse`.
    pub fn parse_rest(&mut self, symbol_db: &mut SymbolDb<'data>) -> Result {
        timing_phase!("Parse shared object symbols", file = %self.input);

        match self.class {
            Class::Elf32 => self.parse_rest_with::<elf::Elf32>(symbol_db),
            Class::Elf64 => self.parse_rest_with::<elf::Elf64>(symbol_db),
        }
    }

    fn parse_rest_with<Elf: FileHeader<Endian = Endianness>>(
        &mut self,
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result {
        let file = File::<Elf>::parse(self.input.data, true)
            .with_context(|| format!("failed to parse shared object `{}`", self.input))?;
        let e = file.endian;

        let first_non_local = file
            .first_non_local()
            .with_context(|| self.input.to_string())?;

        self.verdefs = parse_verdefs(&file)?;

        // Symbol versions are only meaningful when the DSO has both a versym
        // and a verdef section.
        let have_versions = !file.versym.is_empty() && file.verdef.is_some();

        let syms = file.symbols.symbols();
        for (index, sym) in syms.iter().enumerate().skip(first_non_local) {
            let name = file.symbol_name(sym)?;

            if sym.st_shndx(e) == object::elf::SHN_UNDEF {
                self.undefs.push(SymbolName::new(name));
                continue;
            }

            let mut verdef = None;
            if have_versions {
                let versym = file
                    .versym
                    .get(index)
                    .map_or(object::elf::VER_NDX_GLOBAL, |v| v.0.get(e));

                // Local and hidden versions aren't visible to the link.
                if versym == object::elf::VER_NDX_LOCAL
                    || versym & object::elf::VERSYM_HIDDEN != 0
                {
                    continue;
                }

                if versym != object::elf::VER_NDX_GLOBAL {
                    let vd_index = (versym & object::elf::VERSYM_VERSION) as usize;
                    ensure!(
                        vd_index < self.verdefs.len(),
                        "{}: invalid version definition index {vd_index}",
                        self.input
                    );
                    verdef = self.verdefs[vd_index].is_some().then_some(vd_index as u16);
                }
            }

            let binding = SymbolBinding::from_raw(sym.st_bind()).ok_or_else(|| {
                anyhow::anyhow!("{}: unexpected binding: {}", self.input, sym.st_bind())
            })?;

            symbol_db.add_shared(
                self.file_id,
                name,
                ElfSymbolInfo::new::<Elf>(e, sym, binding),
                verdef,
            );
        }

        Ok(())
    }
}

impl std::fmt::Display for SharedFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.input, f)
    }
}

/// Scans section headers once, then reads the first DT_SONAME entry if there
/// is one. The string-table offset is bounds-checked.
fn parse_soname<'data, Elf: FileHeader<Endian = Endianness>>(
    input: &InputRef<'data>,
) -> Result<(Endianness, u16, Option<&'data [u8]>)> {
    let file = File::<Elf>::parse(input.data, true)
        .with_context(|| format!("failed to parse shared object `{input}`"))?;
    let e = file.endian;

    let mut soname = None;
    for entry in file.dynamic_tags()? {
        let tag: u64 = entry.d_tag(e).into();
        if tag == u64::from(object::elf::DT_SONAME) {
            let val: u64 = entry.d_val(e).into();
            let offset = u32::try_from(val)
                .map_err(|_| anyhow::anyhow!("{input}: invalid DT_SONAME entry"))?;
            let Ok(name) = file.symbols.strings().get(offset) else {
                bail!("{input}: invalid DT_SONAME entry");
            };
            soname = Some(name);
            break;
        }
    }

    Ok((e, file.emachine, soname))
}

/// Builds the `vd_ndx`-indexed version definition array by following the
/// verdef chain. bfd and gold assign identifiers sequentially, so `sh_info`
/// predicts the array size, but we grow it if an actual `vd_ndx` exceeds the
/// prediction.
fn parse_verdefs<'data, Elf: FileHeader<Endian = Endianness>>(
    file: &File<'data, Elf>,
) -> Result<Vec<Option<VersionDef<'data>>>> {
    let mut verdefs = vec![None];

    // Version processing is only needed when the DSO has both sections.
    if file.versym.is_empty() {
        return Ok(verdefs);
    }
    let Some((iterator, string_table_index)) = file.verdef.clone() else {
        return Ok(verdefs);
    };

    let e = file.endian;
    let strings = file
        .sections
        .strings(e, file.data, string_table_index)?;

    verdefs.resize(file.verdefnum as usize + 1, None);

    for record in iterator.take(file.verdefnum as usize) {
        let (verdef, mut aux_iterator) = record?;
        // Every VERDEF entry should have at least one AUX entry carrying the
        // version name.
        let aux = aux_iterator.next()?.context("VERDEF with no AUX entry")?;
        let index = verdef.vd_ndx.get(e) as usize;
        if verdefs.len() <= index {
            verdefs.resize(index + 1, None);
        }
        verdefs[index] = Some(VersionDef {
            index: index as u16,
            flags: verdef.vd_flags.get(e),
            name: aux.name(e, strings)?,
        });
    }

    Ok(verdefs)
}
