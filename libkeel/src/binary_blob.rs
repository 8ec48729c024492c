//! Wraps an arbitrary byte buffer in a minimal relocatable ELF so that it can
//! be linked like any other object. The blob lands in a `.data` section and
//! is exposed via `_binary_<name>_{start,end,size}` symbols, with every
//! non-alphanumeric byte of the path replaced by '_'.

use crate::config::Config;
use crate::elf::Class;
use crate::error::Context as _;
use crate::error::Result;
use keel_utils::elf::secnames;
use object::BinaryFormat;
use object::SectionKind;
use object::SymbolKind;
use object::SymbolScope;
use object::write;

/// Builds the synthetic ELF. The caller re-ingests the result through the
/// regular object path.
pub(crate) fn create_elf(blob: &[u8], name: &[u8], config: &Config) -> Result<Vec<u8>> {
    let architecture = architecture_for(config)
        .with_context(|| format!("cannot wrap binary `{}`", String::from_utf8_lossy(name)))?;

    let mut out = write::Object::new(BinaryFormat::Elf, architecture, config.eendian);
    let data_section = out.add_section(Vec::new(), secnames::DATA.to_vec(), SectionKind::ReadOnlyData);
    out.append_section_data(data_section, blob, 8);

    let sanitized = sanitize(name);
    let size = blob.len() as u64;

    let mut add_symbol = |suffix: &str, value: u64, section: write::SymbolSection| {
        out.add_symbol(write::Symbol {
            name: format!("_binary_{sanitized}_{suffix}").into_bytes(),
            value,
            size: 0,
            kind: SymbolKind::Data,
            scope: SymbolScope::Dynamic,
            weak: false,
            section,
            flags: object::SymbolFlags::None,
        });
    };
    add_symbol("start", 0, write::SymbolSection::Section(data_section));
    add_symbol("end", size, write::SymbolSection::Section(data_section));
    add_symbol("size", size, write::SymbolSection::Absolute);

    out.write()
        .with_context(|| format!("failed to wrap binary `{}`", String::from_utf8_lossy(name)))
}

/// Replaces every non-alphanumeric byte with '_' so the path can be part of a
/// symbol name.
fn sanitize(name: &[u8]) -> String {
    name.iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() {
                b as char
            } else {
                '_'
            }
        })
        .collect()
}

fn architecture_for(config: &Config) -> Result<object::Architecture> {
    use object::elf::*;

    let architecture = match (config.emachine, config.eclass) {
        (EM_X86_64, _) => object::Architecture::X86_64,
        (EM_386, _) => object::Architecture::I386,
        (EM_AARCH64, _) => object::Architecture::Aarch64,
        (EM_ARM, _) => object::Architecture::Arm,
        (EM_MIPS, Class::Elf32) => object::Architecture::Mips,
        (EM_MIPS, Class::Elf64) => object::Architecture::Mips64,
        (EM_PPC, _) => object::Architecture::PowerPc,
        (EM_PPC64, _) => object::Architecture::PowerPc64,
        (machine, _) => anyhow::bail!("unsupported machine for binary input: {machine}"),
    };
    Ok(architecture)
}
