//! Ingestion of LTO bitcode. We never read bitcode ourselves; the driver
//! supplies a reader that exposes a symbol-only view of the module, and we
//! map each of its symbols to a linker symbol honoring COMDAT membership and
//! the common/undefined/weak flags.

use crate::bail;
use crate::comdat::ComdatGroups;
use crate::elf::Class;
use crate::error::Result;
use crate::input_data::FileId;
use crate::input_data::InputRef;
use crate::symbol::SymbolName;
use crate::symbol_db::SymbolDb;
use crate::timing_phase;
use keel_utils::elf::SymbolBinding;
use keel_utils::elf::SymbolVisibility;
use object::Endianness;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BitcodeSymbolFlags: u32 {
        const UNDEFINED = 1 << 0;
        const COMMON = 1 << 1;
        const WEAK = 1 << 2;
        const TLS = 1 << 3;
        const CAN_OMIT_FROM_DYN_SYM = 1 << 4;
    }
}

/// One symbol of a bitcode module, as exposed by the external reader.
#[derive(Debug, Clone, Copy)]
pub struct BitcodeSymbol<'data> {
    pub name: &'data [u8],
    pub flags: BitcodeSymbolFlags,
    pub visibility: SymbolVisibility,

    /// Index into the reader's comdat table, when the symbol is a member of
    /// a comdat.
    pub comdat: Option<usize>,

    pub common_size: u64,
    pub common_align: u64,
}

/// The symbol-only view of a bitcode module. Implemented by the LTO backend;
/// tests use a fake. Everything returned must outlive the link ('data), which
/// in practice means the backend keeps its modules alive alongside the input
/// buffers.
pub trait BitcodeReader<'data> {
    fn target_triple(&self) -> &str;

    /// Comdat names defined by the module, in table order.
    fn comdat_table(&self) -> &[&'data [u8]];

    fn symbols(&self) -> &[BitcodeSymbol<'data>];
}

/// Creates readers from raw bitcode buffers, standing in for the LTO
/// backend's module loader.
pub trait BitcodeReaderFactory<'data> {
    fn create(
        &self,
        data: &'data [u8],
        name: &[u8],
    ) -> Result<Box<dyn BitcodeReader<'data> + 'data>>;
}

pub struct BitcodeFile<'data> {
    pub input: InputRef<'data>,
    pub file_id: FileId,
    pub class: Class,
    pub endian: Endianness,
    pub emachine: u16,
    pub reader: Box<dyn BitcodeReader<'data> + 'data>,
}

impl<'data> BitcodeFile<'data> {
    pub(crate) fn new(
        input: InputRef<'data>,
        file_id: FileId,
        factory: &dyn BitcodeReaderFactory<'data>,
    ) -> Result<Box<Self>> {
        let reader = factory.create(input.data, input.name)?;
        let (class, endian, emachine) = machine_from_triple(reader.target_triple(), &input)?;
        Ok(Box::new(BitcodeFile {
            input,
            file_id,
            class,
            endian,
            emachine,
            reader,
        }))
    }

    /// Offers the module's comdats to the global set, then publishes every
    /// symbol. A symbol whose comdat lost the dedup race publishes as
    /// Undefined no matter what else it claims to be.
    pub(crate) fn parse(
        &self,
        comdat_groups: &mut ComdatGroups<'data>,
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result {
        timing_phase!("Parse bitcode", file = %self.input);

        let comdat_table = self.reader.comdat_table();
        let mut kept = vec![false; comdat_table.len()];
        for (i, comdat) in comdat_table.iter().enumerate() {
            kept[i] = comdat_groups.insert(SymbolName::prehashed(comdat), self.file_id);
        }

        for sym in self.reader.symbols() {
            self.create_symbol(sym, &kept, symbol_db)?;
        }
        Ok(())
    }

    fn create_symbol(
        &self,
        sym: &BitcodeSymbol<'data>,
        kept_comdats: &[bool],
        symbol_db: &mut SymbolDb<'data>,
    ) -> Result {
        let binding = if sym.flags.contains(BitcodeSymbolFlags::WEAK) {
            SymbolBinding::Weak
        } else {
            SymbolBinding::Global
        };
        let ty = if sym.flags.contains(BitcodeSymbolFlags::TLS) {
            object::elf::STT_TLS
        } else {
            object::elf::STT_NOTYPE
        };
        let can_omit = sym.flags.contains(BitcodeSymbolFlags::CAN_OMIT_FROM_DYN_SYM);

        if let Some(comdat) = sym.comdat {
            let kept = *kept_comdats
                .get(comdat)
                .ok_or_else(|| anyhow::anyhow!("{}: invalid comdat index", self.input))?;
            if !kept {
                symbol_db.add_undefined(
                    sym.name,
                    binding,
                    sym.visibility,
                    ty,
                    can_omit,
                    self.file_id,
                );
                return Ok(());
            }
        }

        if sym.flags.contains(BitcodeSymbolFlags::UNDEFINED) {
            symbol_db.add_undefined(
                sym.name,
                binding,
                sym.visibility,
                ty,
                can_omit,
                self.file_id,
            );
        } else if sym.flags.contains(BitcodeSymbolFlags::COMMON) {
            symbol_db.add_common(
                sym.name,
                sym.common_size,
                sym.common_align,
                binding,
                sym.visibility,
                object::elf::STT_OBJECT,
                self.file_id,
            );
        } else {
            symbol_db.add_bitcode(
                sym.name,
                binding,
                sym.visibility,
                ty,
                can_omit,
                self.file_id,
            );
        }
        Ok(())
    }
}

impl std::fmt::Display for BitcodeFile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.input, f)
    }
}

/// Lowers a target triple to `(class, endian, e_machine)`. Triples whose
/// architecture we don't recognise are fatal; LTO can't proceed without a
/// machine for the output.
fn machine_from_triple(triple: &str, input: &InputRef) -> Result<(Class, Endianness, u16)> {
    use object::elf::*;

    let arch = triple.split('-').next().unwrap_or_default();
    let is_iamcu = triple
        .split('-')
        .any(|component| component.starts_with("elfiamcu"));

    let (class, endian, machine) = match arch {
        "aarch64" => (Class::Elf64, Endianness::Little, EM_AARCH64),
        "arm" => (Class::Elf32, Endianness::Little, EM_ARM),
        "mips" => (Class::Elf32, Endianness::Big, EM_MIPS),
        "mipsel" => (Class::Elf32, Endianness::Little, EM_MIPS),
        "mips64" => (Class::Elf64, Endianness::Big, EM_MIPS),
        "mips64el" => (Class::Elf64, Endianness::Little, EM_MIPS),
        "ppc" | "powerpc" => (Class::Elf32, Endianness::Big, EM_PPC),
        "ppc64" | "powerpc64" => (Class::Elf64, Endianness::Big, EM_PPC64),
        "i386" | "i486" | "i586" | "i686" => (
            Class::Elf32,
            Endianness::Little,
            if is_iamcu { EM_IAMCU } else { EM_386 },
        ),
        "x86_64" => (Class::Elf64, Endianness::Little, EM_X86_64),
        _ => bail!("{input}: could not infer e_machine from bitcode target triple {triple}"),
    };
    Ok((class, endian, machine))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputRef<'static> {
        InputRef::new(b"foo.bc", b"")
    }

    #[test]
    fn test_machine_from_triple() {
        let cases: &[(&str, Class, Endianness, u16)] = &[
            ("x86_64-unknown-linux-gnu", Class::Elf64, Endianness::Little, object::elf::EM_X86_64),
            ("i686-pc-linux-gnu", Class::Elf32, Endianness::Little, object::elf::EM_386),
            ("i586-intel-elfiamcu", Class::Elf32, Endianness::Little, object::elf::EM_IAMCU),
            ("aarch64-linux-gnu", Class::Elf64, Endianness::Little, object::elf::EM_AARCH64),
            ("arm-none-eabi", Class::Elf32, Endianness::Little, object::elf::EM_ARM),
            ("mips-linux-gnu", Class::Elf32, Endianness::Big, object::elf::EM_MIPS),
            ("mips64el-linux-gnu", Class::Elf64, Endianness::Little, object::elf::EM_MIPS),
            ("powerpc64-linux-gnu", Class::Elf64, Endianness::Big, object::elf::EM_PPC64),
        ];
        for (triple, class, endian, machine) in cases {
            let got = machine_from_triple(triple, &input()).unwrap();
            assert_eq!(got, (*class, *endian, *machine), "{triple}");
        }
        assert!(machine_from_triple("riscv64-unknown-elf", &input()).is_err());
        assert!(machine_from_triple("", &input()).is_err());
    }
}
