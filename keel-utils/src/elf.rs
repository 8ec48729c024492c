use object::read::elf::SectionHeader;

/// Section flag bit values.
#[allow(unused)]
pub mod shf {
    use super::SectionFlags;

    pub const WRITE: SectionFlags = SectionFlags::from_u64(object::elf::SHF_WRITE as u64);
    pub const ALLOC: SectionFlags = SectionFlags::from_u64(object::elf::SHF_ALLOC as u64);
    pub const EXECINSTR: SectionFlags = SectionFlags::from_u64(object::elf::SHF_EXECINSTR as u64);
    pub const MERGE: SectionFlags = SectionFlags::from_u64(object::elf::SHF_MERGE as u64);
    pub const STRINGS: SectionFlags = SectionFlags::from_u64(object::elf::SHF_STRINGS as u64);
    pub const INFO_LINK: SectionFlags = SectionFlags::from_u64(object::elf::SHF_INFO_LINK as u64);
    pub const LINK_ORDER: SectionFlags = SectionFlags::from_u64(object::elf::SHF_LINK_ORDER as u64);
    pub const GROUP: SectionFlags = SectionFlags::from_u64(object::elf::SHF_GROUP as u64);
    pub const TLS: SectionFlags = SectionFlags::from_u64(object::elf::SHF_TLS as u64);
    pub const COMPRESSED: SectionFlags = SectionFlags::from_u64(object::elf::SHF_COMPRESSED as u64);
    pub const EXCLUDE: SectionFlags = SectionFlags::from_u64(object::elf::SHF_EXCLUDE as u64);
}

/// Section type values.
#[allow(unused)]
pub mod sht {
    use super::SectionType;

    pub const NULL: SectionType = SectionType::from_u32(object::elf::SHT_NULL);
    pub const PROGBITS: SectionType = SectionType::from_u32(object::elf::SHT_PROGBITS);
    pub const SYMTAB: SectionType = SectionType::from_u32(object::elf::SHT_SYMTAB);
    pub const STRTAB: SectionType = SectionType::from_u32(object::elf::SHT_STRTAB);
    pub const RELA: SectionType = SectionType::from_u32(object::elf::SHT_RELA);
    pub const HASH: SectionType = SectionType::from_u32(object::elf::SHT_HASH);
    pub const DYNAMIC: SectionType = SectionType::from_u32(object::elf::SHT_DYNAMIC);
    pub const NOTE: SectionType = SectionType::from_u32(object::elf::SHT_NOTE);
    pub const NOBITS: SectionType = SectionType::from_u32(object::elf::SHT_NOBITS);
    pub const REL: SectionType = SectionType::from_u32(object::elf::SHT_REL);
    pub const DYNSYM: SectionType = SectionType::from_u32(object::elf::SHT_DYNSYM);
    pub const GROUP: SectionType = SectionType::from_u32(object::elf::SHT_GROUP);
    pub const SYMTAB_SHNDX: SectionType = SectionType::from_u32(object::elf::SHT_SYMTAB_SHNDX);
    pub const GNU_VERSYM: SectionType = SectionType::from_u32(object::elf::SHT_GNU_VERSYM);
    pub const GNU_VERDEF: SectionType = SectionType::from_u32(object::elf::SHT_GNU_VERDEF);
    pub const GNU_VERNEED: SectionType = SectionType::from_u32(object::elf::SHT_GNU_VERNEED);
    pub const ARM_ATTRIBUTES: SectionType = SectionType::from_u32(object::elf::SHT_ARM_ATTRIBUTES);
    pub const MIPS_REGINFO: SectionType = SectionType::from_u32(object::elf::SHT_MIPS_REGINFO);
    pub const MIPS_OPTIONS: SectionType = SectionType::from_u32(object::elf::SHT_MIPS_OPTIONS);
    // `object` does not expose a `SHT_MIPS_ABIFLAGS` constant; use the value
    // defined by the MIPS ABI extensions directly.
    pub const MIPS_ABIFLAGS: SectionType = SectionType::from_u32(0x7000_002a);
}

/// Names of sections that the ingestion code handles specially.
pub mod secnames {
    pub const EH_FRAME: &[u8] = b".eh_frame";
    pub const NOTE_GNU_STACK: &[u8] = b".note.GNU-stack";
    pub const NOTE_GNU_SPLIT_STACK: &[u8] = b".note.GNU-split-stack";
    pub const DEBUG_PREFIX: &[u8] = b".debug";
    pub const DATA: &[u8] = b".data";
}

/// Layout facts about the MIPS target-specific sections we consume.
pub mod mips {
    /// Descriptor kind of an `Elf_Mips_Options` record carrying register usage
    /// information.
    pub const ODK_REGINFO: u8 = 1;

    /// Size of the fixed descriptor header in a `.MIPS.options` section.
    pub const OPTIONS_HEADER_SIZE: usize = 8;

    /// Size of `Elf32_RegInfo` and the offset of `ri_gp_value` within it.
    pub const REGINFO32_SIZE: usize = 24;
    pub const REGINFO32_GP_OFFSET: usize = 20;

    /// Size of `Elf64_RegInfo` and the offset of `ri_gp_value` within it.
    pub const REGINFO64_SIZE: usize = 32;
    pub const REGINFO64_GP_OFFSET: usize = 24;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SectionFlags(u64);

impl SectionFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_header<S: SectionHeader>(endian: S::Endian, header: &S) -> Self {
        Self(header.sh_flags(endian).into())
    }

    pub fn contains(self, flag: SectionFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub const fn from_u64(raw: u64) -> SectionFlags {
        SectionFlags(raw)
    }

    /// Returns self with the specified flags set.
    #[must_use]
    pub const fn with(self, flags: SectionFlags) -> SectionFlags {
        SectionFlags(self.0 | flags.0)
    }

    /// Returns self with the specified flags cleared.
    #[must_use]
    pub const fn without(self, flags: SectionFlags) -> SectionFlags {
        SectionFlags(self.0 & !flags.0)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionType(u32);

impl SectionType {
    pub fn from_header<S: SectionHeader>(endian: S::Endian, header: &S) -> Self {
        Self(header.sh_type(endian))
    }

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
    GnuUnique,
}

impl SymbolBinding {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            object::elf::STB_LOCAL => Some(Self::Local),
            object::elf::STB_GLOBAL => Some(Self::Global),
            object::elf::STB_WEAK => Some(Self::Weak),
            object::elf::STB_GNU_UNIQUE => Some(Self::GnuUnique),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::Local => object::elf::STB_LOCAL,
            Self::Global => object::elf::STB_GLOBAL,
            Self::Weak => object::elf::STB_WEAK,
            Self::GnuUnique => object::elf::STB_GNU_UNIQUE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolVisibility {
    Default,
    Internal,
    Hidden,
    Protected,
}

impl SymbolVisibility {
    /// Extracts the visibility from a symbol's `st_other` field.
    pub fn from_st_other(st_other: u8) -> Self {
        match st_other & 0x3 {
            object::elf::STV_INTERNAL => Self::Internal,
            object::elf::STV_HIDDEN => Self::Hidden,
            object::elf::STV_PROTECTED => Self::Protected,
            _ => Self::Default,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::Default => object::elf::STV_DEFAULT,
            Self::Internal => object::elf::STV_INTERNAL,
            Self::Hidden => object::elf::STV_HIDDEN,
            Self::Protected => object::elf::STV_PROTECTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_flags() {
        let flags = shf::MERGE.with(shf::STRINGS);
        assert!(flags.contains(shf::MERGE));
        assert!(flags.contains(shf::STRINGS));
        assert!(!flags.contains(shf::WRITE));
        assert!(!flags.without(shf::MERGE).contains(shf::MERGE));
    }

    #[test]
    fn test_symbol_binding_round_trip() {
        for raw in [
            object::elf::STB_LOCAL,
            object::elf::STB_GLOBAL,
            object::elf::STB_WEAK,
            object::elf::STB_GNU_UNIQUE,
        ] {
            assert_eq!(SymbolBinding::from_raw(raw).unwrap().raw(), raw);
        }
        assert!(SymbolBinding::from_raw(3).is_none());
    }

    #[test]
    fn test_visibility_ignores_other_bits() {
        assert_eq!(
            SymbolVisibility::from_st_other(0xf0 | object::elf::STV_HIDDEN),
            SymbolVisibility::Hidden
        );
    }
}
