//! The process-wide configuration record. The command-line driver populates
//! this before any input file is ingested; the parsers only read it.

use crate::elf::Class;
use object::Endianness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strip {
    #[default]
    None,
    Debug,
    All,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub strip: Strip,

    /// Optimisation level. At -O0 we skip section merging, which makes the
    /// linker faster at the cost of a bigger output.
    pub optimize: u8,

    /// Whether we're producing a relocatable output (`-r`). Relocation
    /// sections are then copied through rather than interpreted.
    pub relocatable: bool,

    /// The default output machine. Used when synthesising ELF around raw
    /// binary data before any real ELF input has been seen.
    pub emachine: u16,

    /// Class and endianness that go with `emachine` for synthesised files.
    pub eclass: Class,
    pub eendian: Endianness,

    /// Whether shared objects are being added under `--as-needed` semantics.
    pub as_needed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strip: Strip::None,
            optimize: 1,
            relocatable: false,
            emachine: object::elf::EM_X86_64,
            eclass: Class::Elf64,
            eendian: Endianness::Little,
            as_needed: false,
        }
    }
}
