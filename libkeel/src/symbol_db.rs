//! The symbol table facade. Parsers publish every non-local symbol they find
//! through the `add_*` operations here; each publication gets its own ID and
//! keeps a back-reference to the file it came from. Name lookup returns the
//! first publication with that name. Selecting the winning definition
//! (strong-over-weak, common merging, lazy extraction triggering) happens in
//! a later link phase, not here.

use crate::elf::ElfSymbolInfo;
use crate::hash::PreHashed;
use crate::hash::PrehashedMap;
use crate::input_data::FileId;
use crate::symbol::SymbolName;
use keel_utils::elf::SymbolBinding;
use keel_utils::elf::SymbolVisibility;
use object::SectionIndex;

/// An ID for a published symbol. Unique per publication, not per name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug)]
pub struct SymbolEntry<'data> {
    pub name: SymbolName<'data>,
    pub file_id: FileId,
    pub def: SymbolDef<'data>,
}

#[derive(Debug)]
pub enum SymbolDef<'data> {
    Undefined {
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
        can_omit_from_dyn_sym: bool,
    },
    Common {
        size: u64,
        alignment: u64,
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
    },
    Regular {
        sym: ElfSymbolInfo,
        /// Section in the owning file. None for absolute symbols.
        section: Option<SectionIndex>,
    },
    Shared {
        sym: ElfSymbolInfo,
        /// Index into the owning shared file's version definition table.
        verdef: Option<u16>,
    },
    Bitcode {
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
        can_omit_from_dyn_sym: bool,
    },
    LazyArchive {
        /// Offset of the member's header within the archive.
        member_offset: u64,
    },
    LazyObject,
    #[doc(hidden)]
    _Data(std::marker::PhantomData<&'data ()>),
}

#[derive(Default)]
pub struct SymbolDb<'data> {
    /// Mapping from global symbol names to the ID of the first publication
    /// with that name. Later publications land in `alternatives`.
    name_to_id: PrehashedMap<SymbolName<'data>, SymbolId>,

    symbols: Vec<SymbolEntry<'data>>,

    /// Additional publications keyed by the first publication of the name.
    alternatives: foldhash::HashMap<SymbolId, Vec<SymbolId>>,
}

impl<'data> SymbolDb<'data> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_undefined(
        &mut self,
        name: &'data [u8],
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
        can_omit_from_dyn_sym: bool,
        file_id: FileId,
    ) -> SymbolId {
        self.insert(
            name,
            file_id,
            SymbolDef::Undefined {
                binding,
                visibility,
                ty,
                can_omit_from_dyn_sym,
            },
        )
    }

    pub(crate) fn add_common(
        &mut self,
        name: &'data [u8],
        size: u64,
        alignment: u64,
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
        file_id: FileId,
    ) -> SymbolId {
        self.insert(
            name,
            file_id,
            SymbolDef::Common {
                size,
                alignment,
                binding,
                visibility,
                ty,
            },
        )
    }

    pub(crate) fn add_regular(
        &mut self,
        name: &'data [u8],
        sym: ElfSymbolInfo,
        section: Option<SectionIndex>,
        file_id: FileId,
    ) -> SymbolId {
        self.insert(name, file_id, SymbolDef::Regular { sym, section })
    }

    pub(crate) fn add_shared(
        &mut self,
        file_id: FileId,
        name: &'data [u8],
        sym: ElfSymbolInfo,
        verdef: Option<u16>,
    ) -> SymbolId {
        self.insert(name, file_id, SymbolDef::Shared { sym, verdef })
    }

    pub(crate) fn add_bitcode(
        &mut self,
        name: &'data [u8],
        binding: SymbolBinding,
        visibility: SymbolVisibility,
        ty: u8,
        can_omit_from_dyn_sym: bool,
        file_id: FileId,
    ) -> SymbolId {
        self.insert(
            name,
            file_id,
            SymbolDef::Bitcode {
                binding,
                visibility,
                ty,
                can_omit_from_dyn_sym,
            },
        )
    }

    pub(crate) fn add_lazy_archive(
        &mut self,
        archive: FileId,
        name: &'data [u8],
        member_offset: u64,
    ) -> SymbolId {
        self.insert(name, archive, SymbolDef::LazyArchive { member_offset })
    }

    pub(crate) fn add_lazy_object(&mut self, name: &'data [u8], file_id: FileId) -> SymbolId {
        self.insert(name, file_id, SymbolDef::LazyObject)
    }

    fn insert(&mut self, name: &'data [u8], file_id: FileId, def: SymbolDef<'data>) -> SymbolId {
        let name = SymbolName::prehashed(name);
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolEntry {
            name: *name,
            file_id,
            def,
        });
        match self.name_to_id.entry(name) {
            hashbrown::hash_map::Entry::Occupied(entry) => {
                self.alternatives.entry(*entry.get()).or_default().push(id);
            }
            hashbrown::hash_map::Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolEntry<'data> {
        &self.symbols[id.as_usize()]
    }

    /// The first publication with the supplied name, if any.
    pub fn get(&self, name: &[u8]) -> Option<SymbolId> {
        self.name_to_id.get(&SymbolName::prehashed(name)).copied()
    }

    /// All publications with the supplied name, in the order the files were
    /// parsed.
    pub fn publications(&self, name: &[u8]) -> impl Iterator<Item = SymbolId> + '_ {
        let first = self.get(name);
        first.into_iter().chain(
            first
                .and_then(|id| self.alternatives.get(&id))
                .map(|v| v.as_slice())
                .unwrap_or_default()
                .iter()
                .copied(),
        )
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }
}
