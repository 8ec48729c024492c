//! The process-wide COMDAT group signature set. Groups are deduplicated by
//! signature across all input files; the first file to claim a signature
//! keeps its members and every later duplicate is discarded wholesale. The
//! set is passed explicitly into parser entry points, never held in a global.

use crate::hash::PreHashed;
use crate::hash::PrehashedMap;
use crate::input_data::FileId;
use crate::symbol::SymbolName;

#[derive(Default)]
pub struct ComdatGroups<'data> {
    owners: PrehashedMap<SymbolName<'data>, FileId>,
}

impl<'data> ComdatGroups<'data> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim `signature` for `file`. Returns true if this was the
    /// first claim, in which case the caller keeps its group members.
    pub(crate) fn insert(
        &mut self,
        signature: PreHashed<SymbolName<'data>>,
        file: FileId,
    ) -> bool {
        match self.owners.entry(signature) {
            hashbrown::hash_map::Entry::Occupied(_) => false,
            hashbrown::hash_map::Entry::Vacant(entry) => {
                entry.insert(file);
                true
            }
        }
    }

    /// The file that first claimed `signature`, if any.
    pub fn owner(&self, signature: &[u8]) -> Option<FileId> {
        self.owners.get(&SymbolName::prehashed(signature)).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let mut groups = ComdatGroups::new();
        let a = FileId::new(1);
        let b = FileId::new(2);
        assert!(groups.insert(SymbolName::prehashed(b"grp"), a));
        assert!(!groups.insert(SymbolName::prehashed(b"grp"), b));
        assert_eq!(groups.owner(b"grp"), Some(a));
        assert!(groups.insert(SymbolName::prehashed(b"other"), b));
        assert_eq!(groups.len(), 2);
    }
}
