use crate::hash::PreHashed;
use std::fmt::Display;

/// The name of a symbol as it appears in an input file. Names are arbitrary
/// bytes, not necessarily UTF-8. We pre-hash names once on creation since
/// they're looked up in several process-wide maps.
#[derive(derive_more::Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolName<'data> {
    #[debug("{}", String::from_utf8_lossy(bytes))]
    bytes: &'data [u8],
}

impl<'data> SymbolName<'data> {
    pub(crate) fn new(bytes: &'data [u8]) -> SymbolName<'data> {
        Self { bytes }
    }

    pub(crate) fn prehashed(bytes: &'data [u8]) -> PreHashed<SymbolName<'data>> {
        PreHashed::new(Self::new(bytes), crate::hash::hash_bytes(bytes))
    }

    pub fn bytes(&self) -> &'data [u8] {
        self.bytes
    }
}

impl Display for SymbolName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Ok(s) = std::str::from_utf8(self.bytes) {
            Display::fmt(s, f)
        } else {
            write!(f, "INVALID UTF-8({:?})", self.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prehashed_names_compare_by_bytes() {
        let a = SymbolName::prehashed(b"_start");
        let b = SymbolName::prehashed(b"_start");
        let c = SymbolName::prehashed(b"main");
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a, c);
    }
}
