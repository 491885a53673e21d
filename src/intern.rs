//! Symbol interning for the analyzer and code generator.
//!
//! Every identifier the analyzer touches — formal parameters, `define`d names,
//! renamed primitives, quoted symbols — is interned once and compared
//! thereafter by [`SymbolId`] identity, never by string equality. This is not
//! an optimization: deciding whether a call head is really `cons` or a user
//! binding that merely shares the spelling depends on index identity.

use ahash::AHashMap;

/// Index into the [`Interner`]'s storage.
///
/// Uses `u32` to keep the common case (millions of symbols) cheap to copy and
/// compare; identity is the index itself, so two `SymbolId`s compare equal
/// iff they were interned from the same spelling through the same interner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Builds a `SymbolId` from a raw index.
    ///
    /// Only meant for round-tripping indices already known to have come out
    /// of the same interner (e.g. when replaying a `syms[]` table).
    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interns symbol spellings and hands back stable, comparable [`SymbolId`]s.
///
/// A growable `Vec` for name lookup by id, plus an `AHashMap` for the reverse
/// direction so re-interning the same spelling is O(1) and idempotent.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<Box<str>>,
    ids: AHashMap<Box<str>, SymbolId>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning its `SymbolId`. Re-interning an already-seen
    /// spelling returns the same id every time.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = SymbolId(u32::try_from(self.names.len()).expect("symbol table exceeds u32::MAX entries"));
        self.names.push(name.into());
        self.ids.insert(name.into(), id);
        id
    }

    /// Looks up `name`'s id without interning it. Returns `None` if `name`
    /// has never been interned.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    /// Looks up the spelling for an already-interned id.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this interner.
    #[must_use]
    pub fn resolve(&self, id: SymbolId) -> &str {
        &self.names[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_spelling_returns_same_id() {
        let mut interner = Interner::new();
        let a = interner.intern("cons");
        let b = interner.intern("cons");
        assert_eq!(a, b);
    }

    #[test]
    fn interning_distinct_spellings_returns_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern("cons");
        let b = interner.intern("car");
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_round_trips_the_spelling() {
        let mut interner = Interner::new();
        let id = interner.intern("lambda");
        assert_eq!(interner.resolve(id), "lambda");
    }
}
