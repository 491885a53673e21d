//! Host services this crate requires but does not implement.
//!
//! The reader, macro expander, heap, and VM are external collaborators. This
//! crate narrows its dependency on them to exactly the two services analysis
//! and codegen cannot synthesize themselves: interning (identity for every
//! binding lookup depends on it) and `find_rename` (the macro expander's
//! post-expansion name for a base library binding, used to build the
//! primitive table). List construction/access (`cons`, `car`, `cdr`, ...) is
//! not part of [`Host`] here because [`crate::value::Value`] already owns
//! that data plainly rather than through a host heap (see `value.rs`'s
//! module doc); aborting a compilation is `Result`-propagation through
//! [`crate::error::CompileError`] rather than a host callback; non-fatal
//! diagnostics go through [`crate::error::WarningSink`].

use crate::intern::{Interner, SymbolId};

/// Base-library names a real macro expander's rename table must cover.
/// [`TestHost`] pre-interns exactly these so `find_rename` can stay a
/// read-only lookup.
const BASE_LIBRARY_NAMES: &[&str] = &[
    "cons",
    "car",
    "cdr",
    "null?",
    "symbol?",
    "pair?",
    "+",
    "-",
    "*",
    "/",
    "=",
    "<",
    "<=",
    ">",
    ">=",
    "not",
    "values",
    "call-with-values",
];

/// Special-form keywords the macro expander's rename table must also cover,
/// since dispatch runs against expander-resolved names the same as
/// primitives. Not part of [`Host::global_symbols`] — these are keywords,
/// not variables.
const SPECIAL_FORM_NAMES: &[&str] = &["define", "lambda", "if", "begin", "set!", "quote"];

/// Everything the analyzer needs from outside this crate.
pub trait Host {
    fn intern(&mut self, name: &str) -> SymbolId;

    fn resolve(&self, sym: SymbolId) -> &str;

    /// The macro expander's renamed symbol for `name` in the base library
    /// environment, or `None` if `name` has no binding there.
    fn find_rename(&self, name: &str) -> Option<SymbolId>;

    /// Every symbol currently bound in the global environment, in no
    /// particular order. The root scope's `locals` is preseeded with these
    /// so references to predefined globals do not error; the analyzer sorts
    /// before preseeding so a given host state compiles deterministically
    /// regardless of the order this returns them in.
    fn global_symbols(&self) -> Vec<SymbolId>;
}

/// A `Host` for tests and standalone use: its own interner, with the base
/// library names pre-interned so `find_rename` is identity for them —
/// equivalent to a macro expander whose rename table leaves primitives
/// untouched because nothing has shadowed them yet.
#[derive(Debug)]
pub struct TestHost {
    interner: Interner,
    globals: Vec<SymbolId>,
}

impl Default for TestHost {
    fn default() -> Self {
        let mut interner = Interner::new();
        let globals = BASE_LIBRARY_NAMES.iter().map(|name| interner.intern(name)).collect();
        for name in SPECIAL_FORM_NAMES {
            interner.intern(name);
        }
        Self { interner, globals }
    }
}

impl TestHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` to the simulated global environment, interning it first
    /// if needed. Lets tests exercise `GREF`/`GSET` against names beyond the
    /// base library.
    pub fn declare_global(&mut self, name: &str) -> SymbolId {
        let sym = self.interner.intern(name);
        if !self.globals.contains(&sym) {
            self.globals.push(sym);
        }
        sym
    }
}

impl Host for TestHost {
    fn intern(&mut self, name: &str) -> SymbolId {
        self.interner.intern(name)
    }

    fn resolve(&self, sym: SymbolId) -> &str {
        self.interner.resolve(sym)
    }

    fn find_rename(&self, name: &str) -> Option<SymbolId> {
        self.interner.get(name)
    }

    fn global_symbols(&self) -> Vec<SymbolId> {
        self.globals.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_library_names_resolve_without_mutation() {
        let host = TestHost::new();
        for name in BASE_LIBRARY_NAMES {
            assert!(host.find_rename(name).is_some(), "{name} should be pre-interned");
        }
        assert!(host.find_rename("not-a-primitive").is_none());
    }
}
