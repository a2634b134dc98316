//! String interning for document names.

use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// An interned name identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Text(u32);

/// Deduplicates names while a single document is parsed and planned.
///
/// Interior mutability keeps the parser API `&self`; an interner is scoped to
/// one request and never crosses threads.
#[derive(Debug)]
pub struct Interner {
    map: RefCell<FxHashMap<String, Text>>,
    strings: RefCell<Vec<String>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// Creates a new interner with the built-in scalars and keywords pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let interner = Self {
            map: RefCell::new(FxHashMap::default()),
            strings: RefCell::new(Vec::new()),
        };

        for keyword in [
            "Int",
            "Float",
            "String",
            "Boolean",
            "ID",
            "query",
            "mutation",
            "subscription",
            "fragment",
            "on",
            "true",
            "false",
            "null",
            "__typename",
        ] {
            interner.intern(keyword);
        }

        interner
    }

    /// Interns a string, returning its identifier.
    pub fn intern(&self, s: &str) -> Text {
        let mut map = self.map.borrow_mut();
        if let Some(&id) = map.get(s) {
            return id;
        }

        let mut strings = self.strings.borrow_mut();
        let id = Text(strings.len() as u32);
        strings.push(s.to_string());
        map.insert(s.to_string(), id);
        id
    }

    /// Gets the string for an identifier.
    #[must_use]
    pub fn get(&self, id: Text) -> String {
        let strings = self.strings.borrow();
        strings.get(id.0 as usize).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let interner = Interner::new();
        let a = interner.intern("posts");
        let b = interner.intern("posts");
        let c = interner.intern("users");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.get(c), "users");
    }

    #[test]
    fn test_builtins_preregistered() {
        let interner = Interner::new();
        let before = interner.len();
        interner.intern("__typename");
        interner.intern("Int");
        assert_eq!(interner.len(), before);
    }
}
