use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Name-to-slot resolver. Tables nest through `outer`: the outermost table
/// holds globals, every enclosed table holds one function's locals.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: FxHashMap<String, Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Detach and return the enclosing table, if any.
    pub fn take_outer(&mut self) -> Option<SymbolTable> {
        self.outer.take().map(|outer| *outer)
    }

    /// Allocate the next slot for `name`. Redefining a name shadows it with a
    /// fresh slot; slots are never reused.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Look `name` up here, then in each enclosing table. Inner names shadow
    /// outer ones.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        match self.store.get(name) {
            Some(symbol) => Some(symbol),
            None => self.outer.as_ref()?.resolve(name),
        }
    }

    /// Whether `name` is defined in this table itself.
    pub fn defines(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    /// Slots handed out so far.
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            scope,
            index,
        }
    }

    #[test]
    fn test_define() {
        let mut global = SymbolTable::new();
        assert_eq!(global.define("a"), sym("a", SymbolScope::Global, 0));
        assert_eq!(global.define("b"), sym("b", SymbolScope::Global, 1));

        let mut first_local = SymbolTable::new_enclosed(global);
        assert_eq!(first_local.define("c"), sym("c", SymbolScope::Local, 0));
        assert_eq!(first_local.define("d"), sym("d", SymbolScope::Local, 1));

        let mut second_local = SymbolTable::new_enclosed(first_local);
        assert_eq!(second_local.define("e"), sym("e", SymbolScope::Local, 0));
        assert_eq!(second_local.define("f"), sym("f", SymbolScope::Local, 1));
    }

    #[test]
    fn test_resolve_global() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        assert_eq!(global.resolve("a"), Some(&sym("a", SymbolScope::Global, 0)));
        assert_eq!(global.resolve("b"), Some(&sym("b", SymbolScope::Global, 1)));
        assert_eq!(global.resolve("c"), None);
    }

    #[test]
    fn test_resolve_walks_outer_chain() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("c");
        local.define("d");

        assert_eq!(local.resolve("a"), Some(&sym("a", SymbolScope::Global, 0)));
        assert_eq!(local.resolve("b"), Some(&sym("b", SymbolScope::Global, 1)));
        assert_eq!(local.resolve("c"), Some(&sym("c", SymbolScope::Local, 0)));
        assert_eq!(local.resolve("d"), Some(&sym("d", SymbolScope::Local, 1)));
        assert!(local.defines("c"));
        assert!(!local.defines("a"));
    }

    #[test]
    fn test_inner_shadows_outer() {
        let mut global = SymbolTable::new();
        global.define("x");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("x");

        assert_eq!(local.resolve("x"), Some(&sym("x", SymbolScope::Local, 0)));

        let global = local.take_outer().unwrap();
        assert_eq!(global.resolve("x"), Some(&sym("x", SymbolScope::Global, 0)));
    }

    #[test]
    fn test_redefine_allocates_fresh_slot() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("a");

        assert_eq!(global.resolve("a"), Some(&sym("a", SymbolScope::Global, 1)));
        assert_eq!(global.num_definitions(), 2);
    }
}
