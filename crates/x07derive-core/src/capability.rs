//! Capabilities and the explicit table of who provides them.
//!
//! There is no global registry: every derivation call receives a
//! [`CapabilityTable`] and the engine extends a private copy of it as groups are
//! derived, so independent requests never share state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Compare,
    Hash,
    Sexp,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Compare, Capability::Hash, Capability::Sexp];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Compare => "compare",
            Capability::Hash => "hash",
            Capability::Sexp => "sexp",
        }
    }

    pub fn parse(s: &str) -> Option<Capability> {
        match s {
            "compare" => Some(Capability::Compare),
            "hash" => Some(Capability::Hash),
            "sexp" => Some(Capability::Sexp),
            _ => None,
        }
    }

    /// The generated functions that together implement this capability.
    pub fn fn_kinds(self) -> &'static [FnKind] {
        match self {
            Capability::Compare => &[FnKind::Compare],
            Capability::Hash => &[FnKind::Hash],
            Capability::Sexp => &[FnKind::SexpOf, FnKind::OfSexp],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated function family. Serialization is two functions (render and
/// parse); the other capabilities are one each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FnKind {
    Compare,
    Hash,
    SexpOf,
    OfSexp,
}

impl FnKind {
    pub fn capability(self) -> Capability {
        match self {
            FnKind::Compare => Capability::Compare,
            FnKind::Hash => Capability::Hash,
            FnKind::SexpOf | FnKind::OfSexp => Capability::Sexp,
        }
    }

    pub fn symbol(self, type_name: &str) -> String {
        match self {
            FnKind::Compare => format!("compare_{type_name}"),
            FnKind::Hash => format!("hash_{type_name}"),
            FnKind::SexpOf => format!("sexp_of_{type_name}"),
            FnKind::OfSexp => format!("{type_name}_of_sexp"),
        }
    }

    /// Name of the capability-function parameter passed for type parameter `p`.
    ///
    /// Always contains `-`, which no identifier can, so a parameter never
    /// shadows a generated or table symbol.
    pub fn param_symbol(self, p: &str) -> String {
        match self {
            FnKind::Compare => format!("cmp-{p}"),
            FnKind::Hash => format!("hash-{p}"),
            FnKind::SexpOf => format!("sexp-of-{p}"),
            FnKind::OfSexp => format!("{p}-of-sexp"),
        }
    }

    pub fn value_params(self) -> &'static [&'static str] {
        match self {
            FnKind::Compare => &["a", "b"],
            FnKind::Hash | FnKind::SexpOf => &["v"],
            FnKind::OfSexp => &["t"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Standard-library entry point (primitives and containers).
    Combinator,
    /// Derived elsewhere and declared by the caller.
    External,
    /// Derived by an earlier group of the current request.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityEntry {
    pub name: String,
    pub arity: usize,
    pub origin: Origin,
    pub symbols: BTreeMap<FnKind, String>,
}

impl CapabilityEntry {
    pub fn new(name: &str, arity: usize, origin: Origin) -> Self {
        CapabilityEntry {
            name: name.to_string(),
            arity,
            origin,
            symbols: BTreeMap::new(),
        }
    }

    /// Adds every function of `cap` under the conventional symbol names,
    /// optionally qualified by `module`.
    pub fn with_capability(mut self, cap: Capability, module: Option<&str>) -> Self {
        for &kind in cap.fn_kinds() {
            let sym = kind.symbol(&self.name);
            let sym = match module {
                Some(m) => format!("{m}.{sym}"),
                None => sym,
            };
            self.symbols.insert(kind, sym);
        }
        self
    }

    pub fn symbol(&self, kind: FnKind) -> Option<&str> {
        self.symbols.get(&kind).map(String::as_str)
    }

    pub fn provides(&self, cap: Capability) -> bool {
        cap.fn_kinds().iter().all(|k| self.symbols.contains_key(k))
    }
}

/// Declaration of a type whose capabilities were derived outside this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDecl {
    pub name: String,
    #[serde(default)]
    pub arity: usize,
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

pub const STDLIB_PRIMITIVES: &[&str] = &["unit", "bool", "int", "float", "char", "string", "bytes"];
pub const STDLIB_CONTAINERS: &[&str] = &["list", "array", "option"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityTable {
    entries: BTreeMap<String, CapabilityEntry>,
}

impl CapabilityTable {
    pub fn empty() -> Self {
        CapabilityTable::default()
    }

    /// Primitives and containers of the standard library, every capability.
    pub fn stdlib() -> Self {
        let mut table = CapabilityTable::empty();
        for name in STDLIB_PRIMITIVES {
            table.register(full_entry(name, 0));
        }
        for name in STDLIB_CONTAINERS {
            table.register(full_entry(name, 1));
        }
        table
    }

    pub fn with_externals(mut self, externals: &[ExternalDecl]) -> Self {
        for decl in externals {
            self.register_external(decl);
        }
        self
    }

    pub fn register(&mut self, entry: CapabilityEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn register_external(&mut self, decl: &ExternalDecl) {
        let mut entry = CapabilityEntry::new(&decl.name, decl.arity, Origin::External);
        for &cap in &decl.capabilities {
            entry = entry.with_capability(cap, decl.module.as_deref());
        }
        self.register(entry);
    }

    /// Adds `cap` for an in-request type once its binding set derived.
    pub(crate) fn record_derived(&mut self, name: &str, arity: usize, cap: Capability) {
        let entry = self
            .entries
            .remove(name)
            .filter(|e| e.origin == Origin::Derived)
            .unwrap_or_else(|| CapabilityEntry::new(name, arity, Origin::Derived));
        self.register(entry.with_capability(cap, None));
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityEntry> {
        self.entries.get(name)
    }

    pub fn lookup(&self, name: &str, kind: FnKind) -> Option<&str> {
        self.get(name).and_then(|e| e.symbol(kind))
    }

    pub fn entries(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.entries.values()
    }
}

fn full_entry(name: &str, arity: usize) -> CapabilityEntry {
    Capability::ALL
        .iter()
        .fold(CapabilityEntry::new(name, arity, Origin::Combinator), |e, &cap| {
            e.with_capability(cap, None)
        })
}
