//! Derivation engine: walks each group of a request, in dependency order, and
//! assembles one binding set per (group, capability).

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::{Capability, CapabilityTable};
use crate::combinators::{derive_func, Scope};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::emit::emit_binding_set;
use crate::group::{resolve_groups, DerivationGroup};
use crate::ir::{Callee, Func};
use crate::runtime::Runtime;
use crate::shape::DeriveRequest;

/// Output for one (type definition, capability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedUnit {
    pub type_name: String,
    pub capability: Capability,
    pub funcs: Vec<Func>,
    /// Everything the functions call into, classified.
    pub refs: BTreeSet<Callee>,
    pub text: String,
}

/// The rendered functions of one group for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSet {
    pub capability: Capability,
    pub members: Vec<String>,
    pub recursive: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Derivation {
    groups: Vec<DerivationGroup>,
    units: Vec<GeneratedUnit>,
    binding_sets: Vec<BindingSet>,
    diagnostics: Vec<Diagnostic>,
    table: CapabilityTable,
}

impl Derivation {
    pub fn groups(&self) -> &[DerivationGroup] {
        &self.groups
    }

    pub fn units(&self) -> &[GeneratedUnit] {
        &self.units
    }

    pub fn unit(&self, type_name: &str, cap: Capability) -> Option<&GeneratedUnit> {
        self.units
            .iter()
            .find(|u| u.type_name == type_name && u.capability == cap)
    }

    pub fn binding_sets(&self) -> &[BindingSet] {
        &self.binding_sets
    }

    /// The binding set holding `type_name`'s functions for `cap`, if it derived.
    pub fn binding_set_for(&self, type_name: &str, cap: Capability) -> Option<&BindingSet> {
        self.binding_sets
            .iter()
            .find(|b| b.capability == cap && b.members.iter().any(|m| m == type_name))
    }

    pub fn group_of(&self, type_name: &str) -> Option<&DerivationGroup> {
        self.groups.iter().find(|g| g.contains(type_name))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The input table extended with every binding set that derived.
    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    pub fn runtime(&self) -> Runtime {
        Runtime::new(
            self.table.clone(),
            self.units.iter().flat_map(|u| u.funcs.iter().cloned()),
        )
    }
}

/// Derives `caps` for every definition of `req`.
///
/// Failures never stop the run: each failing (group, capability) contributes
/// its diagnostics and is left out of the table, so dependents report
/// `UnresolvedCapability` in turn.
pub fn derive_request(req: &DeriveRequest, table: &CapabilityTable, caps: &[Capability]) -> Derivation {
    let groups = resolve_groups(req);
    let mut table = table.clone();
    let mut units = Vec::new();
    let mut binding_sets = Vec::new();
    let mut diagnostics = shadowed_names(req, &table);

    if !diagnostics.is_empty() {
        warn!(shadowed = diagnostics.len(), "request shadows capability table entries");
        return Derivation {
            groups,
            units,
            binding_sets,
            diagnostics,
            table,
        };
    }

    for group in &groups {
        for &cap in caps {
            match derive_group(req, &table, group, cap) {
                Ok(group_units) => {
                    debug!(
                        members = ?group.members,
                        capability = %cap,
                        recursive = group.recursive,
                        "derived binding set"
                    );
                    for name in &group.members {
                        if let Some(def) = req.get(name) {
                            table.record_derived(name, def.arity(), cap);
                        }
                    }
                    let funcs: Vec<&Func> = group_units.iter().flat_map(|u| &u.funcs).collect();
                    binding_sets.push(BindingSet {
                        capability: cap,
                        members: group.members.clone(),
                        recursive: group.recursive,
                        text: emit_binding_set(&funcs, group.recursive),
                    });
                    units.extend(group_units);
                }
                Err(errs) => {
                    warn!(
                        members = ?group.members,
                        capability = %cap,
                        errors = errs.len(),
                        "binding set failed"
                    );
                    diagnostics.extend(errs);
                }
            }
        }
    }

    info!(
        groups = groups.len(),
        binding_sets = binding_sets.len(),
        diagnostics = diagnostics.len(),
        "derivation finished"
    );
    Derivation {
        groups,
        units,
        binding_sets,
        diagnostics,
        table,
    }
}

/// Request types named like a table entry would emit that entry's symbols.
fn shadowed_names(req: &DeriveRequest, table: &CapabilityTable) -> Vec<Diagnostic> {
    req.defs()
        .iter()
        .filter_map(|def| {
            let entry = table.get(def.name())?;
            Some(Diagnostic::for_type(
                DiagnosticCode::X7D0108ShadowsTableEntry,
                def.name(),
                format!("`{}` is already a {:?} entry of the capability table", entry.name, entry.origin),
            ))
        })
        .collect()
}

fn derive_group(
    req: &DeriveRequest,
    table: &CapabilityTable,
    group: &DerivationGroup,
    cap: Capability,
) -> Result<Vec<GeneratedUnit>, Vec<Diagnostic>> {
    let mut units = Vec::with_capacity(group.members.len());
    let mut failures: Vec<(String, Diagnostic)> = Vec::new();

    for name in &group.members {
        let Some(def) = req.get(name) else {
            failures.push((
                name.clone(),
                Diagnostic::for_type(
                    DiagnosticCode::X7D0901InternalBug,
                    name,
                    "group member missing from request",
                ),
            ));
            continue;
        };
        let scope = Scope::for_def(table, req, &group.members, def);
        let mut funcs = Vec::with_capacity(cap.fn_kinds().len());
        let mut failed = None;
        for &kind in cap.fn_kinds() {
            match derive_func(&scope, kind, def) {
                Ok(f) => funcs.push(f),
                Err(d) => {
                    failed = Some(d);
                    break;
                }
            }
        }
        if let Some(d) = failed {
            failures.push((name.clone(), d));
            continue;
        }

        let refs = funcs.iter().flat_map(Func::callees).collect();
        let text = {
            let fs: Vec<&Func> = funcs.iter().collect();
            emit_binding_set(&fs, false)
        };
        units.push(GeneratedUnit {
            type_name: name.clone(),
            capability: cap,
            funcs,
            refs,
            text,
        });
    }

    if failures.is_empty() {
        return Ok(units);
    }

    let mut out = Vec::with_capacity(group.members.len());
    for name in &group.members {
        match failures.iter().position(|(n, _)| n == name) {
            Some(idx) => out.push(failures[idx].1.clone()),
            None => {
                let culprits: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
                out.push(Diagnostic::for_type(
                    DiagnosticCode::X7D0300UnresolvedCapability,
                    name,
                    format!(
                        "{cap} binding set of group {{{}}} failed because of `{}`",
                        group.members.join(", "),
                        culprits.join("`, `")
                    ),
                ));
            }
        }
    }
    Err(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{TypeDef, TypeShape};

    fn req(defs: Vec<TypeDef>) -> DeriveRequest {
        DeriveRequest::new(defs).expect("valid request")
    }

    #[test]
    fn units_classify_their_references() {
        let r = req(vec![
            TypeDef::new("point", Vec::<String>::new(), TypeShape::tuple([TypeShape::prim("int"), TypeShape::prim("int")]))
                .expect("point"),
            TypeDef::new(
                "shape",
                Vec::<String>::new(),
                TypeShape::variant([
                    ("Dot", vec![TypeShape::applied("point", [])]),
                    ("Poly", vec![TypeShape::applied("list", [TypeShape::recursive("shape")])]),
                ]),
            )
            .expect("shape"),
        ]);
        let d = derive_request(&r, &CapabilityTable::stdlib(), &[Capability::Compare]);
        assert!(d.is_ok(), "{:?}", d.diagnostics());
        let unit = d.unit("shape", Capability::Compare).expect("unit");
        assert!(unit.refs.contains(&Callee::Derived("compare_point".to_string())));
        assert!(unit.refs.contains(&Callee::Group("compare_shape".to_string())));
        assert!(unit.refs.contains(&Callee::Combinator("compare_list".to_string())));
        assert!(d.binding_set_for("shape", Capability::Compare).expect("set").recursive);
        assert!(d.binding_set_for("shape", Capability::Compare).expect("set").text.starts_with("(defrec"));
        assert!(!d.binding_set_for("point", Capability::Compare).expect("set").recursive);
    }

    #[test]
    fn a_failing_member_fails_its_group_and_dependents() {
        let r = req(vec![
            TypeDef::new(
                "a",
                Vec::<String>::new(),
                TypeShape::tuple([
                    TypeShape::function([TypeShape::prim("int")], TypeShape::prim("int")),
                    TypeShape::recursive("b"),
                ]),
            )
            .expect("a"),
            TypeDef::new("b", Vec::<String>::new(), TypeShape::applied("option", [TypeShape::recursive("a")]))
                .expect("b"),
            TypeDef::new("c", Vec::<String>::new(), TypeShape::applied("b", [])).expect("c"),
            TypeDef::new("d", Vec::<String>::new(), TypeShape::prim("int")).expect("d"),
        ]);
        let d = derive_request(&r, &CapabilityTable::stdlib(), &[Capability::Hash]);
        let codes: Vec<(Option<&str>, DiagnosticCode)> = d
            .diagnostics()
            .iter()
            .map(|x| (x.type_name.as_deref(), x.code))
            .collect();
        assert_eq!(
            codes,
            vec![
                (Some("a"), DiagnosticCode::X7D0200UnsupportedShape),
                (Some("b"), DiagnosticCode::X7D0300UnresolvedCapability),
                (Some("c"), DiagnosticCode::X7D0300UnresolvedCapability),
            ]
        );
        assert!(d.binding_set_for("a", Capability::Hash).is_none());
        assert!(d.binding_set_for("d", Capability::Hash).is_some());
        assert!(d.table().lookup("b", crate::capability::FnKind::Hash).is_none());
    }

    #[test]
    fn sexp_sets_hold_both_directions() {
        let r = req(vec![TypeDef::new(
            "pair",
            ["x"],
            TypeShape::tuple([TypeShape::var("x"), TypeShape::var("x")]),
        )
        .expect("pair")]);
        let d = derive_request(&r, &CapabilityTable::stdlib(), &[Capability::Sexp]);
        let set = d.binding_set_for("pair", Capability::Sexp).expect("set");
        assert!(set.text.contains("(defn sexp_of_pair (sexp-of-x v)"), "{}", set.text);
        assert!(set.text.contains("(defn pair_of_sexp (x-of-sexp t)"), "{}", set.text);
    }
}
