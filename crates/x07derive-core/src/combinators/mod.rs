//! Combinator library: one generator per capability, each a closed `match`
//! over [`TypeShape`]. Shapes without a rule fail with `UnsupportedShape` at
//! generation time; there is no fallback rule.

mod compare;
mod hash;
mod sexp;

use std::cell::Cell;

use crate::capability::{CapabilityTable, FnKind, Origin};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::ir::{Callee, Expr, Func};
use crate::shape::{DeriveRequest, TypeDef, TypeShape};

/// Everything a generator may consult while deriving one definition.
pub(crate) struct Scope<'a> {
    table: &'a CapabilityTable,
    request: Option<&'a DeriveRequest>,
    group: &'a [String],
    type_name: &'a str,
    params: &'a [String],
    fresh: Cell<usize>,
}

impl<'a> Scope<'a> {
    pub(crate) fn for_def(
        table: &'a CapabilityTable,
        request: &'a DeriveRequest,
        group: &'a [String],
        def: &'a TypeDef,
    ) -> Self {
        Scope {
            table,
            request: Some(request),
            group,
            type_name: def.name(),
            params: def.params(),
            fresh: Cell::new(0),
        }
    }

    /// Scope for closed shapes outside any definition (instantiating a derived
    /// capability at concrete type arguments).
    pub(crate) fn closed(table: &'a CapabilityTable, label: &'a str) -> Self {
        Scope {
            table,
            request: None,
            group: &[],
            type_name: label,
            params: &[],
            fresh: Cell::new(0),
        }
    }

    fn fresh(&self, prefix: &str) -> String {
        let n = self.fresh.get();
        self.fresh.set(n + 1);
        format!("{prefix}{n}")
    }

    fn unsupported(&self, kind: FnKind, what: impl std::fmt::Display) -> Diagnostic {
        Diagnostic::for_type(
            DiagnosticCode::X7D0200UnsupportedShape,
            self.type_name,
            format!("no {} rule for {what}", kind.capability()),
        )
    }

    fn unresolved(&self, kind: FnKind, what: impl std::fmt::Display) -> Diagnostic {
        Diagnostic::for_type(
            DiagnosticCode::X7D0300UnresolvedCapability,
            self.type_name,
            format!("{} is not available for {what}", kind.capability()),
        )
    }

    fn resolve_primitive(&self, kind: FnKind, name: &str) -> Result<Callee, Diagnostic> {
        let Some(entry) = self.table.get(name).filter(|e| e.arity == 0) else {
            return Err(self.unsupported(kind, format_args!("primitive `{name}`")));
        };
        let Some(sym) = entry.symbol(kind) else {
            return Err(self.unsupported(kind, format_args!("primitive `{name}`")));
        };
        Ok(match entry.origin {
            Origin::Combinator => Callee::Combinator(sym.to_string()),
            Origin::External | Origin::Derived => Callee::Derived(sym.to_string()),
        })
    }

    fn resolve_named(&self, kind: FnKind, name: &str, arity: usize) -> Result<Callee, Diagnostic> {
        if self.group.iter().any(|m| m == name) {
            return Ok(Callee::Group(kind.symbol(name)));
        }
        let in_request = self.request.is_some_and(|r| r.get(name).is_some());
        let entry = self
            .table
            .get(name)
            .filter(|e| !in_request || e.origin == Origin::Derived);
        let Some(entry) = entry else {
            return Err(if in_request {
                self.unresolved(kind, format_args!("`{name}`, whose derivation failed"))
            } else {
                self.unresolved(kind, format_args!("unknown type constructor `{name}`"))
            });
        };
        if entry.arity != arity {
            return Err(self.unresolved(
                kind,
                format_args!("`{name}` applied to {arity} argument(s); it takes {}", entry.arity),
            ));
        }
        let Some(sym) = entry.symbol(kind) else {
            return Err(self.unresolved(kind, format_args!("`{name}`")));
        };
        Ok(match entry.origin {
            Origin::Combinator => Callee::Combinator(sym.to_string()),
            Origin::External | Origin::Derived => Callee::Derived(sym.to_string()),
        })
    }

    /// The function value implementing `kind` at `shape`.
    pub(crate) fn fn_value(&self, kind: FnKind, shape: &TypeShape) -> Result<Expr, Diagnostic> {
        match shape {
            TypeShape::TypeVar { name } => Ok(Expr::FnRef(Callee::Local(kind.param_symbol(name)))),
            TypeShape::Primitive { name } => Ok(Expr::FnRef(self.resolve_primitive(kind, name)?)),
            TypeShape::Applied { name, args } if args.is_empty() => {
                Ok(Expr::FnRef(self.resolve_named(kind, name, 0)?))
            }
            TypeShape::Recursive { name } if self.params.is_empty() => {
                Ok(Expr::FnRef(self.resolve_named(kind, name, 0)?))
            }
            _ => {
                let params: Vec<String> = match kind {
                    FnKind::Compare => {
                        let n = self.fresh.get();
                        self.fresh.set(n + 1);
                        vec![format!("x{n}"), format!("y{n}")]
                    }
                    FnKind::Hash | FnKind::SexpOf => vec![self.fresh("x")],
                    FnKind::OfSexp => vec![self.fresh("t")],
                };
                let vals: Vec<Expr> = params.iter().map(|p| Expr::var(p)).collect();
                let body = self.body(kind, shape, &vals)?;
                Ok(Expr::Lambda {
                    params,
                    body: body.boxed(),
                })
            }
        }
    }

    /// Body of `kind` at `shape`, applied to the value expressions `vals`.
    pub(crate) fn body(&self, kind: FnKind, shape: &TypeShape, vals: &[Expr]) -> Result<Expr, Diagnostic> {
        match kind {
            FnKind::Compare => compare::body(self, shape, &vals[0], &vals[1]),
            FnKind::Hash => hash::body(self, shape, &vals[0]),
            FnKind::SexpOf => sexp::sexp_of_body(self, shape, &vals[0]),
            FnKind::OfSexp => sexp::of_sexp_body(self, shape, &vals[0]),
        }
    }

    /// Shared rule for the named shapes: call the resolved function with one
    /// capability function per type argument, then the values.
    fn apply_named(&self, kind: FnKind, shape: &TypeShape, vals: &[Expr]) -> Result<Expr, Diagnostic> {
        let (callee, mut args) = match shape {
            TypeShape::Primitive { name } => (self.resolve_primitive(kind, name)?, Vec::new()),
            TypeShape::TypeVar { name } => (Callee::Local(kind.param_symbol(name)), Vec::new()),
            TypeShape::Applied { name, args } => {
                let callee = self.resolve_named(kind, name, args.len())?;
                let mut fns = Vec::with_capacity(args.len());
                for arg in args {
                    fns.push(self.fn_value(kind, arg)?);
                }
                (callee, fns)
            }
            TypeShape::Recursive { name } => {
                let callee = self.resolve_named(kind, name, self.params.len())?;
                let fns = self
                    .params
                    .iter()
                    .map(|p| Expr::FnRef(Callee::Local(kind.param_symbol(p))))
                    .collect();
                (callee, fns)
            }
            other => {
                return Err(Diagnostic::for_type(
                    DiagnosticCode::X7D0901InternalBug,
                    self.type_name,
                    format!("apply_named on {} shape", other.kind_str()),
                ))
            }
        };
        args.extend(vals.iter().cloned());
        Ok(Expr::call(callee, args))
    }
}

/// Generates the function for `kind` of `def`.
pub(crate) fn derive_func(scope: &Scope<'_>, kind: FnKind, def: &TypeDef) -> Result<Func, Diagnostic> {
    let mut params: Vec<String> = def.params().iter().map(|p| kind.param_symbol(p)).collect();
    let vals: Vec<Expr> = kind.value_params().iter().map(|p| Expr::var(p)).collect();
    params.extend(kind.value_params().iter().map(|p| p.to_string()));
    let body = scope.body(kind, def.body(), &vals)?;
    Ok(Func {
        name: kind.symbol(def.name()),
        kind,
        type_name: def.name().to_string(),
        params,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, CapabilityEntry};

    fn one_def(body: TypeShape) -> (DeriveRequest, Vec<String>) {
        let def = TypeDef::new("t", ["a"], body).expect("valid");
        let req = DeriveRequest::new(vec![def]).expect("valid request");
        (req, vec!["t".to_string()])
    }

    /// Every shape constructor yields either a rule or an explicit
    /// `UnsupportedShape`, for every function kind.
    #[test]
    fn every_shape_constructor_is_handled_for_every_kind() {
        let samples = [
            TypeShape::prim("int"),
            TypeShape::tuple([TypeShape::prim("int"), TypeShape::var("a")]),
            TypeShape::record([("x", TypeShape::prim("string"))]),
            TypeShape::variant([("A", vec![]), ("B", vec![TypeShape::var("a")])]),
            TypeShape::applied("list", [TypeShape::var("a")]),
            TypeShape::var("a"),
            TypeShape::recursive("t"),
            TypeShape::function([TypeShape::prim("int")], TypeShape::prim("int")),
        ];
        let table = CapabilityTable::stdlib();
        for shape in samples {
            let is_fn = matches!(shape, TypeShape::Function { .. });
            let (req, group) = one_def(shape);
            let def = &req.defs()[0];
            let scope = Scope::for_def(&table, &req, &group, def);
            for kind in [FnKind::Compare, FnKind::Hash, FnKind::SexpOf, FnKind::OfSexp] {
                match derive_func(&scope, kind, def) {
                    Ok(f) => {
                        assert!(!is_fn, "function type derived {kind:?}");
                        assert_eq!(f.params.first().map(String::as_str), Some(kind.param_symbol("a").as_str()));
                    }
                    Err(d) => {
                        assert!(is_fn, "unexpected failure: {d}");
                        assert_eq!(d.code, DiagnosticCode::X7D0200UnsupportedShape);
                    }
                }
            }
        }
    }

    #[test]
    fn unknown_primitive_is_unsupported_but_unknown_constructor_is_unresolved() {
        let table = CapabilityTable::stdlib();
        let (req, group) = one_def(TypeShape::prim("nativeint"));
        let def = &req.defs()[0];
        let scope = Scope::for_def(&table, &req, &group, def);
        let err = derive_func(&scope, FnKind::Compare, def).expect_err("no rule");
        assert_eq!(err.code, DiagnosticCode::X7D0200UnsupportedShape);

        let (req, group) = one_def(TypeShape::applied("map", [TypeShape::var("a")]));
        let def = &req.defs()[0];
        let scope = Scope::for_def(&table, &req, &group, def);
        let err = derive_func(&scope, FnKind::Hash, def).expect_err("unknown ctor");
        assert_eq!(err.code, DiagnosticCode::X7D0300UnresolvedCapability);
    }

    #[test]
    fn sequence_of_incomparable_type_is_unresolved() {
        let mut table = CapabilityTable::stdlib();
        table.register(
            CapabilityEntry::new("handle", 0, Origin::External).with_capability(Capability::Sexp, None),
        );
        let (req, group) = one_def(TypeShape::applied("list", [TypeShape::applied("handle", [])]));
        let def = &req.defs()[0];
        let scope = Scope::for_def(&table, &req, &group, def);
        let err = derive_func(&scope, FnKind::Compare, def).expect_err("no compare for handle");
        assert_eq!(err.code, DiagnosticCode::X7D0300UnresolvedCapability);
        assert!(err.message.contains("`handle`"), "{}", err.message);
        assert!(derive_func(&scope, FnKind::SexpOf, def).is_ok());
    }

    #[test]
    fn composed_applications_pass_capability_functions() {
        let table = CapabilityTable::stdlib();
        let (req, group) = one_def(TypeShape::applied(
            "list",
            [TypeShape::applied("option", [TypeShape::prim("int")])],
        ));
        let def = &req.defs()[0];
        let scope = Scope::for_def(&table, &req, &group, def);
        let f = derive_func(&scope, FnKind::Compare, def).expect("derives");
        let Expr::Call { callee, args } = &f.body else {
            panic!("expected call, got {:?}", f.body);
        };
        assert_eq!(callee, &Callee::Combinator("compare_list".to_string()));
        assert_eq!(args.len(), 3);
        assert!(matches!(args[0], Expr::Lambda { .. }));
    }
}
