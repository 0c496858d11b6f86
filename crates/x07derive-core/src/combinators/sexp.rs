use crate::capability::FnKind;
use crate::diagnostics::Diagnostic;
use crate::ir::{CaseArm, CtorArm, Expr};
use crate::shape::TypeShape;

use super::Scope;

/// Value to tree: tuples and records list their children in declaration order,
/// record children are `(field value)` pairs, variants are `(Ctor args...)`.
pub(super) fn sexp_of_body(scope: &Scope<'_>, shape: &TypeShape, v: &Expr) -> Result<Expr, Diagnostic> {
    match shape {
        TypeShape::Primitive { .. }
        | TypeShape::TypeVar { .. }
        | TypeShape::Applied { .. }
        | TypeShape::Recursive { .. } => scope.apply_named(FnKind::SexpOf, shape, &[v.clone()]),
        TypeShape::Tuple { items } => {
            let mut children = Vec::with_capacity(items.len());
            for (index, ty) in items.iter().enumerate() {
                let x = Expr::Item { of: v.clone().boxed(), index };
                children.push(sexp_of_body(scope, ty, &x)?);
            }
            Ok(Expr::Node(children))
        }
        TypeShape::Record { fields } => {
            let mut children = Vec::with_capacity(fields.len());
            for (index, f) in fields.iter().enumerate() {
                let x = Expr::Field {
                    of: v.clone().boxed(),
                    index,
                    name: f.name.clone(),
                };
                children.push(Expr::Node(vec![
                    Expr::Atom(f.name.clone()),
                    sexp_of_body(scope, &f.ty, &x)?,
                ]));
            }
            Ok(Expr::Node(children))
        }
        TypeShape::Variant { ctors } => {
            let mut arms = Vec::with_capacity(ctors.len());
            for (ctor, c) in ctors.iter().enumerate() {
                let mut children = Vec::with_capacity(c.args.len() + 1);
                children.push(Expr::Atom(c.name.clone()));
                for (index, ty) in c.args.iter().enumerate() {
                    let x = Expr::Arg { of: v.clone().boxed(), ctor, index };
                    children.push(sexp_of_body(scope, ty, &x)?);
                }
                arms.push(CaseArm {
                    ctor,
                    name: c.name.clone(),
                    body: Expr::Node(children),
                });
            }
            Ok(Expr::Case {
                scrutinee: v.clone().boxed(),
                arms,
            })
        }
        TypeShape::Function { .. } => Err(scope.unsupported(FnKind::SexpOf, "function types")),
    }
}

/// Tree to value, the inverse of [`sexp_of_body`]. Record fields must appear in
/// declaration order under their declared names.
pub(super) fn of_sexp_body(scope: &Scope<'_>, shape: &TypeShape, t: &Expr) -> Result<Expr, Diagnostic> {
    match shape {
        TypeShape::Primitive { .. }
        | TypeShape::TypeVar { .. }
        | TypeShape::Applied { .. }
        | TypeShape::Recursive { .. } => scope.apply_named(FnKind::OfSexp, shape, &[t.clone()]),
        TypeShape::Tuple { items } => {
            let xs = scope.fresh("xs");
            let mut values = Vec::with_capacity(items.len());
            for (index, ty) in items.iter().enumerate() {
                let child = Expr::Child {
                    of: Expr::var(&xs).boxed(),
                    index,
                };
                values.push(of_sexp_body(scope, ty, &child)?);
            }
            Ok(Expr::Let {
                value: Expr::ExpectList {
                    tree: t.clone().boxed(),
                    len: items.len(),
                    what: scope.type_name.to_string(),
                }
                .boxed(),
                name: xs,
                body: Expr::MkTuple(values).boxed(),
            })
        }
        TypeShape::Record { fields } => {
            let xs = scope.fresh("xs");
            let mut values = Vec::with_capacity(fields.len());
            for (index, f) in fields.iter().enumerate() {
                let child = Expr::ExpectField {
                    tree: Expr::Child {
                        of: Expr::var(&xs).boxed(),
                        index,
                    }
                    .boxed(),
                    name: f.name.clone(),
                };
                values.push((f.name.clone(), of_sexp_body(scope, &f.ty, &child)?));
            }
            Ok(Expr::Let {
                value: Expr::ExpectList {
                    tree: t.clone().boxed(),
                    len: fields.len(),
                    what: scope.type_name.to_string(),
                }
                .boxed(),
                name: xs,
                body: Expr::MkRecord(values).boxed(),
            })
        }
        TypeShape::Variant { ctors } => {
            let binder = scope.fresh("args");
            let mut arms = Vec::with_capacity(ctors.len());
            for (ctor, c) in ctors.iter().enumerate() {
                let mut args = Vec::with_capacity(c.args.len());
                for (index, ty) in c.args.iter().enumerate() {
                    let child = Expr::Child {
                        of: Expr::var(&binder).boxed(),
                        index,
                    };
                    args.push(of_sexp_body(scope, ty, &child)?);
                }
                arms.push(CtorArm {
                    ctor,
                    name: c.name.clone(),
                    arity: c.args.len(),
                    body: Expr::MkVariant {
                        ctor,
                        name: c.name.clone(),
                        args,
                    },
                });
            }
            Ok(Expr::MatchCtor {
                tree: t.clone().boxed(),
                what: scope.type_name.to_string(),
                binder,
                arms,
            })
        }
        TypeShape::Function { .. } => Err(scope.unsupported(FnKind::OfSexp, "function types")),
    }
}
