use crate::capability::FnKind;
use crate::diagnostics::Diagnostic;
use crate::ir::{CaseArm, Expr};
use crate::shape::TypeShape;

use super::Scope;

/// Total order over `shape`: components in declaration order, first non-zero
/// result wins; variants by constructor index before payload.
pub(super) fn body(scope: &Scope<'_>, shape: &TypeShape, a: &Expr, b: &Expr) -> Result<Expr, Diagnostic> {
    match shape {
        TypeShape::Primitive { .. }
        | TypeShape::TypeVar { .. }
        | TypeShape::Applied { .. }
        | TypeShape::Recursive { .. } => {
            scope.apply_named(FnKind::Compare, shape, &[a.clone(), b.clone()])
        }
        TypeShape::Tuple { items } => {
            let mut parts = Vec::with_capacity(items.len());
            for (index, ty) in items.iter().enumerate() {
                let x = Expr::Item { of: a.clone().boxed(), index };
                let y = Expr::Item { of: b.clone().boxed(), index };
                parts.push(body(scope, ty, &x, &y)?);
            }
            Ok(lex(parts))
        }
        TypeShape::Record { fields } => {
            let mut parts = Vec::with_capacity(fields.len());
            for (index, f) in fields.iter().enumerate() {
                let x = Expr::Field {
                    of: a.clone().boxed(),
                    index,
                    name: f.name.clone(),
                };
                let y = Expr::Field {
                    of: b.clone().boxed(),
                    index,
                    name: f.name.clone(),
                };
                parts.push(body(scope, &f.ty, &x, &y)?);
            }
            Ok(lex(parts))
        }
        TypeShape::Variant { ctors } => {
            if ctors.is_empty() {
                return Ok(Expr::Int(0));
            }
            let tags = Expr::CompareTags(a.clone().boxed(), b.clone().boxed());
            if ctors.iter().all(|c| c.args.is_empty()) {
                return Ok(tags);
            }
            let mut arms = Vec::with_capacity(ctors.len());
            for (ctor, c) in ctors.iter().enumerate() {
                let mut parts = Vec::with_capacity(c.args.len());
                for (index, ty) in c.args.iter().enumerate() {
                    let x = Expr::Arg { of: a.clone().boxed(), ctor, index };
                    let y = Expr::Arg { of: b.clone().boxed(), ctor, index };
                    parts.push(body(scope, ty, &x, &y)?);
                }
                arms.push(CaseArm {
                    ctor,
                    name: c.name.clone(),
                    body: lex(parts),
                });
            }
            Ok(Expr::Lex(vec![
                tags,
                Expr::Case {
                    scrutinee: a.clone().boxed(),
                    arms,
                },
            ]))
        }
        TypeShape::Function { .. } => Err(scope.unsupported(FnKind::Compare, "function types")),
    }
}

fn lex(mut parts: Vec<Expr>) -> Expr {
    match parts.len() {
        0 => Expr::Int(0),
        1 => parts.remove(0),
        _ => Expr::Lex(parts),
    }
}
