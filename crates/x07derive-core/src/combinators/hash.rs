use crate::capability::FnKind;
use crate::diagnostics::Diagnostic;
use crate::ir::{CaseArm, Expr};
use crate::shape::TypeShape;

use super::Scope;

/// Structural hash following the comparison traversal, so values that compare
/// equal hash equal. Variants are seeded with their constructor index.
pub(super) fn body(scope: &Scope<'_>, shape: &TypeShape, v: &Expr) -> Result<Expr, Diagnostic> {
    match shape {
        TypeShape::Primitive { .. }
        | TypeShape::TypeVar { .. }
        | TypeShape::Applied { .. }
        | TypeShape::Recursive { .. } => scope.apply_named(FnKind::Hash, shape, &[v.clone()]),
        TypeShape::Tuple { items } => {
            let mut parts = Vec::with_capacity(items.len());
            for (index, ty) in items.iter().enumerate() {
                let x = Expr::Item { of: v.clone().boxed(), index };
                parts.push(body(scope, ty, &x)?);
            }
            Ok(Expr::Mix { seed: 0, parts })
        }
        TypeShape::Record { fields } => {
            let mut parts = Vec::with_capacity(fields.len());
            for (index, f) in fields.iter().enumerate() {
                let x = Expr::Field {
                    of: v.clone().boxed(),
                    index,
                    name: f.name.clone(),
                };
                parts.push(body(scope, &f.ty, &x)?);
            }
            Ok(Expr::Mix { seed: 0, parts })
        }
        TypeShape::Variant { ctors } => {
            if ctors.is_empty() {
                return Ok(Expr::Mix { seed: 0, parts: Vec::new() });
            }
            let mut arms = Vec::with_capacity(ctors.len());
            for (ctor, c) in ctors.iter().enumerate() {
                let mut parts = Vec::with_capacity(c.args.len());
                for (index, ty) in c.args.iter().enumerate() {
                    let x = Expr::Arg { of: v.clone().boxed(), ctor, index };
                    parts.push(body(scope, ty, &x)?);
                }
                arms.push(CaseArm {
                    ctor,
                    name: c.name.clone(),
                    body: Expr::Mix {
                        seed: ctor as i64,
                        parts,
                    },
                });
            }
            Ok(Expr::Case {
                scrutinee: v.clone().boxed(),
                arms,
            })
        }
        TypeShape::Function { .. } => Err(scope.unsupported(FnKind::Hash, "function types")),
    }
}
