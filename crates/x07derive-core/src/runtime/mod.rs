//! Reference runtime: executes generated functions over dynamic [`Value`]s.
//!
//! Generated text is meant for a host language; this interpreter runs the same
//! IR in-process so the ordering, hashing and round-trip laws can be checked
//! against what was actually generated. Standard-library entry points are
//! provided natively (see `stdlib`); externally declared symbols are not, and
//! calling one is an [`EvalError::UnknownFunction`].

mod eval;
mod mix;
mod stdlib;
mod tree;
mod value;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::capability::{CapabilityTable, FnKind};
use crate::combinators::Scope;
use crate::ir::Func;
use crate::shape::TypeShape;

pub use eval::EvalError;
pub use mix::{finalize, mix, HashState, MIX_MULTIPLIER};
pub use tree::{Tree, TreeParseError, MAX_DEPTH};
pub use value::Value;

use eval::{Interp, Val};

#[derive(Debug, Clone)]
pub struct Runtime {
    table: CapabilityTable,
    funcs: BTreeMap<String, Func>,
}

impl Runtime {
    /// `table` resolves the named shapes passed to the entry points; `funcs`
    /// are the generated functions available by symbol.
    pub fn new(table: CapabilityTable, funcs: impl IntoIterator<Item = Func>) -> Self {
        Runtime {
            table,
            funcs: funcs.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    pub fn stdlib() -> Self {
        Runtime::new(CapabilityTable::stdlib(), [])
    }

    pub fn func(&self, symbol: &str) -> Option<&Func> {
        self.funcs.get(symbol)
    }

    fn run(
        &self,
        kind: FnKind,
        ty: &TypeShape,
        args: Vec<Val<'static>>,
    ) -> Result<Val<'static>, EvalError> {
        let scope = Scope::closed(&self.table, "<runtime>");
        let f = scope.fn_value(kind, ty).map_err(EvalError::Derive)?;
        let interp = Interp::new(&self.funcs);
        let fv = interp.eval(&f, &BTreeMap::new())?;
        let out = interp.apply(&fv, args)?;
        detach(out)
    }

    pub fn compare(&self, ty: &TypeShape, a: &Value, b: &Value) -> Result<Ordering, EvalError> {
        self.run(
            FnKind::Compare,
            ty,
            vec![Val::Data(a.clone()), Val::Data(b.clone())],
        )?
        .as_ordering()
    }

    pub fn hash(&self, ty: &TypeShape, v: &Value) -> Result<u64, EvalError> {
        self.run(FnKind::Hash, ty, vec![Val::Data(v.clone())])?.as_hash()
    }

    pub fn to_tree(&self, ty: &TypeShape, v: &Value) -> Result<Tree, EvalError> {
        self.run(FnKind::SexpOf, ty, vec![Val::Data(v.clone())])?
            .into_tree()
    }

    pub fn of_tree(&self, ty: &TypeShape, t: &Tree) -> Result<Value, EvalError> {
        self.run(FnKind::OfSexp, ty, vec![Val::Tree(t.clone())])?
            .into_data()
    }

    /// Canonical text of `v`.
    pub fn render(&self, ty: &TypeShape, v: &Value) -> Result<String, EvalError> {
        Ok(self.to_tree(ty, v)?.render())
    }

    pub fn parse(&self, ty: &TypeShape, text: &str) -> Result<Value, EvalError> {
        self.of_tree(ty, &Tree::parse(text)?)
    }
}

/// Results never carry functions, so they can outlive the instantiated IR.
fn detach(v: Val<'_>) -> Result<Val<'static>, EvalError> {
    match v {
        Val::Data(d) => Ok(Val::Data(d)),
        Val::Tree(t) => Ok(Val::Tree(t)),
        Val::Trees(ts) => Ok(Val::Trees(ts)),
        Val::Int(i) => Ok(Val::Int(i)),
        Val::Hash(h) => Ok(Val::Hash(h)),
        other @ Val::Func(_) => Err(eval::mismatch("data", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_containers_compose() {
        let rt = Runtime::stdlib();
        let ty = TypeShape::applied("list", [TypeShape::applied("option", [TypeShape::prim("int")])]);
        let a = Value::list([Value::some(Value::Int(1)), Value::none()]);
        let b = Value::list([Value::some(Value::Int(1)), Value::some(Value::Int(0))]);
        assert_eq!(rt.compare(&ty, &a, &b).expect("cmp"), Ordering::Less);
        assert_eq!(rt.compare(&ty, &b, &b).expect("cmp"), Ordering::Equal);
        assert_eq!(rt.render(&ty, &a).expect("render"), "((1) ())");
        assert_eq!(rt.parse(&ty, "((1) ())").expect("parse"), a);
        let a2 = Value::list([Value::some(Value::Int(1)), Value::none()]);
        assert_eq!(rt.hash(&ty, &a).expect("hash"), rt.hash(&ty, &a2).expect("hash"));
    }

    #[test]
    fn shorter_lists_sort_first() {
        let rt = Runtime::stdlib();
        let ty = TypeShape::applied("list", [TypeShape::prim("string")]);
        let a = Value::list([Value::string("a")]);
        let b = Value::list([Value::string("a"), Value::string("")]);
        assert_eq!(rt.compare(&ty, &a, &b).expect("cmp"), Ordering::Less);
    }

    #[test]
    fn unknown_types_fail_to_instantiate() {
        let rt = Runtime::stdlib();
        let err = rt
            .compare(&TypeShape::applied("map", []), &Value::Unit, &Value::Unit)
            .unwrap_err();
        assert!(matches!(err, EvalError::Derive(_)), "{err}");
    }

    #[test]
    fn deeply_nested_text_is_a_parse_error() {
        let rt = Runtime::stdlib();
        let ty = TypeShape::applied("list", [TypeShape::prim("unit")]);
        let err = rt.parse(&ty, &"(".repeat(200_000)).unwrap_err();
        assert!(matches!(err, EvalError::Parse(ref e) if e.offset == MAX_DEPTH), "{err}");
    }
}
