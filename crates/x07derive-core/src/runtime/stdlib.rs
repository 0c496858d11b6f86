//! In-process implementations of the standard-library entry points that
//! generated code calls: every capability for the primitives and for the
//! `list`, `array` and `option` containers.

use std::cmp::Ordering;

use crate::capability::{FnKind, STDLIB_CONTAINERS, STDLIB_PRIMITIVES};

use super::eval::{decode_error, mismatch, ordering, EvalError, Interp, Val};
use super::mix::{finalize, mix};
use super::tree::Tree;
use super::value::Value;

fn split_symbol(sym: &str) -> Option<(FnKind, &str)> {
    if let Some(t) = sym.strip_prefix("compare_") {
        Some((FnKind::Compare, t))
    } else if let Some(t) = sym.strip_prefix("hash_") {
        Some((FnKind::Hash, t))
    } else if let Some(t) = sym.strip_prefix("sexp_of_") {
        Some((FnKind::SexpOf, t))
    } else {
        sym.strip_suffix("_of_sexp").map(|t| (FnKind::OfSexp, t))
    }
}

pub(crate) fn call<'p>(interp: &Interp<'p>, sym: &str, args: Vec<Val<'p>>) -> Result<Val<'p>, EvalError> {
    let Some((kind, ty)) = split_symbol(sym) else {
        return Err(EvalError::UnknownFunction(sym.to_string()));
    };
    let expected = kind.value_params().len();
    if STDLIB_PRIMITIVES.contains(&ty) {
        check_arity(sym, expected, &args)?;
        return primitive(kind, ty, args);
    }
    if STDLIB_CONTAINERS.contains(&ty) {
        check_arity(sym, expected + 1, &args)?;
        let mut args = args;
        let f = args.remove(0);
        return container(interp, kind, ty, &f, args);
    }
    Err(EvalError::UnknownFunction(sym.to_string()))
}

fn check_arity(sym: &str, expected: usize, args: &[Val<'_>]) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::Arity {
            function: sym.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn data<'a>(ty: &str, v: &'a Val<'_>) -> Result<&'a Value, EvalError> {
    match v {
        Val::Data(d) => Ok(d),
        other => Err(mismatch(ty, other)),
    }
}

fn tree<'a>(v: &'a Val<'_>) -> Result<&'a Tree, EvalError> {
    match v {
        Val::Tree(t) => Ok(t),
        other => Err(mismatch("tree", other)),
    }
}

fn primitive<'p>(kind: FnKind, ty: &str, args: Vec<Val<'p>>) -> Result<Val<'p>, EvalError> {
    match kind {
        FnKind::Compare => {
            let a = data(ty, &args[0])?;
            let b = data(ty, &args[1])?;
            compare_primitive(ty, a, b).map(ordering)
        }
        FnKind::Hash => hash_primitive(ty, data(ty, &args[0])?).map(Val::Hash),
        FnKind::SexpOf => sexp_of_primitive(ty, data(ty, &args[0])?).map(Val::Tree),
        FnKind::OfSexp => primitive_of_sexp(ty, tree(&args[0])?).map(Val::Data),
    }
}

fn wrong(ty: &str, v: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected: ty.to_string(),
        got: format!("{} value", v.kind_str()),
    }
}

fn compare_primitive(ty: &str, a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    Ok(match (ty, a, b) {
        ("unit", Value::Unit, Value::Unit) => Ordering::Equal,
        ("bool", Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        ("int", Value::Int(x), Value::Int(y)) => x.cmp(y),
        ("float", Value::Float(x), Value::Float(y)) => canonical_nan(*x).total_cmp(&canonical_nan(*y)),
        ("char", Value::Char(x), Value::Char(y)) => x.cmp(y),
        ("string", Value::Str(x), Value::Str(y)) => x.as_bytes().cmp(y.as_bytes()),
        ("bytes", Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (_, a, b) => {
            let bad = if wrong_kind(ty, a) { a } else { b };
            return Err(wrong(ty, bad));
        }
    })
}

fn wrong_kind(ty: &str, v: &Value) -> bool {
    v.kind_str() != ty
}

fn bytes_hash(len: usize, bytes: &[u8]) -> u64 {
    mix(len as u64, bytes.iter().map(|&b| u64::from(b)))
}

fn hash_primitive(ty: &str, v: &Value) -> Result<u64, EvalError> {
    Ok(match (ty, v) {
        ("unit", Value::Unit) => mix(0, []),
        ("bool", Value::Bool(b)) => finalize(u64::from(*b)),
        ("int", Value::Int(i)) => finalize(*i as u64),
        ("float", Value::Float(x)) => finalize(canonical_nan(*x).to_bits()),
        ("char", Value::Char(c)) => finalize(u64::from(*c)),
        ("string", Value::Str(s)) => bytes_hash(s.len(), s.as_bytes()),
        ("bytes", Value::Bytes(b)) => bytes_hash(b.len(), b),
        (_, v) => return Err(wrong(ty, v)),
    })
}

/// Every NaN is one value: it renders as `NaN`, so ordering and hashing must
/// not see sign or payload either.
fn canonical_nan(x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else {
        x
    }
}

fn render_float(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_string()
    } else {
        format!("{x:?}")
    }
}

fn sexp_of_primitive(ty: &str, v: &Value) -> Result<Tree, EvalError> {
    Ok(match (ty, v) {
        ("unit", Value::Unit) => Tree::List(Vec::new()),
        ("bool", Value::Bool(b)) => Tree::atom(b.to_string()),
        ("int", Value::Int(i)) => Tree::atom(i.to_string()),
        ("float", Value::Float(x)) => Tree::atom(render_float(*x)),
        ("char", Value::Char(c)) => Tree::atom(c.to_string()),
        ("string", Value::Str(s)) => Tree::atom(s.clone()),
        ("bytes", Value::Bytes(b)) => Tree::atom(hex::encode(b)),
        (_, v) => return Err(wrong(ty, v)),
    })
}

fn primitive_of_sexp(ty: &str, t: &Tree) -> Result<Value, EvalError> {
    if ty == "unit" {
        return match t {
            Tree::List(items) if items.is_empty() => Ok(Value::Unit),
            other => Err(decode_error(ty, format!("expected `()`, found `{other}`"))),
        };
    }
    let Some(s) = t.as_atom() else {
        return Err(decode_error(ty, format!("expected an atom, found `{t}`")));
    };
    let bad = || decode_error(ty, format!("invalid literal `{s}`"));
    Ok(match ty {
        "bool" => match s {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad()),
        },
        "int" => Value::Int(s.parse().map_err(|_| bad())?),
        "float" => Value::Float(s.parse().map_err(|_| bad())?),
        "char" => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(bad()),
            }
        }
        "string" => Value::Str(s.to_string()),
        "bytes" => Value::Bytes(hex::decode(s).map_err(|_| bad())?),
        _ => return Err(EvalError::UnknownFunction(format!("{ty}_of_sexp"))),
    })
}

fn elements<'a>(ty: &str, v: &'a Value) -> Result<Vec<&'a Value>, EvalError> {
    match (ty, v) {
        ("list" | "array", Value::List(items)) => Ok(items.iter().collect()),
        ("option", Value::Option(x)) => Ok(x.iter().map(|b| &**b).collect()),
        (_, v) => Err(wrong(ty, v)),
    }
}

fn container<'p>(
    interp: &Interp<'p>,
    kind: FnKind,
    ty: &str,
    f: &Val<'p>,
    args: Vec<Val<'p>>,
) -> Result<Val<'p>, EvalError> {
    match kind {
        FnKind::Compare => {
            let xs = elements(ty, data(ty, &args[0])?)?;
            let ys = elements(ty, data(ty, &args[1])?)?;
            for (x, y) in xs.iter().zip(&ys) {
                let o = interp
                    .apply(f, vec![Val::Data((*x).clone()), Val::Data((*y).clone())])?
                    .as_ordering()?;
                if o != Ordering::Equal {
                    return Ok(ordering(o));
                }
            }
            Ok(ordering(xs.len().cmp(&ys.len())))
        }
        FnKind::Hash => {
            let xs = elements(ty, data(ty, &args[0])?)?;
            let mut parts = Vec::with_capacity(xs.len());
            for x in &xs {
                parts.push(interp.apply(f, vec![Val::Data((*x).clone())])?.as_hash()?);
            }
            Ok(Val::Hash(mix(xs.len() as u64, parts)))
        }
        FnKind::SexpOf => {
            let xs = elements(ty, data(ty, &args[0])?)?;
            let mut items = Vec::with_capacity(xs.len());
            for x in &xs {
                items.push(interp.apply(f, vec![Val::Data((*x).clone())])?.into_tree()?);
            }
            Ok(Val::Tree(Tree::List(items)))
        }
        FnKind::OfSexp => {
            let Some(items) = tree(&args[0])?.as_list() else {
                return Err(decode_error(ty, "expected a list"));
            };
            if ty == "option" && items.len() > 1 {
                return Err(decode_error(ty, format!("expected `()` or `(x)`, found {} children", items.len())));
            }
            let mut values = Vec::with_capacity(items.len());
            for it in items {
                values.push(interp.apply(f, vec![Val::Tree(it.clone())])?.into_data()?);
            }
            Ok(Val::Data(match ty {
                "option" => Value::Option(values.pop().map(Box::new)),
                _ => Value::List(values),
            }))
        }
    }
}
