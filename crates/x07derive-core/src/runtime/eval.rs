//! Interpreter for generated functions.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::diagnostics::Diagnostic;
use crate::ir::{Callee, Expr, Func};

use super::mix::mix;
use super::stdlib;
use super::tree::{Tree, TreeParseError};
use super::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The requested instantiation could not be derived.
    Derive(Diagnostic),
    UnknownFunction(String),
    Unbound(String),
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    TypeMismatch {
        expected: String,
        got: String,
    },
    Decode {
        what: String,
        message: String,
    },
    Parse(TreeParseError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Derive(d) => write!(f, "{d}"),
            EvalError::UnknownFunction(name) => write!(f, "unknown function `{name}`"),
            EvalError::Unbound(name) => write!(f, "unbound variable `{name}`"),
            EvalError::Arity {
                function,
                expected,
                got,
            } => write!(f, "`{function}` takes {expected} argument(s), got {got}"),
            EvalError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            EvalError::Decode { what, message } => write!(f, "cannot decode {what}: {message}"),
            EvalError::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<TreeParseError> for EvalError {
    fn from(err: TreeParseError) -> Self {
        EvalError::Parse(err)
    }
}

pub(crate) fn mismatch(expected: &str, got: &Val<'_>) -> EvalError {
    EvalError::TypeMismatch {
        expected: expected.to_string(),
        got: got.describe(),
    }
}

pub(crate) fn decode_error(what: &str, message: impl Into<String>) -> EvalError {
    EvalError::Decode {
        what: what.to_string(),
        message: message.into(),
    }
}

pub(crate) enum FnVal<'p> {
    Named(String),
    Closure {
        params: &'p [String],
        body: &'p Expr,
        env: Env<'p>,
    },
}

#[derive(Clone)]
pub(crate) enum Val<'p> {
    Data(Value),
    Tree(Tree),
    /// Children of a list tree, bound by `let` or `match-ctor`.
    Trees(Rc<Vec<Tree>>),
    /// Comparison results (-1, 0, 1) and integer literals.
    Int(i64),
    Hash(u64),
    Func(Rc<FnVal<'p>>),
}

impl<'p> Val<'p> {
    pub(crate) fn describe(&self) -> String {
        match self {
            Val::Data(v) => format!("{} value", v.kind_str()),
            Val::Tree(_) => "tree".to_string(),
            Val::Trees(_) => "tree children".to_string(),
            Val::Int(_) => "int".to_string(),
            Val::Hash(_) => "hash".to_string(),
            Val::Func(_) => "function".to_string(),
        }
    }

    pub(crate) fn into_data(self) -> Result<Value, EvalError> {
        match self {
            Val::Data(v) => Ok(v),
            other => Err(mismatch("value", &other)),
        }
    }

    pub(crate) fn into_tree(self) -> Result<Tree, EvalError> {
        match self {
            Val::Tree(t) => Ok(t),
            other => Err(mismatch("tree", &other)),
        }
    }

    pub(crate) fn as_ordering(&self) -> Result<Ordering, EvalError> {
        match self {
            Val::Int(i) => Ok(i.cmp(&0)),
            other => Err(mismatch("comparison result", other)),
        }
    }

    pub(crate) fn as_hash(&self) -> Result<u64, EvalError> {
        match self {
            Val::Hash(h) => Ok(*h),
            other => Err(mismatch("hash", other)),
        }
    }
}

pub(crate) fn ordering(o: Ordering) -> Val<'static> {
    Val::Int(match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

pub(crate) type Env<'p> = BTreeMap<String, Val<'p>>;

pub(crate) struct Interp<'p> {
    funcs: &'p BTreeMap<String, Func>,
}

impl<'p> Interp<'p> {
    pub(crate) fn new(funcs: &'p BTreeMap<String, Func>) -> Self {
        Interp { funcs }
    }

    fn callee(&self, callee: &Callee, env: &Env<'p>) -> Result<Val<'p>, EvalError> {
        match callee {
            Callee::Local(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Unbound(name.clone())),
            Callee::Combinator(sym) | Callee::Group(sym) | Callee::Derived(sym) => {
                Ok(Val::Func(Rc::new(FnVal::Named(sym.clone()))))
            }
        }
    }

    pub(crate) fn apply(&self, f: &Val<'p>, args: Vec<Val<'p>>) -> Result<Val<'p>, EvalError> {
        let Val::Func(f) = f else {
            return Err(mismatch("function", f));
        };
        match f.as_ref() {
            FnVal::Named(sym) => match self.funcs.get(sym) {
                Some(func) => {
                    let env = bind(sym, &func.params, args, Env::new())?;
                    self.eval(&func.body, &env)
                }
                None => stdlib::call(self, sym, args),
            },
            FnVal::Closure { params, body, env } => {
                let env = bind("<fn>", params, args, env.clone())?;
                self.eval(*body, &env)
            }
        }
    }

    pub(crate) fn eval(&self, e: &'p Expr, env: &Env<'p>) -> Result<Val<'p>, EvalError> {
        match e {
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Unbound(name.clone())),
            Expr::Int(i) => Ok(Val::Int(*i)),
            Expr::FnRef(c) => self.callee(c, env),
            Expr::Lambda { params, body } => Ok(Val::Func(Rc::new(FnVal::Closure {
                params,
                body,
                env: env.clone(),
            }))),
            Expr::Call { callee, args } => {
                let f = self.callee(callee, env)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(&f, args)
            }
            Expr::Let { name, value, body } => {
                let v = self.eval(value, env)?;
                let mut env = env.clone();
                env.insert(name.clone(), v);
                self.eval(body, &env)
            }
            Expr::Lex(parts) => {
                for p in parts {
                    let v = self.eval(p, env)?;
                    if v.as_ordering()? != Ordering::Equal {
                        return Ok(v);
                    }
                }
                Ok(Val::Int(0))
            }
            Expr::CompareTags(a, b) => {
                let a = self.eval(a, env)?;
                let b = self.eval(b, env)?;
                Ok(ordering(ctor_index(&a)?.cmp(&ctor_index(&b)?)))
            }
            Expr::Mix { seed, parts } => {
                let mut hs = Vec::with_capacity(parts.len());
                for p in parts {
                    hs.push(self.eval(p, env)?.as_hash()?);
                }
                Ok(Val::Hash(mix(*seed as u64, hs)))
            }
            Expr::Item { of, index } => match self.eval(of, env)? {
                Val::Data(Value::Tuple(mut items)) if *index < items.len() => {
                    Ok(Val::Data(items.swap_remove(*index)))
                }
                other => Err(mismatch(&format!("tuple with item {index}"), &other)),
            },
            Expr::Field { of, index, name } => match self.eval(of, env)? {
                Val::Data(Value::Record(mut fields))
                    if fields.get(*index).is_some_and(|(n, _)| n == name) =>
                {
                    Ok(Val::Data(fields.swap_remove(*index).1))
                }
                other => Err(mismatch(&format!("record with field `{name}`"), &other)),
            },
            Expr::Arg { of, ctor, index } => match self.eval(of, env)? {
                Val::Data(Value::Variant { ctor: c, mut args, .. })
                    if c == *ctor && *index < args.len() =>
                {
                    Ok(Val::Data(args.swap_remove(*index)))
                }
                other => Err(mismatch(
                    &format!("constructor #{ctor} with argument {index}"),
                    &other,
                )),
            },
            Expr::Case { scrutinee, arms } => {
                let v = self.eval(scrutinee, env)?;
                let ctor = ctor_index(&v)?;
                match arms.iter().find(|arm| arm.ctor == ctor) {
                    Some(arm) => self.eval(&arm.body, env),
                    None => Err(mismatch("declared constructor", &v)),
                }
            }
            Expr::Atom(s) => Ok(Val::Tree(Tree::Atom(s.clone()))),
            Expr::Node(children) => {
                let mut items = Vec::with_capacity(children.len());
                for c in children {
                    items.push(self.eval(c, env)?.into_tree()?);
                }
                Ok(Val::Tree(Tree::List(items)))
            }
            Expr::ExpectList { tree, len, what } => match self.eval(tree, env)?.into_tree()? {
                Tree::List(items) if items.len() == *len => Ok(Val::Trees(Rc::new(items))),
                Tree::List(items) => Err(decode_error(
                    what,
                    format!("expected {len} children, found {}", items.len()),
                )),
                Tree::Atom(a) => Err(decode_error(what, format!("expected a list, found atom `{a}`"))),
            },
            Expr::Child { of, index } => match self.eval(of, env)? {
                Val::Trees(items) => items
                    .get(*index)
                    .cloned()
                    .map(Val::Tree)
                    .ok_or_else(|| decode_error("tree", format!("missing child {index}"))),
                other => Err(mismatch("tree children", &other)),
            },
            Expr::ExpectField { tree, name } => match self.eval(tree, env)?.into_tree()? {
                Tree::List(mut items)
                    if items.len() == 2 && items[0].as_atom() == Some(name.as_str()) =>
                {
                    Ok(Val::Tree(items.swap_remove(1)))
                }
                other => Err(decode_error(
                    &format!("field `{name}`"),
                    format!("expected `({name} <value>)`, found `{other}`"),
                )),
            },
            Expr::MatchCtor {
                tree,
                what,
                binder,
                arms,
            } => {
                let mut items = match self.eval(tree, env)?.into_tree()? {
                    Tree::List(items) => items,
                    t => {
                        return Err(decode_error(what, format!("expected `(Ctor ...)`, found `{t}`")))
                    }
                };
                let head = match items.first() {
                    Some(Tree::Atom(h)) => h.clone(),
                    _ => return Err(decode_error(what, "expected a constructor name")),
                };
                let Some(arm) = arms.iter().find(|arm| arm.name == head) else {
                    return Err(decode_error(what, format!("unknown constructor `{head}`")));
                };
                if items.len() - 1 != arm.arity {
                    return Err(decode_error(
                        what,
                        format!(
                            "`{head}` takes {} argument(s), found {}",
                            arm.arity,
                            items.len() - 1
                        ),
                    ));
                }
                items.remove(0);
                let mut env = env.clone();
                env.insert(binder.clone(), Val::Trees(Rc::new(items)));
                self.eval(&arm.body, &env)
            }
            Expr::MkTuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for it in items {
                    out.push(self.eval(it, env)?.into_data()?);
                }
                Ok(Val::Data(Value::Tuple(out)))
            }
            Expr::MkRecord(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, it) in fields {
                    out.push((name.clone(), self.eval(it, env)?.into_data()?));
                }
                Ok(Val::Data(Value::Record(out)))
            }
            Expr::MkVariant { ctor, name, args } => {
                let mut out = Vec::with_capacity(args.len());
                for it in args {
                    out.push(self.eval(it, env)?.into_data()?);
                }
                Ok(Val::Data(Value::Variant {
                    ctor: *ctor,
                    name: name.clone(),
                    args: out,
                }))
            }
        }
    }
}

fn ctor_index(v: &Val<'_>) -> Result<usize, EvalError> {
    match v {
        Val::Data(Value::Variant { ctor, .. }) => Ok(*ctor),
        other => Err(mismatch("variant value", other)),
    }
}

fn bind<'p>(
    function: &str,
    params: &[String],
    args: Vec<Val<'p>>,
    mut env: Env<'p>,
) -> Result<Env<'p>, EvalError> {
    if params.len() != args.len() {
        return Err(EvalError::Arity {
            function: function.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    for (p, a) in params.iter().zip(args) {
        env.insert(p.clone(), a);
    }
    Ok(env)
}
