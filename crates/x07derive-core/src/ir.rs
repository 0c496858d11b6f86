use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capability::FnKind;

/// Who a call in generated code goes to. These are the only ways generated code
/// reaches its environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "symbol", rename_all = "snake_case")]
pub enum Callee {
    /// Standard-library entry point.
    Combinator(String),
    /// Function of the same binding set.
    Group(String),
    /// Capability function derived outside the group (earlier group or external).
    Derived(String),
    /// Capability-function parameter in scope.
    Local(String),
}

impl Callee {
    pub fn symbol(&self) -> &str {
        match self {
            Callee::Combinator(s) | Callee::Group(s) | Callee::Derived(s) | Callee::Local(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseArm {
    pub ctor: usize,
    pub name: String,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorArm {
    pub ctor: usize,
    pub name: String,
    pub arity: usize,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Var(String),
    Int(i64),
    FnRef(Callee),
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },

    /// First non-zero ordering, left to right; later operands are not evaluated.
    Lex(Vec<Expr>),
    /// Orders two variant values by constructor declaration index.
    CompareTags(Box<Expr>, Box<Expr>),
    /// Order-sensitive fold of sub-hashes, starting from `seed`.
    Mix {
        seed: i64,
        parts: Vec<Expr>,
    },

    Item {
        of: Box<Expr>,
        index: usize,
    },
    Field {
        of: Box<Expr>,
        index: usize,
        name: String,
    },
    Arg {
        of: Box<Expr>,
        ctor: usize,
        index: usize,
    },
    /// Dispatches on the constructor of a variant value.
    Case {
        scrutinee: Box<Expr>,
        arms: Vec<CaseArm>,
    },

    Atom(String),
    Node(Vec<Expr>),
    ExpectList {
        tree: Box<Expr>,
        len: usize,
        what: String,
    },
    Child {
        of: Box<Expr>,
        index: usize,
    },
    ExpectField {
        tree: Box<Expr>,
        name: String,
    },
    /// Matches `(Ctor args...)`, binding the argument trees to `binder`.
    MatchCtor {
        tree: Box<Expr>,
        what: String,
        binder: String,
        arms: Vec<CtorArm>,
    },

    MkTuple(Vec<Expr>),
    MkRecord(Vec<(String, Expr)>),
    MkVariant {
        ctor: usize,
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    pub fn call(callee: Callee, args: Vec<Expr>) -> Expr {
        Expr::Call { callee, args }
    }

    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    /// Calls and function references to anything but local parameters.
    pub fn collect_callees(&self, out: &mut BTreeSet<Callee>) {
        match self {
            Expr::Var(_) | Expr::Int(_) | Expr::Atom(_) => {}
            Expr::FnRef(c) => {
                if !matches!(c, Callee::Local(_)) {
                    out.insert(c.clone());
                }
            }
            Expr::Call { callee, args } => {
                if !matches!(callee, Callee::Local(_)) {
                    out.insert(callee.clone());
                }
                args.iter().for_each(|a| a.collect_callees(out));
            }
            Expr::Lambda { body, .. } => body.collect_callees(out),
            Expr::Let { value, body, .. } => {
                value.collect_callees(out);
                body.collect_callees(out);
            }
            Expr::Lex(xs) | Expr::Node(xs) | Expr::MkTuple(xs) => {
                xs.iter().for_each(|x| x.collect_callees(out))
            }
            Expr::Mix { parts, .. } => parts.iter().for_each(|x| x.collect_callees(out)),
            Expr::MkVariant { args, .. } => args.iter().for_each(|x| x.collect_callees(out)),
            Expr::MkRecord(fields) => fields.iter().for_each(|(_, x)| x.collect_callees(out)),
            Expr::CompareTags(a, b) => {
                a.collect_callees(out);
                b.collect_callees(out);
            }
            Expr::Item { of, .. }
            | Expr::Field { of, .. }
            | Expr::Arg { of, .. }
            | Expr::Child { of, .. } => of.collect_callees(out),
            Expr::ExpectList { tree, .. } | Expr::ExpectField { tree, .. } => {
                tree.collect_callees(out)
            }
            Expr::Case { scrutinee, arms } => {
                scrutinee.collect_callees(out);
                arms.iter().for_each(|a| a.body.collect_callees(out));
            }
            Expr::MatchCtor { tree, arms, .. } => {
                tree.collect_callees(out);
                arms.iter().for_each(|a| a.body.collect_callees(out));
            }
        }
    }
}

/// One generated function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub kind: FnKind,
    pub type_name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

impl Func {
    pub fn callees(&self) -> BTreeSet<Callee> {
        let mut out = BTreeSet::new();
        self.body.collect_callees(&mut out);
        out
    }
}
