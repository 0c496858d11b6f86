//! Deterministic rendering of generated functions as indented parenthesized
//! source text. The output is what lands in host-document regions, so any change
//! here is a change to every checked-in region.

use crate::ir::{Expr, Func};

const WIDTH: usize = 80;
const INDENT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sx {
    Atom(String),
    List(Vec<Sx>),
}

impl Sx {
    fn atom(s: impl Into<String>) -> Sx {
        Sx::Atom(s.into())
    }

    fn list(head: &str, rest: impl IntoIterator<Item = Sx>) -> Sx {
        let mut items = vec![Sx::atom(head)];
        items.extend(rest);
        Sx::List(items)
    }

    fn head(&self) -> Option<&str> {
        match self {
            Sx::List(items) => match items.first() {
                Some(Sx::Atom(h)) => Some(h),
                _ => None,
            },
            Sx::Atom(_) => None,
        }
    }

    fn flat(&self, out: &mut String) {
        match self {
            Sx::Atom(s) => out.push_str(s),
            Sx::List(items) => {
                out.push('(');
                for (idx, it) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(' ');
                    }
                    it.flat(out);
                }
                out.push(')');
            }
        }
    }

    fn flat_string(&self) -> String {
        let mut s = String::new();
        self.flat(&mut s);
        s
    }
}

/// Number of children kept on the head line when a form breaks.
fn hang(head: &str) -> usize {
    match head {
        "defn" => 2,
        "match-ctor" => 3,
        "fn" | "let" | "case" | "mix" | "expect-list" | "expect-field" | "child" | "item"
        | "field" | "arg" => 1,
        _ => 0,
    }
}

fn always_breaks(head: &str) -> bool {
    matches!(head, "defrec" | "defn")
}

fn layout(sx: &Sx, col: usize, out: &mut String) {
    let flat = sx.flat_string();
    let Sx::List(items) = sx else {
        out.push_str(&flat);
        return;
    };
    let head = sx.head().unwrap_or("");
    if !always_breaks(head) && col + flat.len() <= WIDTH {
        out.push_str(&flat);
        return;
    }
    if items.len() <= 1 {
        out.push_str(&flat);
        return;
    }

    let keep = 1 + hang(head).min(items.len() - 1);
    out.push('(');
    let mut line = String::new();
    for (idx, it) in items[..keep].iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        it.flat(&mut line);
    }
    out.push_str(&line);

    let child_col = col + INDENT;
    for it in &items[keep..] {
        out.push('\n');
        out.push_str(&" ".repeat(child_col));
        layout(it, child_col, out);
    }
    out.push(')');
}

pub(crate) fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn expr_sx(e: &Expr) -> Sx {
    match e {
        Expr::Var(name) => Sx::atom(name.clone()),
        Expr::Int(i) => Sx::atom(i.to_string()),
        Expr::FnRef(c) => Sx::atom(c.symbol()),
        Expr::Lambda { params, body } => Sx::list(
            "fn",
            [
                Sx::List(params.iter().map(|p| Sx::atom(p.clone())).collect()),
                expr_sx(body),
            ],
        ),
        Expr::Call { callee, args } => Sx::list(callee.symbol(), args.iter().map(expr_sx)),
        Expr::Let { name, value, body } => Sx::list(
            "let",
            [
                Sx::List(vec![Sx::atom(name.clone()), expr_sx(value)]),
                expr_sx(body),
            ],
        ),
        Expr::Lex(parts) => Sx::list("lex", parts.iter().map(expr_sx)),
        Expr::CompareTags(a, b) => Sx::list("compare-tags", [expr_sx(a), expr_sx(b)]),
        Expr::Mix { seed, parts } => Sx::list(
            "mix",
            std::iter::once(Sx::atom(seed.to_string())).chain(parts.iter().map(expr_sx)),
        ),
        Expr::Item { of, index } => Sx::list("item", [expr_sx(of), Sx::atom(index.to_string())]),
        Expr::Field { of, name, .. } => Sx::list("field", [expr_sx(of), Sx::atom(name.clone())]),
        Expr::Arg { of, index, .. } => Sx::list("arg", [expr_sx(of), Sx::atom(index.to_string())]),
        Expr::Case { scrutinee, arms } => Sx::list(
            "case",
            std::iter::once(expr_sx(scrutinee)).chain(
                arms.iter()
                    .map(|arm| Sx::List(vec![Sx::atom(arm.name.clone()), expr_sx(&arm.body)])),
            ),
        ),
        Expr::Atom(s) => Sx::list("atom", [Sx::atom(string_literal(s))]),
        Expr::Node(children) => Sx::list("node", children.iter().map(expr_sx)),
        Expr::ExpectList { tree, len, what } => Sx::list(
            "expect-list",
            [
                expr_sx(tree),
                Sx::atom(len.to_string()),
                Sx::atom(string_literal(what)),
            ],
        ),
        Expr::Child { of, index } => Sx::list("child", [expr_sx(of), Sx::atom(index.to_string())]),
        Expr::ExpectField { tree, name } => {
            Sx::list("expect-field", [expr_sx(tree), Sx::atom(string_literal(name))])
        }
        Expr::MatchCtor {
            tree,
            what,
            binder,
            arms,
        } => Sx::list(
            "match-ctor",
            [
                expr_sx(tree),
                Sx::atom(string_literal(what)),
                Sx::atom(binder.clone()),
            ]
            .into_iter()
            .chain(arms.iter().map(|arm| {
                Sx::List(vec![
                    Sx::atom(arm.name.clone()),
                    Sx::atom(arm.arity.to_string()),
                    expr_sx(&arm.body),
                ])
            })),
        ),
        Expr::MkTuple(items) => Sx::list("tuple", items.iter().map(expr_sx)),
        Expr::MkRecord(fields) => Sx::list(
            "record",
            fields
                .iter()
                .map(|(name, e)| Sx::List(vec![Sx::atom(name.clone()), expr_sx(e)])),
        ),
        Expr::MkVariant { name, args, .. } => Sx::list(
            "make",
            std::iter::once(Sx::atom(name.clone())).chain(args.iter().map(expr_sx)),
        ),
    }
}

fn func_sx(f: &Func) -> Sx {
    Sx::list(
        "defn",
        [
            Sx::atom(f.name.clone()),
            Sx::List(f.params.iter().map(|p| Sx::atom(p.clone())).collect()),
            expr_sx(&f.body),
        ],
    )
}

/// Renders one function, newline terminated.
pub fn emit_func(f: &Func) -> String {
    let mut out = String::new();
    layout(&func_sx(f), 0, &mut out);
    out.push('\n');
    out
}

/// Renders the functions of one binding set. Recursive sets are wrapped in a
/// single `defrec` form so every member is in scope of every other.
pub fn emit_binding_set(funcs: &[&Func], recursive: bool) -> String {
    if recursive {
        let sx = Sx::list("defrec", funcs.iter().map(|f| func_sx(f)));
        let mut out = String::new();
        layout(&sx, 0, &mut out);
        out.push('\n');
        return out;
    }
    funcs
        .iter()
        .map(|f| emit_func(f))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::FnKind;
    use crate::ir::{CaseArm, Callee};

    fn compare_ab() -> Func {
        Func {
            name: "compare_ab".to_string(),
            kind: FnKind::Compare,
            type_name: "ab".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
            body: Expr::Lex(vec![
                Expr::CompareTags(Expr::var("a").boxed(), Expr::var("b").boxed()),
                Expr::Case {
                    scrutinee: Expr::var("a").boxed(),
                    arms: vec![
                        CaseArm {
                            ctor: 0,
                            name: "A".to_string(),
                            body: Expr::Int(0),
                        },
                        CaseArm {
                            ctor: 1,
                            name: "B".to_string(),
                            body: Expr::call(
                                Callee::Combinator("compare_int".to_string()),
                                vec![
                                    Expr::Arg {
                                        of: Expr::var("a").boxed(),
                                        ctor: 1,
                                        index: 0,
                                    },
                                    Expr::Arg {
                                        of: Expr::var("b").boxed(),
                                        ctor: 1,
                                        index: 0,
                                    },
                                ],
                            ),
                        },
                    ],
                },
            ]),
        }
    }

    #[test]
    fn short_bodies_stay_on_one_line() {
        let text = emit_func(&compare_ab());
        assert_eq!(
            text,
            "(defn compare_ab (a b)\n  (lex (compare-tags a b) (case a (A 0) (B (compare_int (arg a 0) (arg b 0))))))\n"
        );
    }

    #[test]
    fn recursive_sets_wrap_in_defrec_and_break_long_forms() {
        let f = compare_ab();
        let text = emit_binding_set(&[&f, &f], true);
        assert!(text.starts_with("(defrec\n  (defn compare_ab (a b)\n    (lex\n"), "{text}");
        assert!(text.ends_with(")))))\n"), "{text}");
        for line in text.lines() {
            assert!(line.len() <= WIDTH, "line too long: {line:?}");
        }
        assert_eq!(text, emit_binding_set(&[&f, &f], true));
    }

    #[test]
    fn string_literals_escape() {
        assert_eq!(string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    }
}
