#![allow(dead_code)]

use x07derive_core::{
    derive_request, Capability, CapabilityTable, Derivation, DeriveRequest, TypeDef, TypeShape, Value,
};

pub fn def(name: &str, params: &[&str], body: TypeShape) -> TypeDef {
    TypeDef::new(name, params.iter().copied(), body).expect("valid type definition")
}

pub fn derive_all(defs: Vec<TypeDef>) -> Derivation {
    let req = DeriveRequest::new(defs).expect("valid request");
    derive_request(&req, &CapabilityTable::stdlib(), &Capability::ALL)
}

fn named(name: &str) -> TypeShape {
    TypeShape::applied(name, [])
}

/// A mix of every shape kind the generators handle:
///
/// ```text
/// point      = { x: int; y: float }
/// color      = Red | Green | Rgb of int * int * int
/// 'a tree    = Leaf | Node of 'a * 'a forest
/// 'a forest  = Nil | Cons of 'a tree * 'a forest
/// doc        = { name: string; tags: string list; origin: point option;
///                paint: color; kids: int tree; raw: bytes; ch: char;
///                flag: bool; pair: (unit * int array) }
/// ```
pub fn fixture_types() -> Vec<TypeDef> {
    vec![
        def(
            "point",
            &[],
            TypeShape::record([("x", TypeShape::prim("int")), ("y", TypeShape::prim("float"))]),
        ),
        def(
            "color",
            &[],
            TypeShape::variant([
                ("Red", vec![]),
                ("Green", vec![]),
                (
                    "Rgb",
                    vec![TypeShape::prim("int"), TypeShape::prim("int"), TypeShape::prim("int")],
                ),
            ]),
        ),
        def(
            "tree",
            &["a"],
            TypeShape::variant([
                ("Leaf", vec![]),
                ("Node", vec![TypeShape::var("a"), TypeShape::recursive("forest")]),
            ]),
        ),
        def(
            "forest",
            &["a"],
            TypeShape::variant([
                ("Nil", vec![]),
                ("Cons", vec![TypeShape::recursive("tree"), TypeShape::recursive("forest")]),
            ]),
        ),
        def(
            "doc",
            &[],
            TypeShape::record([
                ("name", TypeShape::prim("string")),
                ("tags", TypeShape::applied("list", [TypeShape::prim("string")])),
                ("origin", TypeShape::applied("option", [named("point")])),
                ("paint", named("color")),
                ("kids", TypeShape::applied("tree", [TypeShape::prim("int")])),
                ("raw", TypeShape::prim("bytes")),
                ("ch", TypeShape::prim("char")),
                ("flag", TypeShape::prim("bool")),
                (
                    "pair",
                    TypeShape::tuple([
                        TypeShape::prim("unit"),
                        TypeShape::applied("array", [TypeShape::prim("int")]),
                    ]),
                ),
            ]),
        ),
    ]
}

pub fn leaf() -> Value {
    Value::variant(0, "Leaf", [])
}

pub fn node(x: Value, kids: Value) -> Value {
    Value::variant(1, "Node", [x, kids])
}

pub fn nil() -> Value {
    Value::variant(0, "Nil", [])
}

pub fn cons(t: Value, rest: Value) -> Value {
    Value::variant(1, "Cons", [t, rest])
}

pub fn forest(trees: Vec<Value>) -> Value {
    trees.into_iter().rev().fold(nil(), |acc, t| cons(t, acc))
}

/// A complete tree of the given depth; every node has two children and
/// carries `label(path)`.
pub fn full_tree(depth: u32, label: &dyn Fn(u64) -> i64, path: u64) -> Value {
    if depth == 0 {
        return leaf();
    }
    let kids = (0..2)
        .map(|i| full_tree(depth - 1, label, path * 2 + i))
        .collect();
    node(Value::Int(label(path)), forest(kids))
}
