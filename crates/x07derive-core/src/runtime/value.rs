/// A dynamic value of some derived type. The reference runtime checks shapes
/// as it goes; a value of the wrong shape is an evaluation error, not a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
    /// Fields in declaration order.
    Record(Vec<(String, Value)>),
    Variant {
        ctor: usize,
        name: String,
        args: Vec<Value>,
    },
    /// Both `list` and `array`.
    List(Vec<Value>),
    Option(Option<Box<Value>>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Record(
            fields
                .into_iter()
                .map(|(name, v)| (name.to_string(), v))
                .collect(),
        )
    }

    pub fn variant(ctor: usize, name: &str, args: impl IntoIterator<Item = Value>) -> Value {
        Value::Variant {
            ctor,
            name: name.to_string(),
            args: args.into_iter().collect(),
        }
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    pub fn some(v: Value) -> Value {
        Value::Option(Some(Box::new(v)))
    }

    pub fn none() -> Value {
        Value::Option(None)
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::Record(_) => "record",
            Value::Variant { .. } => "variant",
            Value::List(_) => "list",
            Value::Option(_) => "option",
        }
    }
}
