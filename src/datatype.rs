// used to share frozen aggregates between copies of a fact without copying them
use std::sync::Arc;
// used to carry host objects the engine can't look into
use std::any::Any;
// used to print out readable forms of a value
use std::fmt;
// every frozen value feeds the structural hash of its fact
use std::hash::{Hash, Hasher};

// we will use a fast hashing algo for structural hashes
use seahash::SeaHasher;

use crate::constraint::Constraint;
use crate::error::{FactError, Result};

// ------------- Opaque -------------
// A host object carried through a fact untouched. It is equal only to itself
// and can never be hashed.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    object: Arc<dyn Any + Send + Sync>,
}
impl Opaque {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            object: Arc::new(object),
        }
    }
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.object).downcast_ref::<T>()
    }
}
impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.object), Arc::as_ptr(&other.object))
    }
}
impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.type_name)
    }
}

// ------------- Value -------------
/// A slot value.
///
/// `List`, `Dict` and `Set` are the mutable aggregates callers hand in; they
/// never survive storage in a fact, because [`freeze`] turns them into
/// `Tuple`, `FrozenDict` and `FrozenSet` respectively.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Tuple(Arc<[Value]>),
    FrozenDict(Arc<[(Value, Value)]>),
    FrozenSet(Arc<[Value]>),
    Constraint(Constraint),
    Opaque(Opaque),
}

impl Value {
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
    pub fn dict<K: Into<Value>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Value::Dict(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
    pub fn set<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
            Value::FrozenDict(_) => "frozendict",
            Value::FrozenSet(_) => "frozenset",
            Value::Constraint(_) => "constraint",
            Value::Opaque(o) => o.type_name(),
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_constraint(&self) -> Option<&Constraint> {
        match self {
            Value::Constraint(c) => Some(c),
            _ => None,
        }
    }
    /// True when no mutable aggregate is reachable from this value and every
    /// frozen set or dict in it is free of duplicate members or keys.
    pub fn is_frozen(&self) -> bool {
        match self {
            Value::List(_) | Value::Dict(_) | Value::Set(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_frozen),
            Value::FrozenSet(items) => {
                items.iter().all(Value::is_frozen)
                    && items.iter().enumerate().all(|(i, item)| !items[..i].contains(item))
            }
            Value::FrozenDict(pairs) => {
                pairs.iter().all(|(k, v)| k.is_frozen() && v.is_frozen())
                    && pairs
                        .iter()
                        .enumerate()
                        .all(|(i, (k, _))| !pairs[..i].iter().any(|(other, _)| other == k))
            }
            Value::Constraint(c) => c.is_frozen(),
            _ => true,
        }
    }
    pub fn structural_hash(&self) -> Result<u64> {
        let mut hasher = SeaHasher::new();
        self.feed(&mut hasher)?;
        Ok(hasher.finish())
    }
    // Each variant is tagged so that e.g. Int(1) and Bool(true) don't collide.
    pub(crate) fn feed<H: Hasher>(&self, state: &mut H) -> Result<()> {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(x) => {
                3u8.hash(state);
                canonical_bits(*x).hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Tuple(items) => {
                5u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    item.feed(state)?;
                }
            }
            Value::FrozenDict(pairs) => {
                6u8.hash(state);
                unordered_digest(pairs.iter().map(|(k, v)| {
                    let mut hasher = SeaHasher::new();
                    k.feed(&mut hasher)?;
                    v.feed(&mut hasher)?;
                    Ok(hasher.finish())
                }))?
                .hash(state);
            }
            Value::FrozenSet(items) => {
                7u8.hash(state);
                unordered_digest(items.iter().map(Value::structural_hash))?.hash(state);
            }
            Value::Constraint(c) => {
                8u8.hash(state);
                c.feed(state)?;
            }
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Opaque(_) => {
                return Err(FactError::UnhashableValue {
                    type_name: self.type_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

// ------------- Freezing -------------
/// Deeply converts a value into its immutable form.
///
/// Lists become tuples, dicts become frozen dicts (a repeated key keeps its
/// first position and its last value) and sets become frozen sets (first
/// occurrence kept). Frozen sets and dicts built by hand with duplicates get
/// the same treatment. Scalars, canonical constraints and opaque objects pass
/// through unchanged, so freezing a frozen value is a no-op.
pub fn freeze(value: Value) -> Value {
    if value.is_frozen() {
        return value;
    }
    match value {
        Value::List(items) => Value::Tuple(items.into_iter().map(freeze).collect()),
        Value::Tuple(items) => Value::Tuple(items.iter().cloned().map(freeze).collect()),
        Value::Dict(pairs) => Value::FrozenDict(freeze_pairs(pairs)),
        Value::FrozenDict(pairs) => Value::FrozenDict(freeze_pairs(pairs.iter().cloned())),
        Value::Set(items) => Value::FrozenSet(freeze_members(items)),
        Value::FrozenSet(items) => Value::FrozenSet(freeze_members(items.iter().cloned())),
        Value::Constraint(c) => Value::Constraint(c.frozen()),
        other => other,
    }
}

fn freeze_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Arc<[(Value, Value)]> {
    let mut frozen: Vec<(Value, Value)> = Vec::new();
    for (key, value) in pairs {
        let (key, value) = (freeze(key), freeze(value));
        match frozen.iter_mut().find(|(existing, _)| *existing == key) {
            Some(pair) => pair.1 = value,
            None => frozen.push((key, value)),
        }
    }
    frozen.into()
}

fn freeze_members(items: impl IntoIterator<Item = Value>) -> Arc<[Value]> {
    let mut frozen: Vec<Value> = Vec::new();
    for item in items.into_iter().map(freeze) {
        if !frozen.contains(&item) {
            frozen.push(item);
        }
    }
    frozen.into()
}

// -0.0 equals 0.0 and all NaNs are one value, otherwise Eq would not be reflexive
fn canonical_bits(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

// Multiset comparison for collections whose order carries no meaning.
pub(crate) fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for x in a {
        match (0..b.len()).find(|&i| !used[i] && b[i] == *x) {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

// Combines member digests independently of their order.
pub(crate) fn unordered_digest(digests: impl Iterator<Item = Result<u64>>) -> Result<u64> {
    let mut digests = digests.collect::<Result<Vec<u64>>>()?;
    digests.sort_unstable();
    let mut hasher = SeaHasher::new();
    digests.len().hash(&mut hasher);
    for digest in digests {
        digest.hash(&mut hasher);
    }
    Ok(hasher.finish())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => same_members(a, b),
            (Value::FrozenDict(a), Value::FrozenDict(b)) => same_members(a, b),
            (Value::Set(a), Value::Set(b)) => same_members(a, b),
            (Value::FrozenSet(a), Value::FrozenSet(b)) => same_members(a, b),
            (Value::Constraint(a), Value::Constraint(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Value {}

fn write_items<'a>(
    f: &mut fmt::Formatter,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_pairs<'a>(
    f: &mut fmt::Formatter,
    pairs: impl Iterator<Item = &'a (Value, Value)>,
) -> fmt::Result {
    for (i, (k, v)) in pairs.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items.iter())?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items.iter())?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(pairs) => {
                write!(f, "{{")?;
                write_pairs(f, pairs.iter())?;
                write!(f, "}}")
            }
            Value::FrozenDict(pairs) => {
                write!(f, "frozendict({{")?;
                write_pairs(f, pairs.iter())?;
                write!(f, "}})")
            }
            Value::Set(items) if items.is_empty() => write!(f, "set()"),
            Value::Set(items) => {
                write!(f, "{{")?;
                write_items(f, items.iter())?;
                write!(f, "}}")
            }
            Value::FrozenSet(items) => {
                write!(f, "frozenset({{")?;
                write_items(f, items.iter())?;
                write!(f, "}})")
            }
            Value::Constraint(c) => write!(f, "{}", c),
            Value::Opaque(o) => write!(f, "{:?}", o),
        }
    }
}

// ------------- Conversions -------------
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}
impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}
impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}
impl From<Constraint> for Value {
    fn from(c: Constraint) -> Self {
        Value::Constraint(c)
    }
}
impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(map) => Value::dict(map),
        }
    }
}
