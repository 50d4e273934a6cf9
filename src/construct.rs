// used to share names and the declared type between copies of a fact,
// and to cache the structural hash once it has been computed
use std::sync::{Arc, OnceLock};

// used to print out readable forms of a construct
use std::fmt;
use std::hash::{Hash, Hasher};

// so regular expressions don't have to be recompiled
use lazy_static::lazy_static;
use regex::Regex;
// we will use a fast hashing algo for the structural hash
use seahash::SeaHasher;
use tracing::{debug, trace, warn};

// our own stuff that we need
use crate::constraint::Constraint;
use crate::datatype::{freeze, unordered_digest, Value};
use crate::error::{FactError, Result};
use crate::settings::Settings;

// ------------- FactId -------------
pub type FactId = u64;

pub const DEFAULT_KIND: &str = "Fact";
pub const INITIAL_KIND: &str = "InitialFact";

// Names of the reserved slots. They are never stored among the ordinary
// slots; `Fact::bind` and `Fact::identity` hold them instead.
pub const BIND_SLOT: &str = "__bind__";
pub const FACTID_SLOT: &str = "__factid__";

lazy_static! {
    // names starting and ending with a double underscore
    static ref SPECIAL_NAME: Regex = Regex::new(r"(?s)^__(?:.*__|_?)$").unwrap();
    static ref DEFAULT_SETTINGS: Settings = Settings::default();
}

// ------------- Key -------------
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub enum Key {
    Index(usize),
    Name(Arc<str>),
}
impl Key {
    pub fn index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }
    pub fn name(&self) -> Option<&str> {
        match self {
            Key::Index(_) => None,
            Key::Name(name) => Some(&**name),
        }
    }
}
impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}
impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Arc::from(name))
    }
}
impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Arc::from(name))
    }
}
impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Key::Name(name)
    }
}
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

// How a named constructor key is read.
enum KeyShape<'k> {
    Plain(&'k str),
    Compound { base: &'k str, path: Vec<&'k str> },
}

fn shape<'k>(key: &'k str, separator: &str) -> Result<KeyShape<'k>> {
    if Fact::is_special_name(key) || !key.contains(separator) {
        return Ok(KeyShape::Plain(key));
    }
    let mut segments = key.split(separator);
    let base = segments.next().unwrap_or_default();
    let path: Vec<&str> = segments.collect();
    if base.is_empty() {
        return Err(FactError::MalformedCompoundKey {
            key: key.to_string(),
            reason: "missing base field".to_string(),
        });
    }
    if path.iter().any(|segment| segment.is_empty()) {
        return Err(FactError::MalformedCompoundKey {
            key: key.to_string(),
            reason: "empty path segment".to_string(),
        });
    }
    Ok(KeyShape::Compound { base, path })
}

// A named field while the constructor arguments are being flattened.
enum Field {
    Plain(Value),
    Composed(Constraint),
}
impl Field {
    fn into_value(self) -> Value {
        match self {
            Field::Plain(value) => value,
            Field::Composed(constraint) => Value::Constraint(constraint),
        }
    }
}

// ------------- Fact -------------
/// A single assertable piece of knowledge.
///
/// Slots are either positional (`Key::Index`, numbered in declaration order)
/// or named (`Key::Name`). Every stored value is frozen. The two reserved
/// slots, bind and identity, live outside the ordinary slots. Once an
/// identity is bound the fact can't be modified any more, which makes it
/// safe to share between readers.
#[derive(Clone)]
pub struct Fact {
    kind: Arc<str>,
    slots: Vec<(Key, Value)>,
    bind: Option<Arc<str>>,
    factid: Option<FactId>,
    hash: OnceLock<u64>,
}

impl Fact {
    pub fn empty() -> Self {
        Self::empty_of(DEFAULT_KIND)
    }
    pub fn empty_of(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            slots: Vec::new(),
            bind: None,
            factid: None,
            hash: OnceLock::new(),
        }
    }
    /// The marker fact an engine declares before anything else.
    pub fn initial() -> Self {
        Self::empty_of(INITIAL_KIND)
    }
    pub fn builder() -> FactBuilder {
        FactBuilder::new(DEFAULT_KIND)
    }
    pub fn builder_of(kind: impl Into<Arc<str>>) -> FactBuilder {
        FactBuilder::new(kind)
    }
    pub fn new<K: Into<String>>(
        positional: impl IntoIterator<Item = Value>,
        named: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Self> {
        Self::construct(DEFAULT_KIND, positional, named, &DEFAULT_SETTINGS)
    }
    /// Builds a fact from positional and named arguments.
    ///
    /// Positional values get the keys `0..n` in order. Named keys are
    /// processed in order: a plain key stores its value (a repeated plain key
    /// keeps the last one), while a compound key such as `address__city`
    /// contributes a [`Constraint::Nested`] that is AND-ed into its base
    /// field `address`. A base given both plainly and through compound keys
    /// is rejected with [`FactError::ConflictingField`].
    ///
    /// Compound keys are split on every non-overlapping occurrence of the
    /// separator, left to right. With `__` this reads `a___b` as base `a` and
    /// path `_b`, while an empty base or segment (`__a`, `a__`, `a____b`) is a
    /// [`FactError::MalformedCompoundKey`].
    pub fn construct<K: Into<String>>(
        kind: impl Into<Arc<str>>,
        positional: impl IntoIterator<Item = Value>,
        named: impl IntoIterator<Item = (K, Value)>,
        settings: &Settings,
    ) -> Result<Self> {
        let mut fields: Vec<(String, Field)> = Vec::new();
        for (key, value) in named {
            let key: String = key.into();
            match shape(&key, &settings.nested_separator)? {
                KeyShape::Plain(name) => {
                    match fields.iter_mut().find(|(n, _)| n.as_str() == name) {
                        Some((_, Field::Composed(_))) => {
                            return Err(FactError::ConflictingField { field: name.to_string() });
                        }
                        Some((_, field)) => *field = Field::Plain(value),
                        None => fields.push((name.to_string(), Field::Plain(value))),
                    }
                }
                KeyShape::Compound { base, path } => {
                    trace!(key = %key, base, "composing compound key");
                    let fragment = Constraint::nested(path, value);
                    match fields.iter_mut().find(|(n, _)| n.as_str() == base) {
                        Some((_, Field::Plain(_))) => {
                            return Err(FactError::ConflictingField { field: base.to_string() });
                        }
                        Some((_, Field::Composed(constraint))) => {
                            let composed = std::mem::replace(constraint, Constraint::Wildcard);
                            *constraint = composed & fragment;
                        }
                        None => fields.push((
                            base.to_string(),
                            Field::Composed(Constraint::Wildcard & fragment),
                        )),
                    }
                }
            }
        }
        let mut fact = Self::empty_of(kind);
        fact.update(
            positional
                .into_iter()
                .enumerate()
                .map(|(i, value)| (Key::Index(i), value))
                .chain(fields.into_iter().map(|(name, field)| (Key::from(name), field.into_value()))),
        )?;
        Ok(fact)
    }
    pub fn from_pairs<K: Into<Key>, V: Into<Value>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        Self::from_pairs_of(DEFAULT_KIND, pairs)
    }
    /// Builds an empty fact and applies [`Fact::update`]; keys are stored as
    /// given, compound keys are not flattened.
    pub fn from_pairs_of<K: Into<Key>, V: Into<Value>>(
        kind: impl Into<Arc<str>>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let mut fact = Self::empty_of(kind);
        fact.update(pairs)?;
        Ok(fact)
    }
    /// Arrays become positional slots, objects become named slots (compound
    /// keys included) and anything else becomes the single positional slot.
    pub fn from_json(kind: impl Into<Arc<str>>, json: serde_json::Value) -> Result<Self> {
        let none = std::iter::empty::<(String, Value)>();
        match json {
            serde_json::Value::Array(items) => {
                Self::construct(kind, items.into_iter().map(Value::from), none, &DEFAULT_SETTINGS)
            }
            serde_json::Value::Object(map) => Self::construct(
                kind,
                std::iter::empty::<Value>(),
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
                &DEFAULT_SETTINGS,
            ),
            other => {
                Self::construct(kind, std::iter::once(Value::from(other)), none, &DEFAULT_SETTINGS)
            }
        }
    }

    // ------------- Mutation -------------
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        self.update([(key.into(), value.into())])
    }
    /// Freezes and stores every pair, or nothing at all: the whole update is
    /// rejected if the fact is declared or any key names a reserved slot.
    pub fn update<K: Into<Key>, V: Into<Value>>(
        &mut self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()> {
        self.ensure_undeclared()?;
        let pairs: Vec<(Key, Value)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some((key, _)) = pairs.iter().find(|(key, _)| Self::is_reserved(key)) {
            return Err(FactError::ReservedSlot { key: key.to_string() });
        }
        for (key, value) in pairs {
            self.store(key, value);
        }
        self.hash.take();
        Ok(())
    }
    fn store(&mut self, key: Key, value: Value) {
        let value = freeze(value);
        match self.slots.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.slots.push((key, value)),
        }
    }
    fn ensure_undeclared(&self) -> Result<()> {
        match self.factid {
            None => Ok(()),
            Some(factid) => {
                warn!(factid, kind = %self.kind, "rejected modification of a declared fact");
                Err(FactError::MutationAfterDeclaration { factid })
            }
        }
    }

    // ------------- Reserved slots -------------
    pub fn bind(&self) -> Option<&str> {
        self.bind.as_deref()
    }
    pub fn set_bind(&mut self, name: impl Into<Arc<str>>) -> Result<()> {
        self.ensure_undeclared()?;
        self.bind = Some(name.into());
        self.hash.take();
        Ok(())
    }
    pub fn identity(&self) -> Option<FactId> {
        self.factid
    }
    /// Binds the identity assigned by the owning engine. This locks the fact:
    /// every later modification, including of the identity itself, fails with
    /// [`FactError::MutationAfterDeclaration`].
    pub fn set_identity(&mut self, factid: FactId) -> Result<()> {
        self.ensure_undeclared()?;
        self.factid = Some(factid);
        self.hash.take();
        debug!(factid, kind = %self.kind, "fact declared");
        Ok(())
    }
    pub fn is_declared(&self) -> bool {
        self.factid.is_some()
    }

    // ------------- Access -------------
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.slots.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.slots
            .iter()
            .find(|(k, _)| k.name() == Some(name))
            .map(|(_, v)| v)
    }
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.slots
            .iter()
            .find(|(k, _)| k.index() == Some(index))
            .map(|(_, v)| v)
    }
    pub fn slots(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.slots.iter().map(|(k, v)| (k, v))
    }
    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.slots
            .iter()
            .filter(|(k, _)| k.index().is_some())
            .map(|(_, v)| v)
    }
    /// Named slots in insertion order, special names left out.
    pub fn named(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().filter_map(|(k, v)| match k.name() {
            Some(name) if !Self::is_special_name(name) => Some((name, v)),
            _ => None,
        })
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    /// A new, undeclared fact of the same kind holding the positional and
    /// plain named slots of this one. Bind and identity are not carried over.
    pub fn copy(&self) -> Fact {
        let positional = self
            .positional()
            .cloned()
            .enumerate()
            .map(|(i, value)| (Key::Index(i), value));
        let named = self
            .named()
            .map(|(name, value)| (Key::from(name), value.clone()));
        Fact {
            slots: positional.chain(named).collect(),
            ..Self::empty_of(Arc::clone(&self.kind))
        }
    }
    /// True when any slot holds a constraint, i.e. the matcher has to
    /// evaluate field constraints instead of comparing values.
    pub fn has_field_constraints(&self) -> bool {
        self.slots
            .iter()
            .any(|(_, value)| matches!(value, Value::Constraint(_)))
    }
    pub fn is_special(key: &Key) -> bool {
        key.name().is_some_and(Self::is_special_name)
    }
    pub fn is_special_name(name: &str) -> bool {
        SPECIAL_NAME.is_match(name)
    }
    fn is_reserved(key: &Key) -> bool {
        matches!(key.name(), Some(BIND_SLOT) | Some(FACTID_SLOT))
    }

    // ------------- Hashing -------------
    /// The structural hash, computed on first request and cached.
    ///
    /// Hashing an undeclared fact is allowed; any later modification clears
    /// the cached value. Fails with [`FactError::UnhashableValue`] when a
    /// slot holds something that can't be hashed.
    pub fn try_hash(&self) -> Result<u64> {
        if let Some(hash) = self.hash.get() {
            return Ok(*hash);
        }
        let hash = self.compute_hash()?;
        Ok(*self.hash.get_or_init(|| hash))
    }
    fn compute_hash(&self) -> Result<u64> {
        let mut reserved: Vec<(Key, Value)> = Vec::new();
        if let Some(bind) = &self.bind {
            reserved.push((Key::from(BIND_SLOT), Value::Str(Arc::clone(bind))));
        }
        if let Some(factid) = self.factid {
            // the bit pattern only feeds the hash
            reserved.push((Key::from(FACTID_SLOT), Value::Int(factid as i64)));
        }
        let digest = unordered_digest(self.slots.iter().chain(reserved.iter()).map(|(key, value)| {
            let mut hasher = SeaHasher::new();
            key.hash(&mut hasher);
            value.feed(&mut hasher)?;
            Ok(hasher.finish())
        }))?;
        let mut hasher = SeaHasher::new();
        self.kind.hash(&mut hasher);
        digest.hash(&mut hasher);
        Ok(hasher.finish())
    }
}

impl Default for Fact {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.bind == other.bind
            && self.factid == other.factid
            && self.slots.len() == other.slots.len()
            && self.slots.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}
impl Eq for Fact {}

/// # Panics
/// Panics when a slot holds an unhashable value. Use [`Fact::try_hash`] to
/// get the error instead.
impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.try_hash() {
            Ok(hash) => state.write_u64(hash),
            Err(e) => panic!("{}", e),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.factid {
            None => write!(f, "<Undeclared Fact> {:?}", self),
            Some(factid) => write!(f, "<f-{}>", factid),
        }
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        let visible = self.slots.iter().filter(|(key, _)| !Self::is_special(key));
        for (i, (key, value)) in visible.enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match key {
                Key::Index(_) => write!(f, "{}", value)?,
                Key::Name(name) => write!(f, "{}={}", name, value)?,
            }
        }
        write!(f, ")")
    }
}

// ------------- FactBuilder -------------
#[derive(Debug, Clone)]
pub struct FactBuilder {
    kind: Arc<str>,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    settings: Option<Settings>,
}
impl FactBuilder {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            positional: Vec::new(),
            named: Vec::new(),
            settings: None,
        }
    }
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((key.into(), value.into()));
        self
    }
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
    pub fn build(self) -> Result<Fact> {
        let settings = self.settings.as_ref().unwrap_or(&*DEFAULT_SETTINGS);
        Fact::construct(self.kind, self.positional, self.named, settings)
    }
}
