//! Field constraints stored in facts built from compound keys.
//!
//! A fact only *composes* constraints: `address__city="Paris"` becomes a
//! [`Constraint::Nested`] stored under `address`, and further compound keys
//! sharing that base are joined with `&`. Interpreting them is left to the
//! matcher.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::BitAnd;
use std::sync::Arc;

use seahash::SeaHasher;

use crate::datatype::{freeze, same_members, unordered_digest, Value};
use crate::error::Result;

#[derive(Clone, Debug)]
pub enum Constraint {
    /// Matches any field value.
    Wildcard,
    /// The value found by following `path` into the field equals `value`.
    Nested { path: Arc<[String]>, value: Box<Value> },
    /// All members hold. Member order is kept for display only; freezing
    /// flattens nested `And`s and drops wildcards.
    And(Arc<[Constraint]>),
}

impl Constraint {
    pub fn nested<S: Into<String>>(
        path: impl IntoIterator<Item = S>,
        value: impl Into<Value>,
    ) -> Self {
        Constraint::Nested {
            path: path.into_iter().map(Into::into).collect(),
            value: Box::new(freeze(value.into())),
        }
    }
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Constraint::Wildcard)
    }
    /// The conjuncts of this constraint; a non-`And` constraint is its own only member.
    pub fn members(&self) -> &[Constraint] {
        match self {
            Constraint::And(members) => members,
            other => std::slice::from_ref(other),
        }
    }
    pub(crate) fn is_frozen(&self) -> bool {
        match self {
            Constraint::Wildcard => true,
            Constraint::Nested { value, .. } => value.is_frozen(),
            // canonical Ands are flat, wildcard-free and have at least two members
            Constraint::And(members) => {
                members.len() >= 2
                    && members.iter().all(|member| {
                        matches!(member, Constraint::Nested { .. }) && member.is_frozen()
                    })
            }
        }
    }
    pub(crate) fn frozen(self) -> Self {
        match self {
            Constraint::Wildcard => Constraint::Wildcard,
            Constraint::Nested { path, value } => Constraint::Nested {
                path,
                value: Box::new(freeze(*value)),
            },
            Constraint::And(members) => members
                .iter()
                .cloned()
                .map(Constraint::frozen)
                .fold(Constraint::Wildcard, |conjunction, member| conjunction & member),
        }
    }
    pub(crate) fn feed<H: Hasher>(&self, state: &mut H) -> Result<()> {
        match self {
            Constraint::Wildcard => 0u8.hash(state),
            Constraint::Nested { path, value } => {
                1u8.hash(state);
                path.hash(state);
                value.feed(state)?;
            }
            Constraint::And(members) => {
                2u8.hash(state);
                unordered_digest(members.iter().map(|member| {
                    let mut hasher = SeaHasher::new();
                    member.feed(&mut hasher)?;
                    Ok(hasher.finish())
                }))?
                .hash(state);
            }
        }
        Ok(())
    }
}

impl BitAnd for Constraint {
    type Output = Constraint;
    fn bitand(self, rhs: Constraint) -> Constraint {
        match (self, rhs) {
            (Constraint::Wildcard, c) | (c, Constraint::Wildcard) => c,
            (lhs, rhs) => Constraint::And(
                lhs.members()
                    .iter()
                    .chain(rhs.members())
                    .cloned()
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Wildcard, Constraint::Wildcard) => true,
            (
                Constraint::Nested { path, value },
                Constraint::Nested { path: other_path, value: other_value },
            ) => path == other_path && value == other_value,
            (Constraint::And(a), Constraint::And(b)) => same_members(a, b),
            _ => false,
        }
    }
}
impl Eq for Constraint {}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constraint::Wildcard => write!(f, "*"),
            Constraint::Nested { path, value } => write!(f, "{} == {}", path.join("."), value),
            Constraint::And(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
        }
    }
}
