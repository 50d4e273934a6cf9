//! Factum – immutable working-memory facts for forward-chaining rule engines.
//!
//! A [`construct::Fact`] is a single assertable piece of knowledge:
//! * *Positional slots* keyed `0..n` in the order the values were given.
//! * *Named slots* keyed by name, kept in insertion order (the order does not
//!   take part in equality).
//! * Two reserved slots held outside the ordinary ones: a *bind* name used by
//!   the matcher, and the *identity* ([`construct::FactId`]) assigned by the
//!   engine when the fact is declared.
//!
//! Every value is frozen on its way in (see [`datatype::freeze`]), so nothing
//! reachable from a fact can be changed behind its back. Binding the identity
//! is a one-way latch: from then on any modification fails with
//! [`FactError::MutationAfterDeclaration`] and the fact may be shared freely
//! between readers.
//!
//! ## Modules
//! * [`construct`] – The `Fact` record, its builder, identity lock, equality
//!   and cached structural hash.
//! * [`datatype`] – The [`datatype::Value`] model and deep freezing.
//! * [`constraint`] – Field constraints composed from compound keys.
//! * [`settings`] – Configuration read through the `config` crate.
//!
//! ## Compound keys
//! A named key like `address__city` does not create a slot of its own. It
//! becomes a [`constraint::Constraint::Nested`] stored under the base field
//! `address`, and several compound keys sharing one base are AND-ed together.
//! The separator is configurable through [`settings::Settings`].
//!
//! ## Quick Start
//! ```
//! use factum::construct::Fact;
//! use factum::FactError;
//! let mut fact = Fact::builder().arg(1).arg(2).field("color", "red").build().unwrap();
//! assert_eq!(format!("{:?}", fact), "Fact(1, 2, color=\"red\")");
//! fact.set_identity(7).unwrap();
//! assert_eq!(fact.to_string(), "<f-7>");
//! assert!(matches!(
//!     fact.set("color", "blue"),
//!     Err(FactError::MutationAfterDeclaration { factid: 7 })
//! ));
//! ```

pub mod constraint;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod settings;

pub use constraint::Constraint;
pub use construct::{Fact, FactBuilder, FactId, Key};
pub use datatype::{freeze, Opaque, Value};
pub use error::{FactError, Result};
pub use settings::Settings;
