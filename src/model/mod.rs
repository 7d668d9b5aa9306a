//! # Property Graph Model
//!
//! The two entity types flowing through the pipeline, plus their values.
//! Adapters build these, every stage consumes and re-emits them, the
//! store hands them back from queries.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod node;
pub mod relation;
pub mod value;
pub mod property_map;

pub use node::{Grounding, Labels, Node, BIO_ENTITY};
pub use relation::{Direction, Relation};
pub use value::Value;
pub use property_map::{merge_missing, props, PropertyMap};
