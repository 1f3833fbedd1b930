//! Component identity
//!
//! Every orchestrator, converter, target and scorer carries an `Identifier`.
//! Memory records store it so that a row can be traced back to the component
//! instance that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of one component instance
///
/// The `id` is a random v4 UUID generated once at construction, so two
/// instances never share an id, even when created back to back. There is no
/// registry or counter behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub id: String,

    #[serde(rename = "__type__")]
    pub type_name: String,

    #[serde(rename = "__module__")]
    pub module_path: String,
}

impl Identifier {
    /// Create an identifier for an instance of `T` with a fresh random id
    pub fn of<T: ?Sized>() -> Self {
        let (module_path, type_name) = split_type_name(std::any::type_name::<T>());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            type_name: type_name.to_string(),
            module_path: module_path.to_string(),
        }
    }

    /// Create an identifier from explicit parts
    pub fn new(
        id: impl Into<String>,
        type_name: impl Into<String>,
        module_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            module_path: module_path.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.module_path, self.type_name, self.id)
    }
}

/// Split `a::b::Type<x::Y>` into (`a::b`, `Type<x::Y>`), ignoring generic arguments
fn split_type_name(full: &str) -> (&str, &str) {
    let head = match full.find('<') {
        Some(pos) => &full[..pos],
        None => full,
    };
    match head.rfind("::") {
        Some(pos) => (&full[..pos], &full[pos + 2..]),
        None => ("", full),
    }
}
