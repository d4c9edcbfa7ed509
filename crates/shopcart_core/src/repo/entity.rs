//! Contract every persisted record implements to be served by the generic
//! repository.
//!
//! # Invariants
//! - `id` is `0` until the store assigns it on insert, then never changes.
//! - `COLUMNS` lists every persisted column except the identity, in a
//!   stable order shared by inserts and updates.
//! - Relation fields are not persisted; they are filled by eager loading.

use crate::repo::context::RelationLoader;
use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::Debug;

/// Surrogate identity assigned by the store.
pub type EntityId = i64;

/// Typed column identifier of one entity table.
pub trait Column: Copy + Eq + Debug + 'static {
    fn name(self) -> &'static str;

    /// Type affinity the column is declared with in the schema.
    fn affinity(self) -> Affinity;
}

/// SQLite column type affinity.
///
/// SQLite converts a bound comparison operand to the column's affinity
/// before comparing; [`Affinity::coerce`] applies the same conversion so
/// in-process evaluation sees the value SQLite would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    pub fn coerce(self, value: &Value) -> Value {
        match (self, value) {
            (Self::Integer | Self::Real, Value::Text(text)) => {
                numeric_literal(text).unwrap_or_else(|| value.clone())
            }
            (Self::Text, Value::Integer(number)) => Value::Text(number.to_string()),
            (Self::Text, Value::Real(number)) => Value::Text(real_to_text(*number)),
            _ => value.clone(),
        }
    }
}

/// Parses `text` the way numeric affinity does: only well-formed decimal
/// literals convert; anything else stays text.
fn numeric_literal(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !well_formed {
        return None;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::Integer(integer));
    }
    trimmed.parse::<f64>().ok().map(Value::Real)
}

// Mirrors SQLite's REAL rendering for the common cases: integral values
// keep a trailing `.0`.
fn real_to_text(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{number:.1}")
    } else {
        number.to_string()
    }
}

/// Closed set of relations one entity type can eager-load.
pub trait Relation: Copy + Eq + Debug + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|relation| relation.name() == name)
    }
}

/// Relation set of entities without navigable relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRelation {}

impl Relation for NoRelation {
    const ALL: &'static [Self] = &[];

    fn name(self) -> &'static str {
        match self {}
    }
}

/// A plain record stored in its own table with an integer identity.
pub trait Entity: Clone + Debug + 'static {
    type Column: Column;
    type Relation: Relation;

    /// Backing table name.
    const TABLE: &'static str;
    /// Identity column (`id`).
    const ID: Self::Column;
    /// Persisted non-identity columns.
    const COLUMNS: &'static [Self::Column];

    fn id(&self) -> EntityId;

    /// Current value of `column` as it would be written to the store.
    fn value(&self, column: Self::Column) -> Value;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Populates the field backing `relation`.
    fn load_relation(
        &mut self,
        relation: Self::Relation,
        loader: &RelationLoader<'_>,
    ) -> RepoResult<()>;

    fn is_new(&self) -> bool {
        self.id() == 0
    }
}

pub(crate) fn column_names<E: Entity>() -> Vec<&'static str> {
    E::COLUMNS.iter().map(|column| column.name()).collect()
}

pub(crate) fn column_values<E: Entity>(entity: &E) -> Vec<Value> {
    E::COLUMNS
        .iter()
        .map(|column| entity.value(*column))
        .collect()
}

pub(crate) fn select_sql<E: Entity>() -> String {
    let mut columns = vec![E::ID.name()];
    columns.extend(column_names::<E>());
    format!("SELECT {} FROM {}", columns.join(", "), E::TABLE)
}

#[cfg(test)]
mod tests {
    use super::Affinity;
    use rusqlite::types::Value;

    #[test]
    fn numeric_affinity_converts_only_well_formed_literals() {
        let text = |s: &str| Value::Text(s.to_string());
        assert_eq!(Affinity::Integer.coerce(&text(" 42 ")), Value::Integer(42));
        assert_eq!(Affinity::Real.coerce(&text("2.5")), Value::Real(2.5));
        assert_eq!(Affinity::Integer.coerce(&text("4x")), text("4x"));
        assert_eq!(Affinity::Integer.coerce(&text("inf")), text("inf"));
        assert_eq!(Affinity::Integer.coerce(&Value::Null), Value::Null);
    }

    #[test]
    fn text_affinity_renders_numbers() {
        assert_eq!(
            Affinity::Text.coerce(&Value::Integer(5)),
            Value::Text("5".to_string())
        );
        assert_eq!(
            Affinity::Text.coerce(&Value::Real(5.0)),
            Value::Text("5.0".to_string())
        );
        assert_eq!(
            Affinity::Text.coerce(&Value::Real(2.5)),
            Value::Text("2.5".to_string())
        );
    }
}
