//! Filter predicates over one entity type.
//!
//! # Responsibility
//! - Give callers a first-class predicate value for repository reads.
//! - Push translatable conditions down into SQL and evaluate the rest in
//!   process.
//!
//! # Invariants
//! - Both evaluation paths follow SQL three-valued logic: a comparison with
//!   NULL is unknown, and only rows whose filter is `true` are returned.
//! - Comparison operands are coerced to the column affinity on both paths.
//! - Closure predicates are opaque; they are never inspected.

use crate::repo::entity::{Column, Entity, EntityId};
use rusqlite::types::Value;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::ops::Not;

/// Comparison operator of a column condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Boolean condition over an entity of type `E`.
pub enum Filter<E: Entity> {
    Compare {
        column: E::Column,
        op: CmpOp,
        value: Value,
    },
    IsNull(E::Column),
    In {
        column: E::Column,
        values: Vec<Value>,
    },
    And(Box<Filter<E>>, Box<Filter<E>>),
    Or(Box<Filter<E>>, Box<Filter<E>>),
    Not(Box<Filter<E>>),
    /// Arbitrary Rust predicate, evaluated on materialized rows.
    Predicate(Box<dyn Fn(&E) -> bool>),
}

impl<E: Entity> Filter<E> {
    pub fn compare(column: E::Column, op: CmpOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Eq, value)
    }

    pub fn ne(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Ne, value)
    }

    pub fn lt(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Lt, value)
    }

    pub fn le(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Le, value)
    }

    pub fn gt(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Gt, value)
    }

    pub fn ge(column: E::Column, value: impl Into<Value>) -> Self {
        Self::compare(column, CmpOp::Ge, value)
    }

    pub fn is_null(column: E::Column) -> Self {
        Self::IsNull(column)
    }

    pub fn is_in<V: Into<Value>>(column: E::Column, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches the entity with identity `id`.
    pub fn by_id(id: EntityId) -> Self {
        Self::eq(E::ID, id)
    }

    pub fn predicate(predicate: impl Fn(&E) -> bool + 'static) -> Self {
        Self::Predicate(Box::new(predicate))
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Returns `true` only when the filter evaluates to `true` for `entity`.
    pub fn matches(&self, entity: &E) -> bool {
        self.eval(entity) == Some(true)
    }

    /// Three-valued evaluation; `None` is SQL's unknown.
    fn eval(&self, entity: &E) -> Option<bool> {
        match self {
            Self::Compare { column, op, value } => {
                let operand = column.affinity().coerce(value);
                compare_values(&entity.value(*column), &operand).map(|ordering| op.holds(ordering))
            }
            Self::IsNull(column) => Some(entity.value(*column) == Value::Null),
            Self::In { column, values } => {
                if values.is_empty() {
                    return Some(false);
                }
                let current = entity.value(*column);
                let affinity = column.affinity();
                let mut unknown = false;
                for candidate in values {
                    match compare_values(&current, &affinity.coerce(candidate)) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Self::And(left, right) => match (left.eval(entity), right.eval(entity)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Self::Or(left, right) => match (left.eval(entity), right.eval(entity)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Self::Not(inner) => inner.eval(entity).map(|value| !value),
            Self::Predicate(predicate) => Some(predicate(entity)),
        }
    }

    fn is_translatable(&self) -> bool {
        match self {
            Self::Compare { .. } | Self::IsNull(_) | Self::In { .. } => true,
            Self::And(left, right) | Self::Or(left, right) => {
                left.is_translatable() && right.is_translatable()
            }
            Self::Not(inner) => inner.is_translatable(),
            Self::Predicate(_) => false,
        }
    }

    fn conjuncts<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match self {
            Self::And(left, right) => {
                left.conjuncts(out);
                right.conjuncts(out);
            }
            other => out.push(other),
        }
    }

    /// Appends SQL for a translatable node. Callers check `is_translatable`.
    fn write_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::Compare { column, op, value } => {
                sql.push_str(&format!("{} {} ?", column.name(), op.sql()));
                binds.push(column.affinity().coerce(value));
            }
            Self::IsNull(column) => sql.push_str(&format!("{} IS NULL", column.name())),
            Self::In { column, values } => {
                if values.is_empty() {
                    sql.push('0');
                    return;
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("{} IN ({placeholders})", column.name()));
                let affinity = column.affinity();
                binds.extend(values.iter().map(|value| affinity.coerce(value)));
            }
            Self::And(left, right) | Self::Or(left, right) => {
                let joiner = if matches!(self, Self::And(..)) {
                    " AND "
                } else {
                    " OR "
                };
                sql.push('(');
                left.write_sql(sql, binds);
                sql.push_str(joiner);
                right.write_sql(sql, binds);
                sql.push(')');
            }
            Self::Not(inner) => {
                sql.push_str("NOT (");
                inner.write_sql(sql, binds);
                sql.push(')');
            }
            Self::Predicate(_) => unreachable!("closure predicates are never translated"),
        }
    }

    /// Splits the filter into a SQL `WHERE` body for the translatable
    /// top-level conjuncts and the conjuncts left for in-process evaluation.
    pub(crate) fn plan(&self) -> FilterPlan<'_, E> {
        let mut conjuncts = Vec::new();
        self.conjuncts(&mut conjuncts);

        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        let mut residual = Vec::new();
        for conjunct in conjuncts {
            if conjunct.is_translatable() {
                let mut clause = String::new();
                conjunct.write_sql(&mut clause, &mut binds);
                clauses.push(clause);
            } else {
                residual.push(conjunct);
            }
        }

        FilterPlan {
            where_sql: (!clauses.is_empty()).then(|| clauses.join(" AND ")),
            binds,
            residual,
        }
    }
}

impl<E: Entity> Not for Filter<E> {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl<E: Entity> Debug for Filter<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare { column, op, value } => f
                .debug_struct("Compare")
                .field("column", column)
                .field("op", op)
                .field("value", value)
                .finish(),
            Self::IsNull(column) => f.debug_tuple("IsNull").field(column).finish(),
            Self::In { column, values } => f
                .debug_struct("In")
                .field("column", column)
                .field("values", values)
                .finish(),
            Self::And(left, right) => f.debug_tuple("And").field(left).field(right).finish(),
            Self::Or(left, right) => f.debug_tuple("Or").field(left).field(right).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

pub(crate) struct FilterPlan<'f, E: Entity> {
    pub where_sql: Option<String>,
    pub binds: Vec<Value>,
    pub residual: Vec<&'f Filter<E>>,
}

impl<E: Entity> FilterPlan<'_, E> {
    pub fn accepts(&self, entity: &E) -> bool {
        self.residual.iter().all(|filter| filter.matches(entity))
    }
}

/// Orders two values the way SQLite orders storage classes:
/// NULL is incomparable, numbers < text < blob.
///
/// Operands are expected to be coerced to the column affinity already.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Real(b)) => compare_integer_real(*a, *b),
        (Value::Real(a), Value::Integer(b)) => compare_integer_real(*b, *a).map(Ordering::reverse),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
        _ => Some(storage_rank(left).cmp(&storage_rank(right))),
    }
}

/// Exact INTEGER/REAL comparison; casting the integer to `f64` would
/// collapse neighbours above 2^53.
fn compare_integer_real(integer: i64, real: f64) -> Option<Ordering> {
    // 2^63, the first f64 above `i64::MAX`.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if real.is_nan() {
        return None;
    }
    if real >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if real < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    let whole = real.trunc();
    match integer.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&real),
        ordering => Some(ordering),
    }
}

fn storage_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Integer(_) | Value::Real(_) => 1,
        Value::Text(_) => 2,
        Value::Blob(_) => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_values, Filter};
    use crate::model::category::{Category, CategoryColumn};
    use rusqlite::types::Value;
    use std::cmp::Ordering;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            display_order: id * 10,
        }
    }

    #[test]
    fn compare_values_treats_null_as_unknown() {
        assert_eq!(compare_values(&Value::Null, &Value::Integer(1)), None);
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Real(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_values(&Value::Integer(9), &Value::Text("1".to_string())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn integer_real_comparison_is_exact_beyond_f64_precision() {
        let big = 1_i64 << 53;
        let real = Value::Real(big as f64);
        assert_eq!(
            compare_values(&Value::Integer(big + 1), &real),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare_values(&real, &Value::Integer(big + 1)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Real(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Integer(-3), &Value::Real(-2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&Value::Integer(i64::MAX), &Value::Real(1e19)),
            Some(Ordering::Less)
        );
        assert_eq!(compare_values(&Value::Integer(0), &Value::Real(f64::NAN)), None);
    }

    #[test]
    fn mismatched_operands_follow_column_affinity() {
        let by_text_id = Filter::<Category>::eq(CategoryColumn::Id, "1".to_string());
        assert!(by_text_id.matches(&category(1, "A")));
        assert_eq!(by_text_id.plan().binds, vec![Value::Integer(1)]);

        let by_numeric_name = Filter::<Category>::is_in(CategoryColumn::Name, [5_i64]);
        assert!(by_numeric_name.matches(&category(2, "5")));
        assert_eq!(
            by_numeric_name.plan().binds,
            vec![Value::Text("5".to_string())]
        );
    }

    #[test]
    fn plan_pushes_down_translatable_conjuncts_only() {
        let filter = Filter::<Category>::eq(CategoryColumn::Id, 1)
            .and(Filter::predicate(|c: &Category| c.name.starts_with('A')))
            .and(Filter::ge(CategoryColumn::DisplayOrder, 5));

        let plan = filter.plan();
        assert_eq!(
            plan.where_sql.as_deref(),
            Some("id = ? AND display_order >= ?")
        );
        assert_eq!(plan.binds, vec![Value::Integer(1), Value::Integer(5)]);
        assert_eq!(plan.residual.len(), 1);
        assert!(plan.accepts(&category(1, "Apples")));
        assert!(!plan.accepts(&category(1, "Bananas")));
    }

    #[test]
    fn or_containing_closure_is_evaluated_in_process() {
        let filter = Filter::<Category>::eq(CategoryColumn::Id, 1)
            .or(Filter::predicate(|c: &Category| c.name == "B"));

        let plan = filter.plan();
        assert!(plan.where_sql.is_none());
        assert!(plan.accepts(&category(1, "A")));
        assert!(plan.accepts(&category(2, "B")));
        assert!(!plan.accepts(&category(3, "C")));
    }

    #[test]
    fn negated_null_comparison_stays_unknown() {
        let filter = !Filter::<Category>::eq(CategoryColumn::Name, Value::Null);
        assert!(!filter.matches(&category(1, "A")));

        let empty_in = Filter::<Category>::is_in(CategoryColumn::Id, Vec::<i64>::new());
        assert!(!empty_in.matches(&category(1, "A")));
        assert!((!empty_in).matches(&category(1, "A")));
    }

    #[test]
    fn nested_sql_is_parenthesized() {
        let filter = Filter::<Category>::is_in(CategoryColumn::Id, [1_i64, 2])
            .or(!Filter::is_null(CategoryColumn::Name));
        let plan = filter.plan();
        assert_eq!(
            plan.where_sql.as_deref(),
            Some("(id IN (?, ?) OR NOT (name IS NULL))")
        );
        assert_eq!(plan.binds.len(), 2);
    }
}
