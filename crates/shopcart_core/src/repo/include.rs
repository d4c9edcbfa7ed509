//! Eager-loading directives.
//!
//! `Includes` is a de-duplicated, ordered set of typed relations. The
//! comma-delimited form (`"Category,Product"`) is still accepted through
//! [`Includes::parse`] for callers that carry relation lists as text.

use crate::repo::entity::Relation;
use crate::repo::error::{RepoError, RepoResult};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Includes<R: Relation> {
    relations: Vec<R>,
}

impl<R: Relation> Includes<R> {
    /// No eager loading.
    pub fn none() -> Self {
        Self {
            relations: Vec::new(),
        }
    }

    pub fn of(relations: impl IntoIterator<Item = R>) -> Self {
        relations.into_iter().fold(Self::none(), Self::with)
    }

    pub fn with(mut self, relation: R) -> Self {
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
        self
    }

    /// Parses a comma-separated relation list.
    ///
    /// Segments are trimmed and empty segments are ignored, so `""` and
    /// `",,"` both mean no eager loading.
    ///
    /// # Errors
    /// - `RepoError::UnknownRelation` when a segment names no relation of `R`.
    pub fn parse(list: &str) -> RepoResult<Self> {
        let mut includes = Self::none();
        for segment in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let relation = R::from_name(segment).ok_or_else(|| RepoError::UnknownRelation {
                name: segment.to_string(),
                expected: R::ALL.iter().map(|relation| relation.name()).collect(),
            })?;
            includes = includes.with(relation);
        }
        Ok(includes)
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = R> + '_ {
        self.relations.iter().copied()
    }
}

impl<R: Relation> Default for Includes<R> {
    fn default() -> Self {
        Self::none()
    }
}

impl<R: Relation> FromStr for Includes<R> {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::Includes;
    use crate::model::order::OrderDetailRelation;
    use crate::repo::error::RepoError;

    #[test]
    fn parse_skips_empty_segments_and_deduplicates() {
        let includes =
            Includes::<OrderDetailRelation>::parse(" Product,,OrderHeader , Product,").unwrap();
        assert_eq!(
            includes.iter().collect::<Vec<_>>(),
            vec![OrderDetailRelation::Product, OrderDetailRelation::OrderHeader]
        );
    }

    #[test]
    fn empty_list_means_no_inclusion() {
        assert!(Includes::<OrderDetailRelation>::parse("").unwrap().is_empty());
        assert!(Includes::<OrderDetailRelation>::parse(" , ").unwrap().is_empty());
    }

    #[test]
    fn unknown_relation_lists_valid_names() {
        let err = "Prodcut"
            .parse::<Includes<OrderDetailRelation>>()
            .expect_err("typo must be rejected");
        match err {
            RepoError::UnknownRelation { name, expected } => {
                assert_eq!(name, "Prodcut");
                assert_eq!(expected, vec!["OrderHeader", "Product"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
