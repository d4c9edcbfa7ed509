//! Catalog category.

use crate::repo::context::RelationLoader;
use crate::repo::entity::{Affinity, Column, Entity, EntityId, NoRelation};
use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    /// Position in catalog listings; lower sorts first.
    pub display_order: i64,
}

impl Category {
    /// Creates an unsaved category.
    pub fn new(name: impl Into<String>, display_order: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            display_order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryColumn {
    Id,
    Name,
    DisplayOrder,
}

impl Column for CategoryColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::DisplayOrder => "display_order",
        }
    }

    fn affinity(self) -> Affinity {
        match self {
            Self::Id | Self::DisplayOrder => Affinity::Integer,
            Self::Name => Affinity::Text,
        }
    }
}

impl Entity for Category {
    type Column = CategoryColumn;
    type Relation = NoRelation;

    const TABLE: &'static str = "categories";
    const ID: CategoryColumn = CategoryColumn::Id;
    const COLUMNS: &'static [CategoryColumn] = &[CategoryColumn::Name, CategoryColumn::DisplayOrder];

    fn id(&self) -> EntityId {
        self.id
    }

    fn value(&self, column: CategoryColumn) -> Value {
        match column {
            CategoryColumn::Id => Value::Integer(self.id),
            CategoryColumn::Name => Value::Text(self.name.clone()),
            CategoryColumn::DisplayOrder => Value::Integer(self.display_order),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            display_order: row.get("display_order")?,
        })
    }

    fn load_relation(&mut self, relation: NoRelation, _loader: &RelationLoader<'_>) -> RepoResult<()> {
        match relation {}
    }
}
