//! Catalog product.

use crate::model::category::Category;
use crate::repo::context::RelationLoader;
use crate::repo::entity::{Affinity, Column, Entity, EntityId, Relation};
use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price; must not be negative.
    pub price: f64,
    pub category_id: EntityId,
    /// Populated by `ProductRelation::Category`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64, category_id: EntityId) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            price,
            category_id,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductColumn {
    Id,
    Name,
    Description,
    Price,
    CategoryId,
}

impl Column for ProductColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::CategoryId => "category_id",
        }
    }

    fn affinity(self) -> Affinity {
        match self {
            Self::Id | Self::CategoryId => Affinity::Integer,
            Self::Name | Self::Description => Affinity::Text,
            Self::Price => Affinity::Real,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRelation {
    Category,
}

impl Relation for ProductRelation {
    const ALL: &'static [Self] = &[Self::Category];

    fn name(self) -> &'static str {
        match self {
            Self::Category => "Category",
        }
    }
}

impl Entity for Product {
    type Column = ProductColumn;
    type Relation = ProductRelation;

    const TABLE: &'static str = "products";
    const ID: ProductColumn = ProductColumn::Id;
    const COLUMNS: &'static [ProductColumn] = &[
        ProductColumn::Name,
        ProductColumn::Description,
        ProductColumn::Price,
        ProductColumn::CategoryId,
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn value(&self, column: ProductColumn) -> Value {
        match column {
            ProductColumn::Id => Value::Integer(self.id),
            ProductColumn::Name => Value::Text(self.name.clone()),
            ProductColumn::Description => self.description.clone().map_or(Value::Null, Value::Text),
            ProductColumn::Price => Value::Real(self.price),
            ProductColumn::CategoryId => Value::Integer(self.category_id),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            price: row.get("price")?,
            category_id: row.get("category_id")?,
            category: None,
        })
    }

    fn load_relation(
        &mut self,
        relation: ProductRelation,
        loader: &RelationLoader<'_>,
    ) -> RepoResult<()> {
        match relation {
            ProductRelation::Category => self.category = loader.find(self.category_id)?,
        }
        Ok(())
    }
}
