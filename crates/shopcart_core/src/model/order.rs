//! Order header and order line records.
//!
//! # Invariants
//! - Every `OrderDetail` belongs to exactly one `OrderHeader`.
//! - `OrderDetail::count` is positive; the store enforces it with a CHECK.

use crate::model::product::Product;
use crate::repo::context::RelationLoader;
use crate::repo::entity::{Affinity, Column, Entity, EntityId, Relation};
use crate::repo::error::RepoResult;
use crate::repo::filter::Filter;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Order lifecycle state, persisted as snake_case text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "shipped" => Some(Self::Shipped),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid order status `{text}`").into()))
    }
}

impl From<OrderStatus> for Value {
    fn from(value: OrderStatus) -> Self {
        Value::Text(value.as_str().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: EntityId,
    /// Customer name.
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Unix epoch milliseconds.
    pub order_date: i64,
    pub order_total: f64,
    pub order_status: OrderStatus,
    /// Populated by `OrderHeaderRelation::Details`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<OrderDetail>>,
}

impl OrderHeader {
    pub fn new(name: impl Into<String>, order_date: i64) -> Self {
        Self {
            name: name.into(),
            order_date,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderHeaderColumn {
    Id,
    Name,
    Phone,
    Address,
    OrderDate,
    OrderTotal,
    OrderStatus,
}

impl Column for OrderHeaderColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::OrderDate => "order_date",
            Self::OrderTotal => "order_total",
            Self::OrderStatus => "order_status",
        }
    }

    fn affinity(self) -> Affinity {
        match self {
            Self::Id | Self::OrderDate => Affinity::Integer,
            Self::OrderTotal => Affinity::Real,
            Self::Name | Self::Phone | Self::Address | Self::OrderStatus => Affinity::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderHeaderRelation {
    /// All lines of the order, ascending by id.
    Details,
}

impl Relation for OrderHeaderRelation {
    const ALL: &'static [Self] = &[Self::Details];

    fn name(self) -> &'static str {
        match self {
            Self::Details => "Details",
        }
    }
}

impl Entity for OrderHeader {
    type Column = OrderHeaderColumn;
    type Relation = OrderHeaderRelation;

    const TABLE: &'static str = "order_headers";
    const ID: OrderHeaderColumn = OrderHeaderColumn::Id;
    const COLUMNS: &'static [OrderHeaderColumn] = &[
        OrderHeaderColumn::Name,
        OrderHeaderColumn::Phone,
        OrderHeaderColumn::Address,
        OrderHeaderColumn::OrderDate,
        OrderHeaderColumn::OrderTotal,
        OrderHeaderColumn::OrderStatus,
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn value(&self, column: OrderHeaderColumn) -> Value {
        match column {
            OrderHeaderColumn::Id => Value::Integer(self.id),
            OrderHeaderColumn::Name => Value::Text(self.name.clone()),
            OrderHeaderColumn::Phone => self.phone.clone().map_or(Value::Null, Value::Text),
            OrderHeaderColumn::Address => self.address.clone().map_or(Value::Null, Value::Text),
            OrderHeaderColumn::OrderDate => Value::Integer(self.order_date),
            OrderHeaderColumn::OrderTotal => Value::Real(self.order_total),
            OrderHeaderColumn::OrderStatus => self.order_status.into(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            address: row.get("address")?,
            order_date: row.get("order_date")?,
            order_total: row.get("order_total")?,
            order_status: row.get("order_status")?,
            details: None,
        })
    }

    fn load_relation(
        &mut self,
        relation: OrderHeaderRelation,
        loader: &RelationLoader<'_>,
    ) -> RepoResult<()> {
        match relation {
            OrderHeaderRelation::Details => {
                let lines = loader.list(Filter::eq(OrderDetailColumn::OrderHeaderId, self.id))?;
                self.details = Some(lines);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: EntityId,
    pub order_header_id: EntityId,
    pub product_id: EntityId,
    pub count: i64,
    /// Unit price captured when the order was placed.
    pub price: f64,
    /// Populated by `OrderDetailRelation::OrderHeader`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_header: Option<OrderHeader>,
    /// Populated by `OrderDetailRelation::Product`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

impl OrderDetail {
    pub fn new(order_header_id: EntityId, product_id: EntityId, count: i64, price: f64) -> Self {
        Self {
            order_header_id,
            product_id,
            count,
            price,
            ..Self::default()
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * self.count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDetailColumn {
    Id,
    OrderHeaderId,
    ProductId,
    Count,
    Price,
}

impl Column for OrderDetailColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::OrderHeaderId => "order_header_id",
            Self::ProductId => "product_id",
            Self::Count => "count",
            Self::Price => "price",
        }
    }

    fn affinity(self) -> Affinity {
        match self {
            Self::Id | Self::OrderHeaderId | Self::ProductId | Self::Count => Affinity::Integer,
            Self::Price => Affinity::Real,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDetailRelation {
    OrderHeader,
    Product,
}

impl Relation for OrderDetailRelation {
    const ALL: &'static [Self] = &[Self::OrderHeader, Self::Product];

    fn name(self) -> &'static str {
        match self {
            Self::OrderHeader => "OrderHeader",
            Self::Product => "Product",
        }
    }
}

impl Entity for OrderDetail {
    type Column = OrderDetailColumn;
    type Relation = OrderDetailRelation;

    const TABLE: &'static str = "order_details";
    const ID: OrderDetailColumn = OrderDetailColumn::Id;
    const COLUMNS: &'static [OrderDetailColumn] = &[
        OrderDetailColumn::OrderHeaderId,
        OrderDetailColumn::ProductId,
        OrderDetailColumn::Count,
        OrderDetailColumn::Price,
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn value(&self, column: OrderDetailColumn) -> Value {
        match column {
            OrderDetailColumn::Id => Value::Integer(self.id),
            OrderDetailColumn::OrderHeaderId => Value::Integer(self.order_header_id),
            OrderDetailColumn::ProductId => Value::Integer(self.product_id),
            OrderDetailColumn::Count => Value::Integer(self.count),
            OrderDetailColumn::Price => Value::Real(self.price),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            order_header_id: row.get("order_header_id")?,
            product_id: row.get("product_id")?,
            count: row.get("count")?,
            price: row.get("price")?,
            order_header: None,
            product: None,
        })
    }

    fn load_relation(
        &mut self,
        relation: OrderDetailRelation,
        loader: &RelationLoader<'_>,
    ) -> RepoResult<()> {
        match relation {
            OrderDetailRelation::OrderHeader => {
                self.order_header = loader.find(self.order_header_id)?;
            }
            OrderDetailRelation::Product => self.product = loader.find(self.product_id)?,
        }
        Ok(())
    }
}
