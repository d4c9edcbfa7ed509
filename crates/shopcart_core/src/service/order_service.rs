//! Order use-case service.
//!
//! # Responsibility
//! - Assemble an order header with its lines for detail views.
//! - Change order status and remove whole orders atomically.

use crate::model::order::{OrderDetail, OrderDetailColumn, OrderDetailRelation, OrderHeader, OrderStatus};
use crate::repo::entity::EntityId;
use crate::repo::filter::Filter;
use crate::repo::include::Includes;
use crate::repo::repository::Repository;
use crate::repo::unit_of_work::UnitOfWork;
use crate::service::error::{ServiceError, ServiceResult};
use log::info;

/// Header plus lines of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub header: OrderHeader,
    /// Lines with `product` eager-loaded.
    pub lines: Vec<OrderDetail>,
}

impl OrderView {
    pub fn lines_total(&self) -> f64 {
        self.lines.iter().map(OrderDetail::line_total).sum()
    }
}

pub struct OrderService<'uow, U: UnitOfWork> {
    uow: &'uow U,
}

impl<'uow, U: UnitOfWork> OrderService<'uow, U> {
    pub fn new(uow: &'uow U) -> Self {
        Self { uow }
    }

    /// Loads order `id` with its lines.
    ///
    /// # Errors
    /// - `ServiceError::NotFound` when no header has this id.
    pub fn order_details(&self, id: EntityId) -> ServiceResult<OrderView> {
        let header = self.require(id)?;
        let lines = self.uow.order_detail().get_all(
            Some(Filter::eq(OrderDetailColumn::OrderHeaderId, id)),
            Includes::of([OrderDetailRelation::Product]),
        )?;
        Ok(OrderView { header, lines })
    }

    pub fn update_status(&self, id: EntityId, status: OrderStatus) -> ServiceResult<()> {
        let mut header = self.require(id)?;
        if header.order_status == status {
            return Ok(());
        }
        header.order_status = status;
        self.uow.order_header().update(&header)?;
        self.uow.save()?;
        info!(
            "event=order_status module=service status=ok id={id} order_status={}",
            status.as_str()
        );
        Ok(())
    }

    /// Deletes the header and all of its lines in one commit.
    pub fn delete_order(&self, id: EntityId) -> ServiceResult<()> {
        let header = self.require(id)?;
        let lines = self.uow.order_detail().get_all(
            Some(Filter::eq(OrderDetailColumn::OrderHeaderId, id)),
            Includes::none(),
        )?;
        self.uow.order_header().delete(&header)?;
        self.uow.order_detail().delete_range(&lines)?;
        self.uow.save()?;
        info!(
            "event=order_delete module=service status=ok id={id} lines={}",
            lines.len()
        );
        Ok(())
    }

    fn require(&self, id: EntityId) -> ServiceResult<OrderHeader> {
        self.uow
            .order_header()
            .get_first_or_default(Filter::by_id(id), Includes::none())?
            .ok_or(ServiceError::NotFound { entity: "order", id })
    }
}
