//! Category use-case service.
//!
//! # Responsibility
//! - List, fetch, create-or-update and delete catalog categories.
//!
//! # Invariants
//! - `id == 0` creates; any other id updates the fetched, tracked row.
//! - Every successful write ends with exactly one `save`.

use crate::model::category::{Category, CategoryColumn};
use crate::repo::entity::{Entity, EntityId};
use crate::repo::filter::Filter;
use crate::repo::include::Includes;
use crate::repo::repository::Repository;
use crate::repo::unit_of_work::UnitOfWork;
use crate::service::error::{ServiceError, ServiceResult};
use log::info;

const CATEGORY_NAME_MAX_CHARS: usize = 100;

pub struct CategoryService<'uow, U: UnitOfWork> {
    uow: &'uow U,
}

impl<'uow, U: UnitOfWork> CategoryService<'uow, U> {
    pub fn new(uow: &'uow U) -> Self {
        Self { uow }
    }

    /// All categories ordered by `display_order`, then id.
    pub fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        let mut categories = self.uow.category().get_all(None, Includes::none())?;
        categories.sort_by_key(|category| (category.display_order, category.id));
        Ok(categories)
    }

    pub fn find_category(&self, id: EntityId) -> ServiceResult<Option<Category>> {
        Ok(self
            .uow
            .category()
            .get_first_or_default(Filter::by_id(id), Includes::none())?)
    }

    pub fn find_by_name(&self, name: &str) -> ServiceResult<Option<Category>> {
        Ok(self.uow.category().get_first_or_default(
            Filter::eq(CategoryColumn::Name, name.trim().to_string()),
            Includes::none(),
        )?)
    }

    /// Creates `input` when it is new, otherwise overwrites the stored row.
    ///
    /// # Errors
    /// - `ServiceError::Validation` for an empty or overlong name.
    /// - `ServiceError::NotFound` when updating an id that does not exist.
    pub fn save_category(&self, input: &Category) -> ServiceResult<()> {
        let name = validate_name(&input.name)?;

        if input.is_new() {
            let category = Category::new(name, input.display_order);
            self.uow.category().add(&category)?;
        } else {
            let mut stored = self.require(input.id)?;
            stored.name = name;
            stored.display_order = input.display_order;
            self.uow.category().update(&stored)?;
        }

        self.uow.save()?;
        info!(
            "event=category_save module=service status=ok mode={}",
            if input.is_new() { "create" } else { "update" }
        );
        Ok(())
    }

    pub fn delete_category(&self, id: EntityId) -> ServiceResult<()> {
        let category = self.require(id)?;
        self.uow.category().delete(&category)?;
        self.uow.save()?;
        info!("event=category_delete module=service status=ok id={id}");
        Ok(())
    }

    fn require(&self, id: EntityId) -> ServiceResult<Category> {
        self.find_category(id)?.ok_or(ServiceError::NotFound {
            entity: "category",
            id,
        })
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(
            "category name cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > CATEGORY_NAME_MAX_CHARS {
        return Err(ServiceError::Validation(format!(
            "category name exceeds {CATEGORY_NAME_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}
