//! Property registry administration.

use super::store::PropertyStore;
use crate::models::{CreateProperty, Property, PropertyType, PropertyUser, RelationType};
use anyhow::anyhow;
use chrono::NaiveDate;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct PropertyService {
    store: Arc<dyn PropertyStore>,
}

impl PropertyService {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Property>, AppError> {
        self.store.list_properties().await
    }

    /// Register a plot. Blocks are stored upper-case so "a" and "A" are the same block.
    #[instrument(skip(self, input), fields(block = %input.block, number = input.number))]
    pub async fn create(&self, mut input: CreateProperty) -> Result<Property, AppError> {
        input.block = normalize_block(&input.block)?;
        if input.number <= 0 {
            return Err(AppError::BadRequest(anyhow!(
                "number must be a positive integer"
            )));
        }
        let property = self.store.create_property(&input).await?;
        info!(property_id = %property.property_id, "Property registered");
        Ok(property)
    }

    #[instrument(skip(self))]
    pub async fn update_type(
        &self,
        property_id: Uuid,
        property_type: PropertyType,
    ) -> Result<Property, AppError> {
        self.store
            .update_property_type(property_id, property_type)
            .await?
            .ok_or_else(|| not_found(property_id))
    }

    /// Set or clear the handover date.
    #[instrument(skip(self))]
    pub async fn update_bast_date(
        &self,
        property_id: Uuid,
        bast_date: Option<NaiveDate>,
    ) -> Result<Property, AppError> {
        self.store
            .update_bast_date(property_id, bast_date)
            .await?
            .ok_or_else(|| not_found(property_id))
    }

    #[instrument(skip(self))]
    pub async fn update_owner(
        &self,
        property_id: Uuid,
        owner_id: Option<Uuid>,
    ) -> Result<Property, AppError> {
        self.store
            .update_owner(property_id, owner_id)
            .await?
            .ok_or_else(|| not_found(property_id))
    }

    pub async fn search(&self, block: &str, number: i32) -> Result<Property, AppError> {
        self.store
            .find_by_block_number(block.trim(), number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow!("Property Blok {} No. {} not found", block, number))
            })
    }

    pub async fn owned_by(&self, user_id: Uuid) -> Result<Vec<Property>, AppError> {
        self.store.list_owned_by(user_id).await
    }

    pub async fn users(&self, property_id: Uuid) -> Result<Vec<PropertyUser>, AppError> {
        self.ensure_exists(property_id).await?;
        self.store.list_property_users(property_id).await
    }

    /// Link a resident to a property. A user holds at most one link per property.
    #[instrument(skip(self))]
    pub async fn link_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
        relation_type: RelationType,
    ) -> Result<PropertyUser, AppError> {
        self.ensure_exists(property_id).await?;
        let link = self
            .store
            .add_property_user(property_id, user_id, relation_type)
            .await?;
        info!(link_id = %link.link_id, relation = relation_type.as_str(), "User linked to property");
        Ok(link)
    }

    #[instrument(skip(self))]
    pub async fn update_link(
        &self,
        link_id: Uuid,
        relation_type: RelationType,
    ) -> Result<PropertyUser, AppError> {
        self.store
            .update_property_user(link_id, relation_type)
            .await?
            .ok_or_else(|| link_not_found(link_id))
    }

    #[instrument(skip(self))]
    pub async fn unlink(&self, link_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_property_user(link_id).await? {
            return Err(link_not_found(link_id));
        }
        info!("User unlinked from property");
        Ok(())
    }

    async fn ensure_exists(&self, property_id: Uuid) -> Result<(), AppError> {
        match self.store.find_property(property_id).await? {
            Some(_) => Ok(()),
            None => Err(not_found(property_id)),
        }
    }
}

fn link_not_found(link_id: Uuid) -> AppError {
    AppError::NotFound(anyhow!("Property user link {} not found", link_id))
}

fn normalize_block(block: &str) -> Result<String, AppError> {
    let block = block.trim();
    if block.is_empty() || !block.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(anyhow!(
            "block must be one or more letters, got '{}'",
            block
        )));
    }
    Ok(block.to_ascii_uppercase())
}

fn not_found(property_id: Uuid) -> AppError {
    AppError::NotFound(anyhow!("Property {} not found", property_id))
}
