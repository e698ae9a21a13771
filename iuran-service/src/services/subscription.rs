//! Optional tariff components (e.g. water, security) and property subscriptions to them.
//!
//! A subscription moves through `pending -> active | rejected` on admin review and
//! `active -> inactive` when it ends. Every transition is a conditional write, so two
//! admins deciding the same request cannot both succeed.

use super::metrics::{record_error, record_subscription_operation};
use super::store::{ComponentStore, PropertyStore};
use super::tariff::{resolve_component_rate, validate_rate_window};
use crate::models::{
    ComponentInput, ComponentRate, ComponentSubscription, NewSubscription, Property, RateInput,
    SubscriptionStatus, TariffComponent,
};
use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ComponentDetail {
    #[serde(flatten)]
    pub component: TariffComponent,
    pub rates: Vec<ComponentRate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub component_id: Uuid,
    pub component_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCost {
    pub total_cost: Decimal,
    pub breakdown: Vec<CostLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Assign,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOutcome {
    Assigned,
    Reactivated,
    AlreadyActive,
    Removed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDetail {
    pub property_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BulkOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub success: bool,
    pub processed: usize,
    pub details: Vec<BulkDetail>,
}

#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub property_ids: Vec<Uuid>,
    pub component_id: Uuid,
    pub action: BulkAction,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct SubscriptionService {
    properties: Arc<dyn PropertyStore>,
    components: Arc<dyn ComponentStore>,
}

impl SubscriptionService {
    pub fn new(properties: Arc<dyn PropertyStore>, components: Arc<dyn ComponentStore>) -> Self {
        Self {
            properties,
            components,
        }
    }

    pub async fn list_components(&self, active_only: bool) -> Result<Vec<TariffComponent>, AppError> {
        self.components.list_components(active_only).await
    }

    pub async fn component_detail(&self, component_id: Uuid) -> Result<ComponentDetail, AppError> {
        let component = self.find_component(component_id).await?;
        let rates = self.components.list_rates(component_id).await?;
        Ok(ComponentDetail { component, rates })
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_component(&self, input: ComponentInput) -> Result<TariffComponent, AppError> {
        validate_component(&input)?;
        let component = self.components.create_component(&input).await?;
        record_subscription_operation("component_create");
        info!(component_id = %component.component_id, "Component created");
        Ok(component)
    }

    #[instrument(skip(self, input))]
    pub async fn update_component(
        &self,
        component_id: Uuid,
        input: ComponentInput,
    ) -> Result<TariffComponent, AppError> {
        validate_component(&input)?;
        self.components
            .update_component(component_id, &input)
            .await?
            .ok_or_else(|| component_not_found(component_id))
    }

    #[instrument(skip(self, input), fields(amount = %input.amount))]
    pub async fn add_rate(
        &self,
        component_id: Uuid,
        input: RateInput,
    ) -> Result<ComponentRate, AppError> {
        validate_rate_window(input.amount, input.valid_from, input.valid_to)?;
        self.find_component(component_id).await?;
        let rate = self.components.create_rate(component_id, &input).await?;
        info!(rate_id = %rate.rate_id, "Component rate added");
        Ok(rate)
    }

    #[instrument(skip(self, input))]
    pub async fn update_rate(&self, rate_id: Uuid, input: RateInput) -> Result<ComponentRate, AppError> {
        validate_rate_window(input.amount, input.valid_from, input.valid_to)?;
        self.components
            .update_rate(rate_id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Component rate {} not found", rate_id)))
    }

    /// A resident asks to subscribe a property to a component; an admin decides later.
    #[instrument(skip(self), fields(caller = %caller, property_id = %property_id))]
    pub async fn request(
        &self,
        caller: Uuid,
        property_id: Uuid,
        component_id: Uuid,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<ComponentSubscription, AppError> {
        self.find_property(property_id).await?;
        let component = self.find_component(component_id).await?;
        if !component.is_active {
            return Err(AppError::BadRequest(anyhow!(
                "component '{}' is not available",
                component.name
            )));
        }
        ensure_end_after_start(start_date, end_date)?;

        if let Some(existing) = self
            .components
            .find_subscription_for(property_id, component_id)
            .await?
        {
            if existing.is_active_on(start_date) {
                return Err(AppError::Conflict(anyhow!(
                    "property already subscribes to '{}' on {}",
                    component.name,
                    start_date
                )));
            }
        }

        let subscription = self
            .components
            .create_subscription(&NewSubscription {
                property_id,
                component_id,
                start_date,
                end_date,
                status: SubscriptionStatus::Pending,
                requested_by: caller,
                approved_by: None,
            })
            .await?;
        record_subscription_operation("request");
        info!(subscription_id = %subscription.subscription_id, "Subscription requested");
        Ok(subscription)
    }

    /// End an active subscription: it goes inactive and a pending request carrying the
    /// end date takes its place for admin review.
    #[instrument(skip(self), fields(caller = %caller, subscription_id = %subscription_id))]
    pub async fn request_unsubscription(
        &self,
        caller: Uuid,
        subscription_id: Uuid,
        end_date: NaiveDate,
    ) -> Result<ComponentSubscription, AppError> {
        let subscription = self.find_subscription(subscription_id).await?;
        if subscription.requested_by != Some(caller) {
            return Err(AppError::Forbidden(anyhow!(
                "only the original requester may end this subscription"
            )));
        }
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(anyhow!(
                "subscription is {}, not active",
                subscription.status.as_str()
            )));
        }
        ensure_end_after_start(subscription.start_date, Some(end_date))?;

        let request = self
            .components
            .end_subscription_request(subscription_id, caller, end_date)
            .await?
            .ok_or_else(|| AppError::Conflict(anyhow!("subscription changed concurrently")))?;
        record_subscription_operation("unsubscribe");
        info!(request_id = %request.subscription_id, "Unsubscription requested");
        Ok(request)
    }

    #[instrument(skip(self), fields(admin_id = %admin_id, subscription_id = %subscription_id))]
    pub async fn approve(
        &self,
        admin_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<ComponentSubscription, AppError> {
        let approved = self
            .decide(subscription_id, SubscriptionStatus::Active, admin_id, None)
            .await?;
        record_subscription_operation("approve");
        info!("Subscription approved");
        Ok(approved)
    }

    #[instrument(skip(self, reason), fields(admin_id = %admin_id, subscription_id = %subscription_id))]
    pub async fn reject(
        &self,
        admin_id: Uuid,
        subscription_id: Uuid,
        reason: &str,
    ) -> Result<ComponentSubscription, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::BadRequest(anyhow!(
                "a rejection reason is required"
            )));
        }
        let rejected = self
            .decide(
                subscription_id,
                SubscriptionStatus::Rejected,
                admin_id,
                Some(reason),
            )
            .await?;
        record_subscription_operation("reject");
        info!("Subscription rejected");
        Ok(rejected)
    }

    /// Requests awaiting review, oldest first.
    pub async fn pending(&self) -> Result<Vec<ComponentSubscription>, AppError> {
        self.components
            .list_subscriptions_by_status(SubscriptionStatus::Pending)
            .await
    }

    pub async fn by_property(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        self.components
            .list_subscriptions_for_property(property_id)
            .await
    }

    pub async fn active_on(
        &self,
        property_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        Ok(self
            .by_property(property_id)
            .await?
            .into_iter()
            .filter(|s| s.is_active_on(date))
            .collect())
    }

    pub async fn all_active(&self) -> Result<Vec<ComponentSubscription>, AppError> {
        self.components
            .list_subscriptions_by_status(SubscriptionStatus::Active)
            .await
    }

    /// Monthly cost of every component the property subscribes to on `date`.
    ///
    /// Components with no rate for the property's type on that date are left out.
    #[instrument(skip(self))]
    pub async fn component_cost(
        &self,
        property_id: Uuid,
        date: NaiveDate,
    ) -> Result<ComponentCost, AppError> {
        let property = self.find_property(property_id).await?;
        let mut breakdown = Vec::new();
        for subscription in self.active_on(property_id, date).await? {
            let Some(component) = self
                .components
                .find_component(subscription.component_id)
                .await?
            else {
                continue;
            };
            let rates = self.components.list_rates(component.component_id).await?;
            if let Some(rate) = resolve_component_rate(
                &rates,
                component.component_id,
                date,
                property.property_type,
            ) {
                breakdown.push(CostLine {
                    component_id: component.component_id,
                    component_name: component.name,
                    amount: rate.amount,
                });
            }
        }
        Ok(ComponentCost {
            total_cost: breakdown.iter().map(|line| line.amount).sum(),
            breakdown,
        })
    }

    /// Assign or remove one component across many properties. A failure on one property
    /// is reported in its detail line and does not stop the rest.
    #[instrument(skip(self, request), fields(
        admin_id = %admin_id,
        component_id = %request.component_id,
        properties = request.property_ids.len()
    ))]
    pub async fn bulk(&self, admin_id: Uuid, request: BulkRequest) -> Result<BulkResult, AppError> {
        if request.property_ids.is_empty() {
            return Err(AppError::BadRequest(anyhow!("propertyIds must not be empty")));
        }
        self.find_component(request.component_id).await?;
        if request.action == BulkAction::Assign {
            ensure_end_after_start(request.start_date, request.end_date)?;
        }

        let mut details = Vec::with_capacity(request.property_ids.len());
        for &property_id in &request.property_ids {
            let detail = match self.bulk_one(admin_id, property_id, &request).await {
                Ok(outcome) => BulkDetail {
                    property_id,
                    status: Some(outcome),
                    error: None,
                },
                Err(e) => {
                    record_error(e.kind(), "bulk_subscription");
                    warn!(property_id = %property_id, error = %e, "Bulk step failed");
                    BulkDetail {
                        property_id,
                        status: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            details.push(detail);
        }

        record_subscription_operation("bulk");
        info!(processed = details.len(), "Bulk subscription update finished");
        Ok(BulkResult {
            success: true,
            processed: details.len(),
            details,
        })
    }

    async fn bulk_one(
        &self,
        admin_id: Uuid,
        property_id: Uuid,
        request: &BulkRequest,
    ) -> Result<BulkOutcome, AppError> {
        self.find_property(property_id).await?;
        let existing = self
            .components
            .find_subscription_for(property_id, request.component_id)
            .await?;

        match (request.action, existing) {
            (BulkAction::Assign, Some(s)) if s.status == SubscriptionStatus::Active => {
                Ok(BulkOutcome::AlreadyActive)
            }
            (BulkAction::Assign, Some(s)) => {
                self.components
                    .reactivate_subscription(
                        s.subscription_id,
                        admin_id,
                        request.start_date,
                        request.end_date,
                    )
                    .await?
                    .ok_or_else(|| subscription_not_found(s.subscription_id))?;
                Ok(BulkOutcome::Reactivated)
            }
            (BulkAction::Assign, None) => {
                self.components
                    .create_subscription(&NewSubscription {
                        property_id,
                        component_id: request.component_id,
                        start_date: request.start_date,
                        end_date: request.end_date,
                        status: SubscriptionStatus::Active,
                        requested_by: admin_id,
                        approved_by: Some(admin_id),
                    })
                    .await?;
                Ok(BulkOutcome::Assigned)
            }
            (BulkAction::Remove, Some(s)) if s.status == SubscriptionStatus::Active => {
                let removed = self
                    .components
                    .transition_subscription(
                        s.subscription_id,
                        SubscriptionStatus::Active,
                        SubscriptionStatus::Inactive,
                        None,
                        None,
                    )
                    .await?;
                Ok(if removed.is_some() {
                    BulkOutcome::Removed
                } else {
                    BulkOutcome::Skipped
                })
            }
            (BulkAction::Remove, _) => Ok(BulkOutcome::Skipped),
        }
    }

    /// Move a pending request to `to`. Distinguishes a missing row from one that was
    /// already decided.
    async fn decide(
        &self,
        subscription_id: Uuid,
        to: SubscriptionStatus,
        admin_id: Uuid,
        reason: Option<&str>,
    ) -> Result<ComponentSubscription, AppError> {
        if let Some(updated) = self
            .components
            .transition_subscription(
                subscription_id,
                SubscriptionStatus::Pending,
                to,
                Some(admin_id),
                reason,
            )
            .await?
        {
            return Ok(updated);
        }
        let current = self.find_subscription(subscription_id).await?;
        Err(AppError::Conflict(anyhow!(
            "subscription request is already {}",
            current.status.as_str()
        )))
    }

    async fn find_property(&self, property_id: Uuid) -> Result<Property, AppError> {
        self.properties
            .find_property(property_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Property {} not found", property_id)))
    }

    async fn find_component(&self, component_id: Uuid) -> Result<TariffComponent, AppError> {
        self.components
            .find_component(component_id)
            .await?
            .ok_or_else(|| component_not_found(component_id))
    }

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<ComponentSubscription, AppError> {
        self.components
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| subscription_not_found(subscription_id))
    }
}

fn validate_component(input: &ComponentInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow!("component name is required")));
    }
    Ok(())
}

fn ensure_end_after_start(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    match end {
        Some(end) if end <= start => Err(AppError::BadRequest(anyhow!(
            "endDate ({}) must be after startDate ({})",
            end,
            start
        ))),
        _ => Ok(()),
    }
}

fn component_not_found(component_id: Uuid) -> AppError {
    AppError::NotFound(anyhow!("Component {} not found", component_id))
}

fn subscription_not_found(subscription_id: Uuid) -> AppError {
    AppError::NotFound(anyhow!("Subscription {} not found", subscription_id))
}
