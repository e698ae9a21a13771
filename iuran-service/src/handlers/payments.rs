//! Payment submission and verification handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    AdminPaymentRequest, SubmitPaymentRequest, TransactionStatusQuery, VerifyTransactionRequest,
};
use crate::middleware::{AdminContext, CallerContext};
use crate::models::{Transaction, TransactionWithItems};
use crate::startup::AppState;

/// A resident submits payment for months of properties they own.
pub async fn submit_payment(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(payload): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<TransactionWithItems>), AppError> {
    payload.validate()?;
    tracing::info!(
        user_id = %caller.user_id,
        items = payload.items.len(),
        "Submitting payment"
    );

    let items = payload.items.into_iter().map(Into::into).collect();
    let created = state
        .payments
        .submit(caller.user_id, items, payload.proof_image)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn my_payments(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(query): Query<TransactionStatusQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(
        state
            .payments
            .list_for_user(caller.user_id, query.status)
            .await?,
    ))
}

/// One transaction with its items. Residents may only read their own.
pub async fn get_transaction(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionWithItems>, AppError> {
    let found = state.payments.get_transaction(transaction_id).await?;
    if !caller.is_admin() && found.transaction.user_id != caller.user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Transaction belongs to another user"
        )));
    }
    Ok(Json(found))
}

pub async fn pending_payments(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.payments.list_pending().await?))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<VerifyTransactionRequest>,
) -> Result<Json<Transaction>, AppError> {
    tracing::info!(
        admin_id = %admin.user_id,
        transaction_id = %transaction_id,
        status = payload.status.as_str(),
        "Verifying payment"
    );
    Ok(Json(
        state
            .payments
            .verify(admin.user_id, transaction_id, payload.status)
            .await?,
    ))
}

pub async fn create_payment_for_user(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(payload): Json<AdminPaymentRequest>,
) -> Result<(StatusCode, Json<TransactionWithItems>), AppError> {
    payload.validate()?;
    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %payload.user_id,
        auto_verify = payload.auto_verify,
        "Creating payment for user"
    );

    let items = payload.items.into_iter().map(Into::into).collect();
    let created = state
        .payments
        .create_for_user(
            admin.user_id,
            payload.user_id,
            items,
            payload.proof_image,
            payload.auto_verify,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
