//! PostgreSQL implementation of the store contracts.

use super::metrics::DB_QUERY_DURATION;
use super::store::{ComponentStore, ExpenseStore, PaymentLedger, PropertyStore, TariffStore};
use crate::models::{
    ComponentInput, ComponentRate, ComponentSubscription, CreateProperty, Expense, ExpenseInput,
    ExpenseRecipient, ListTransactionsFilter, MonthYear, NewPaymentItem, NewSubscription,
    NewTransaction, PaymentItem, PeriodSum, Property, PropertyPayment, PropertyType,
    PropertyUser, RateInput, RecipientInput, RelationType, SubscriptionStatus, Tariff,
    TariffComponent, TariffInput, TariffType, Transaction, TransactionStatus,
    TransactionWithItems,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "iuran-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

// =========================================================================
// Properties
// =========================================================================

#[async_trait]
impl PropertyStore for Database {
    #[instrument(skip(self))]
    async fn list_properties(&self) -> Result<Vec<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_properties"])
            .start_timer();

        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties ORDER BY block ASC, number ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list properties", e))?;

        timer.observe_duration();
        Ok(properties)
    }

    #[instrument(skip(self))]
    async fn find_property(&self, property_id: Uuid) -> Result<Option<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_property"])
            .start_timer();

        let property =
            sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE property_id = $1")
                .bind(property_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to get property", e))?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn find_by_block_number(
        &self,
        block: &str,
        number: i32,
    ) -> Result<Option<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_by_block_number"])
            .start_timer();

        let property = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE UPPER(block) = UPPER($1) AND number = $2",
        )
        .bind(block)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find property", e))?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn list_owned_by(&self, owner_id: Uuid) -> Result<Vec<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_owned_by"])
            .start_timer();

        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE owner_id = $1 ORDER BY block ASC, number ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list owned properties", e))?;

        timer.observe_duration();
        Ok(properties)
    }

    #[instrument(skip(self, input), fields(block = %input.block, number = input.number))]
    async fn create_property(&self, input: &CreateProperty) -> Result<Property, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_property"])
            .start_timer();

        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (property_id, block, number, property_type, owner_id, bast_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.block)
        .bind(input.number)
        .bind(input.property_type.as_str())
        .bind(input.owner_id)
        .bind(input.bast_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("Property Blok {} No. {} already exists", input.block, input.number),
            ),
            _ => db_error("Failed to create property", e),
        })?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn update_property_type(
        &self,
        property_id: Uuid,
        property_type: PropertyType,
    ) -> Result<Option<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_property_type"])
            .start_timer();

        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET property_type = $2, updated_utc = NOW()
            WHERE property_id = $1
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(property_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update property type", e))?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn update_bast_date(
        &self,
        property_id: Uuid,
        bast_date: Option<NaiveDate>,
    ) -> Result<Option<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_bast_date"])
            .start_timer();

        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET bast_date = $2, updated_utc = NOW()
            WHERE property_id = $1
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(bast_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update BAST date", e))?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn update_owner(
        &self,
        property_id: Uuid,
        owner_id: Option<Uuid>,
    ) -> Result<Option<Property>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_owner"])
            .start_timer();

        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET owner_id = $2, updated_utc = NOW()
            WHERE property_id = $1
            RETURNING *
            "#,
        )
        .bind(property_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update owner", e))?;

        timer.observe_duration();
        Ok(property)
    }

    #[instrument(skip(self))]
    async fn list_property_users(&self, property_id: Uuid) -> Result<Vec<PropertyUser>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_property_users"])
            .start_timer();

        let links = sqlx::query_as::<_, PropertyUser>(
            r#"
            SELECT * FROM property_users
            WHERE property_id = $1
            ORDER BY relation_type, created_utc
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list property users", e))?;

        timer.observe_duration();
        Ok(links)
    }

    #[instrument(skip(self))]
    async fn add_property_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
        relation_type: RelationType,
    ) -> Result<PropertyUser, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_property_user"])
            .start_timer();

        let link = sqlx::query_as::<_, PropertyUser>(
            r#"
            INSERT INTO property_users (link_id, property_id, user_id, relation_type)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(property_id)
        .bind(user_id)
        .bind(relation_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("User {} is already linked to this property", user_id),
            ),
            _ => db_error("Failed to add property user", e),
        })?;

        timer.observe_duration();
        Ok(link)
    }

    #[instrument(skip(self))]
    async fn update_property_user(
        &self,
        link_id: Uuid,
        relation_type: RelationType,
    ) -> Result<Option<PropertyUser>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_property_user"])
            .start_timer();

        let link = sqlx::query_as::<_, PropertyUser>(
            r#"
            UPDATE property_users SET relation_type = $2, updated_utc = NOW()
            WHERE link_id = $1
            RETURNING *
            "#,
        )
        .bind(link_id)
        .bind(relation_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update property user", e))?;

        timer.observe_duration();
        Ok(link)
    }

    #[instrument(skip(self))]
    async fn delete_property_user(&self, link_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_property_user"])
            .start_timer();

        let result = sqlx::query("DELETE FROM property_users WHERE link_id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete property user", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}

// =========================================================================
// Tariffs
// =========================================================================

#[async_trait]
impl TariffStore for Database {
    #[instrument(skip(self))]
    async fn list_tariffs(&self) -> Result<Vec<Tariff>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tariffs"])
            .start_timer();

        let tariffs = sqlx::query_as::<_, Tariff>(
            "SELECT * FROM tariffs ORDER BY valid_from DESC, created_utc DESC, tariff_id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list tariffs", e))?;

        timer.observe_duration();
        Ok(tariffs)
    }

    #[instrument(skip(self))]
    async fn find_tariff(&self, tariff_id: Uuid) -> Result<Option<Tariff>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_tariff"])
            .start_timer();

        let tariff = sqlx::query_as::<_, Tariff>("SELECT * FROM tariffs WHERE tariff_id = $1")
            .bind(tariff_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get tariff", e))?;

        timer.observe_duration();
        Ok(tariff)
    }

    #[instrument(skip(self))]
    async fn find_active_for_date(
        &self,
        date: NaiveDate,
        property_type: PropertyType,
        tariff_type: TariffType,
    ) -> Result<Option<Tariff>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_tariff"])
            .start_timer();

        let tariff = sqlx::query_as::<_, Tariff>(
            r#"
            SELECT * FROM tariffs
            WHERE valid_from <= $1
              AND (valid_to IS NULL OR valid_to >= $1)
              AND (property_type = $2 OR property_type = 'all')
              AND tariff_type = $3
            ORDER BY valid_from DESC, created_utc DESC, tariff_id DESC
            LIMIT 1
            "#,
        )
        .bind(date)
        .bind(property_type.as_str())
        .bind(tariff_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to resolve tariff", e))?;

        timer.observe_duration();
        Ok(tariff)
    }

    #[instrument(skip(self, input))]
    async fn create_tariff(&self, input: &TariffInput) -> Result<Tariff, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_tariff"])
            .start_timer();

        let tariff = sqlx::query_as::<_, Tariff>(
            r#"
            INSERT INTO tariffs (tariff_id, amount, valid_from, valid_to, property_type, tariff_type, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.amount)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(input.property_type.as_str())
        .bind(input.tariff_type.as_str())
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create tariff", e))?;

        timer.observe_duration();
        Ok(tariff)
    }

    #[instrument(skip(self, input))]
    async fn update_tariff(
        &self,
        tariff_id: Uuid,
        input: &TariffInput,
    ) -> Result<Option<Tariff>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_tariff"])
            .start_timer();

        let tariff = sqlx::query_as::<_, Tariff>(
            r#"
            UPDATE tariffs
            SET amount = $2, valid_from = $3, valid_to = $4, property_type = $5,
                tariff_type = $6, description = $7, updated_utc = NOW()
            WHERE tariff_id = $1
            RETURNING *
            "#,
        )
        .bind(tariff_id)
        .bind(input.amount)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(input.property_type.as_str())
        .bind(input.tariff_type.as_str())
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update tariff", e))?;

        timer.observe_duration();
        Ok(tariff)
    }

    #[instrument(skip(self))]
    async fn delete_tariff(&self, tariff_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_tariff"])
            .start_timer();

        let result = sqlx::query("DELETE FROM tariffs WHERE tariff_id = $1")
            .bind(tariff_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete tariff", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}

// =========================================================================
// Payment ledger
// =========================================================================

#[async_trait]
impl PaymentLedger for Database {
    #[instrument(skip(self, input), fields(user_id = %input.user_id, items = input.items.len()))]
    async fn create_transaction(
        &self,
        input: &NewTransaction,
    ) -> Result<TransactionWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transaction"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let verified_utc = input.verified_by.map(|_| Utc::now());
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (transaction_id, user_id, total_amount, proof_image, status, verified_by, verified_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.total_amount())
        .bind(&input.proof_image)
        .bind(input.status.as_str())
        .bind(input.verified_by)
        .bind(verified_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert transaction", e))?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let row = sqlx::query_as::<_, PaymentItem>(
                r#"
                INSERT INTO payment_items (item_id, transaction_id, property_id, month, year, amount)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(transaction.transaction_id)
            .bind(item.property_id)
            .bind(item.period.month() as i32)
            .bind(item.period.year())
            .bind(item.amount)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to insert payment item", e))?;
            items.push(row);
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        Ok(TransactionWithItems { transaction, items })
    }

    #[instrument(skip(self, item))]
    async fn add_item(
        &self,
        transaction_id: Uuid,
        item: &NewPaymentItem,
    ) -> Result<PaymentItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_item"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions SET total_amount = total_amount + $2, updated_utc = NOW()
            WHERE transaction_id = $1 AND status = 'pending'
            "#,
        )
        .bind(transaction_id)
        .bind(item.amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to update transaction total", e))?;

        if updated.rows_affected() == 0 {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT transaction_id FROM transactions WHERE transaction_id = $1")
                    .bind(transaction_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_error("Failed to get transaction", e))?;
            return Err(match exists {
                Some(_) => AppError::Conflict(anyhow::anyhow!(
                    "Transaction {} is already decided",
                    transaction_id
                )),
                None => AppError::NotFound(anyhow::anyhow!(
                    "Transaction {} not found",
                    transaction_id
                )),
            });
        }

        let row = sqlx::query_as::<_, PaymentItem>(
            r#"
            INSERT INTO payment_items (item_id, transaction_id, property_id, month, year, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction_id)
        .bind(item.property_id)
        .bind(item.period.month() as i32)
        .bind(item.period.year())
        .bind(item.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert payment item", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_transaction"])
            .start_timer();

        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE transaction_id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to get transaction", e))?;

        timer.observe_duration();
        Ok(transaction)
    }

    #[instrument(skip(self))]
    async fn list_items(&self, transaction_id: Uuid) -> Result<Vec<PaymentItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, PaymentItem>(
            "SELECT * FROM payment_items WHERE transaction_id = $1 ORDER BY year, month, created_utc",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list payment items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self, filter))]
    async fn list_transactions(
        &self,
        filter: &ListTransactionsFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_utc DESC
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list transactions", e))?;

        timer.observe_duration();
        Ok(transactions)
    }

    #[instrument(skip(self))]
    async fn list_pending(&self) -> Result<Vec<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_pending"])
            .start_timer();

        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE status = 'pending' ORDER BY created_utc ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list pending transactions", e))?;

        timer.observe_duration();
        Ok(transactions)
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        verified_by: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_transaction_status"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = $2, verified_by = $3, verified_utc = NOW(), updated_utc = NOW()
            WHERE transaction_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(verified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update transaction status", e))?;

        timer.observe_duration();
        Ok(transaction)
    }

    #[instrument(skip(self, property_ids), fields(from = %from, to = %to))]
    async fn period_sums(
        &self,
        property_ids: Option<&[Uuid]>,
        from: MonthYear,
        to: MonthYear,
    ) -> Result<Vec<PeriodSum>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["period_sums"])
            .start_timer();

        let sums = sqlx::query_as::<_, PeriodSum>(
            r#"
            SELECT pi.property_id, pi.year, pi.month, t.status, SUM(pi.amount) AS total
            FROM payment_items pi
            JOIN transactions t ON t.transaction_id = pi.transaction_id
            WHERE (pi.year * 12 + pi.month - 1) BETWEEN $1 AND $2
              AND ($3::uuid[] IS NULL OR pi.property_id = ANY($3))
            GROUP BY pi.property_id, pi.year, pi.month, t.status
            "#,
        )
        .bind(from.ordinal())
        .bind(to.ordinal())
        .bind(property_ids.map(|ids| ids.to_vec()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum payments", e))?;

        timer.observe_duration();
        Ok(sums)
    }

    #[instrument(skip(self))]
    async fn property_payments(
        &self,
        property_id: Uuid,
        year: i32,
    ) -> Result<Vec<PropertyPayment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["property_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, PropertyPayment>(
            r#"
            SELECT pi.item_id, pi.transaction_id, pi.property_id, pi.month, pi.year, pi.amount,
                   t.status, t.created_utc AS transaction_utc
            FROM payment_items pi
            JOIN transactions t ON t.transaction_id = pi.transaction_id
            WHERE pi.property_id = $1 AND pi.year = $2
            ORDER BY pi.year DESC, pi.month DESC, t.created_utc DESC
            "#,
        )
        .bind(property_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list property payments", e))?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self))]
    async fn verified_income_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["verified_income"])
            .start_timer();

        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(total_amount), 0) FROM transactions
            WHERE status = 'verified' AND created_utc >= $1 AND created_utc < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sum income", e))?;

        timer.observe_duration();
        Ok(total)
    }
}

// =========================================================================
// Expenses
// =========================================================================

#[async_trait]
impl ExpenseStore for Database {
    #[instrument(skip(self))]
    async fn list_recipients(&self) -> Result<Vec<ExpenseRecipient>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_recipients"])
            .start_timer();

        let recipients = sqlx::query_as::<_, ExpenseRecipient>(
            "SELECT * FROM expense_recipients ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list recipients", e))?;

        timer.observe_duration();
        Ok(recipients)
    }

    #[instrument(skip(self))]
    async fn find_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Option<ExpenseRecipient>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_recipient"])
            .start_timer();

        let recipient = sqlx::query_as::<_, ExpenseRecipient>(
            "SELECT * FROM expense_recipients WHERE recipient_id = $1",
        )
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get recipient", e))?;

        timer.observe_duration();
        Ok(recipient)
    }

    #[instrument(skip(self, input))]
    async fn create_recipient(&self, input: &RecipientInput) -> Result<ExpenseRecipient, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_recipient"])
            .start_timer();

        let recipient = sqlx::query_as::<_, ExpenseRecipient>(
            r#"
            INSERT INTO expense_recipients (recipient_id, name, identity_number, recipient_type, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.identity_number)
        .bind(&input.recipient_type)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create recipient", e))?;

        timer.observe_duration();
        Ok(recipient)
    }

    #[instrument(skip(self, input))]
    async fn update_recipient(
        &self,
        recipient_id: Uuid,
        input: &RecipientInput,
    ) -> Result<Option<ExpenseRecipient>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_recipient"])
            .start_timer();

        let recipient = sqlx::query_as::<_, ExpenseRecipient>(
            r#"
            UPDATE expense_recipients
            SET name = $2, identity_number = $3, recipient_type = $4, description = $5,
                updated_utc = NOW()
            WHERE recipient_id = $1
            RETURNING *
            "#,
        )
        .bind(recipient_id)
        .bind(&input.name)
        .bind(&input.identity_number)
        .bind(&input.recipient_type)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update recipient", e))?;

        timer.observe_duration();
        Ok(recipient)
    }

    #[instrument(skip(self))]
    async fn delete_recipient(&self, recipient_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_recipient"])
            .start_timer();

        let result = sqlx::query("DELETE FROM expense_recipients WHERE recipient_id = $1")
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete recipient", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_expenses"])
            .start_timer();

        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT * FROM expenses
            WHERE ($1::date IS NULL OR expense_date >= $1)
              AND ($2::date IS NULL OR expense_date <= $2)
            ORDER BY expense_date DESC, created_utc DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list expenses", e))?;

        timer.observe_duration();
        Ok(expenses)
    }

    #[instrument(skip(self))]
    async fn find_expense(&self, expense_id: Uuid) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE expense_id = $1")
            .bind(expense_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get expense", e))?;

        timer.observe_duration();
        Ok(expense)
    }

    #[instrument(skip(self, input))]
    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (expense_id, recipient_id, description, amount, expense_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.recipient_id)
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.expense_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create expense", e))?;

        timer.observe_duration();
        Ok(expense)
    }

    #[instrument(skip(self, input))]
    async fn update_expense(
        &self,
        expense_id: Uuid,
        input: &ExpenseInput,
    ) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET recipient_id = $2, description = $3, amount = $4, expense_date = $5,
                updated_utc = NOW()
            WHERE expense_id = $1
            RETURNING *
            "#,
        )
        .bind(expense_id)
        .bind(input.recipient_id)
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.expense_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update expense", e))?;

        timer.observe_duration();
        Ok(expense)
    }

    #[instrument(skip(self))]
    async fn delete_expense(&self, expense_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_expense"])
            .start_timer();

        let result = sqlx::query("DELETE FROM expenses WHERE expense_id = $1")
            .bind(expense_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete expense", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }
}

// =========================================================================
// Components and subscriptions
// =========================================================================

#[async_trait]
impl ComponentStore for Database {
    #[instrument(skip(self))]
    async fn list_components(&self, active_only: bool) -> Result<Vec<TariffComponent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_components"])
            .start_timer();

        let components = sqlx::query_as::<_, TariffComponent>(
            "SELECT * FROM tariff_components WHERE (NOT $1 OR is_active) ORDER BY name ASC",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list components", e))?;

        timer.observe_duration();
        Ok(components)
    }

    #[instrument(skip(self))]
    async fn find_component(
        &self,
        component_id: Uuid,
    ) -> Result<Option<TariffComponent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_component"])
            .start_timer();

        let component = sqlx::query_as::<_, TariffComponent>(
            "SELECT * FROM tariff_components WHERE component_id = $1",
        )
        .bind(component_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get component", e))?;

        timer.observe_duration();
        Ok(component)
    }

    #[instrument(skip(self, input))]
    async fn create_component(&self, input: &ComponentInput) -> Result<TariffComponent, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_component"])
            .start_timer();

        let component = sqlx::query_as::<_, TariffComponent>(
            r#"
            INSERT INTO tariff_components (component_id, name, description, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create component", e))?;

        timer.observe_duration();
        Ok(component)
    }

    #[instrument(skip(self, input))]
    async fn update_component(
        &self,
        component_id: Uuid,
        input: &ComponentInput,
    ) -> Result<Option<TariffComponent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_component"])
            .start_timer();

        let component = sqlx::query_as::<_, TariffComponent>(
            r#"
            UPDATE tariff_components
            SET name = $2, description = $3, is_active = $4, updated_utc = NOW()
            WHERE component_id = $1
            RETURNING *
            "#,
        )
        .bind(component_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update component", e))?;

        timer.observe_duration();
        Ok(component)
    }

    #[instrument(skip(self))]
    async fn list_rates(&self, component_id: Uuid) -> Result<Vec<ComponentRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, ComponentRate>(
            r#"
            SELECT * FROM tariff_component_rates
            WHERE component_id = $1
            ORDER BY valid_from DESC, created_utc DESC
            "#,
        )
        .bind(component_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list component rates", e))?;

        timer.observe_duration();
        Ok(rates)
    }

    #[instrument(skip(self, input))]
    async fn create_rate(
        &self,
        component_id: Uuid,
        input: &RateInput,
    ) -> Result<ComponentRate, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_rate"])
            .start_timer();

        let rate = sqlx::query_as::<_, ComponentRate>(
            r#"
            INSERT INTO tariff_component_rates (rate_id, component_id, amount, valid_from, valid_to, property_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(component_id)
        .bind(input.amount)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(input.property_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create component rate", e))?;

        timer.observe_duration();
        Ok(rate)
    }

    #[instrument(skip(self, input))]
    async fn update_rate(
        &self,
        rate_id: Uuid,
        input: &RateInput,
    ) -> Result<Option<ComponentRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_rate"])
            .start_timer();

        let rate = sqlx::query_as::<_, ComponentRate>(
            r#"
            UPDATE tariff_component_rates
            SET amount = $2, valid_from = $3, valid_to = $4, property_type = $5, updated_utc = NOW()
            WHERE rate_id = $1
            RETURNING *
            "#,
        )
        .bind(rate_id)
        .bind(input.amount)
        .bind(input.valid_from)
        .bind(input.valid_to)
        .bind(input.property_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update component rate", e))?;

        timer.observe_duration();
        Ok(rate)
    }

    #[instrument(skip(self))]
    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ComponentSubscription>(
            "SELECT * FROM component_subscriptions WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get subscription", e))?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self))]
    async fn find_subscription_for(
        &self,
        property_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_subscription_for"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            SELECT * FROM component_subscriptions
            WHERE property_id = $1 AND component_id = $2
            ORDER BY (status = 'active') DESC, created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(property_id)
        .bind(component_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find subscription", e))?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self, input), fields(property_id = %input.property_id, component_id = %input.component_id))]
    async fn create_subscription(
        &self,
        input: &NewSubscription,
    ) -> Result<ComponentSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subscription"])
            .start_timer();

        let approved_utc = input.approved_by.map(|_| Utc::now());
        let subscription = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            INSERT INTO component_subscriptions
                (subscription_id, property_id, component_id, start_date, end_date, status,
                 requested_by, approved_by, approved_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.property_id)
        .bind(input.component_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.status.as_str())
        .bind(input.requested_by)
        .bind(input.approved_by)
        .bind(approved_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create subscription", e))?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self, rejection_reason))]
    async fn transition_subscription(
        &self,
        subscription_id: Uuid,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
        actor: Option<Uuid>,
        rejection_reason: Option<&str>,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            UPDATE component_subscriptions
            SET status = $3,
                approved_by = COALESCE($4, approved_by),
                approved_utc = CASE WHEN $4::uuid IS NULL THEN approved_utc ELSE NOW() END,
                rejection_reason = COALESCE($5, rejection_reason),
                updated_utc = NOW()
            WHERE subscription_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(actor)
        .bind(rejection_reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update subscription status", e))?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self))]
    async fn end_subscription_request(
        &self,
        subscription_id: Uuid,
        requested_by: Uuid,
        end_date: NaiveDate,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["end_subscription_request"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let ended = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            UPDATE component_subscriptions
            SET status = 'inactive', updated_utc = NOW()
            WHERE subscription_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to deactivate subscription", e))?;

        let Some(ended) = ended else {
            // Dropping the transaction rolls it back.
            timer.observe_duration();
            return Ok(None);
        };

        let request = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            INSERT INTO component_subscriptions
                (subscription_id, property_id, component_id, start_date, end_date, status,
                 requested_by)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ended.property_id)
        .bind(ended.component_id)
        .bind(ended.start_date)
        .bind(end_date)
        .bind(requested_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to create end request", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        Ok(Some(request))
    }

    #[instrument(skip(self))]
    async fn reactivate_subscription(
        &self,
        subscription_id: Uuid,
        approved_by: Uuid,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Option<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reactivate_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            UPDATE component_subscriptions
            SET status = 'active', approved_by = $2, approved_utc = NOW(),
                start_date = $3, end_date = $4, rejection_reason = NULL, updated_utc = NOW()
            WHERE subscription_id = $1
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .bind(approved_by)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to reactivate subscription", e))?;

        timer.observe_duration();
        Ok(subscription)
    }

    #[instrument(skip(self))]
    async fn list_subscriptions_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions_by_status"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, ComponentSubscription>(
            "SELECT * FROM component_subscriptions WHERE status = $1 ORDER BY created_utc ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list subscriptions", e))?;

        timer.observe_duration();
        Ok(subscriptions)
    }

    #[instrument(skip(self))]
    async fn list_subscriptions_for_property(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<ComponentSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions_for_property"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, ComponentSubscription>(
            r#"
            SELECT * FROM component_subscriptions
            WHERE property_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list property subscriptions", e))?;

        timer.observe_duration();
        Ok(subscriptions)
    }
}
