//! Database service for ordering-service.

use crate::models::{
    Coupon, CouponChanges, NewCoupon, NewOrder, Order, OrderPlacement, OrderStatus,
    UsageIncrement,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::CouponStore;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const COUPON_COLUMNS: &str = "coupon_id, restaurant_id, coupon_code, coupon_type, discount_value, \
     max_discount_amount, min_order_value, max_usage_count, current_usage_count, start_date, \
     end_date, is_active, created_utc, updated_utc";

const ORDER_COLUMNS: &str = "order_id, restaurant_id, items, subtotal, tax_amount, \
     delivery_charge, total_amount, discount_amount, payable_amount, coupon_id, coupon_code, \
     customer_name, customer_phone, table_number, notes, status, created_utc";

/// Take one use of a coupon, but only while it is active, inside its
/// validity window and below its cap. `None` when the row did not move.
async fn increment_usage(
    conn: &mut PgConnection,
    restaurant_id: Uuid,
    coupon_id: Uuid,
) -> Result<Option<i32>, AppError> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE coupons
        SET current_usage_count = current_usage_count + 1, updated_utc = NOW()
        WHERE restaurant_id = $1 AND coupon_id = $2
          AND is_active
          AND start_date <= NOW() AND end_date >= NOW()
          AND current_usage_count < max_usage_count
        RETURNING current_usage_count
        "#,
    )
    .bind(restaurant_id)
    .bind(coupon_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to increment coupon usage: {}", e))
    })
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn coupon_write_error(e: sqlx::Error, code: &str, action: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!(
                "Coupon code '{}' already exists for this restaurant",
                code
            ))
        }
        sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
            AppError::BadRequest(anyhow::anyhow!("Coupon violates a constraint: {}", db_err))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to {} coupon: {}", action, e)),
    }
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "ordering-service"))]
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
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
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

#[async_trait]
impl CouponStore for Database {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    // =========================================================================
    // Coupon Operations
    // =========================================================================

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id, coupon_code = %coupon_code))]
    async fn find_coupon_by_code(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
    ) -> Result<Option<Coupon>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_coupon_by_code"])
            .start_timer();

        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE restaurant_id = $1 AND coupon_code = $2",
            COUPON_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(coupon_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get coupon: {}", e)))?;

        timer.observe_duration();

        Ok(coupon)
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id, coupon_id = %coupon_id))]
    async fn find_coupon_by_id(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<Option<Coupon>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_coupon_by_id"])
            .start_timer();

        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE restaurant_id = $1 AND coupon_id = $2",
            COUPON_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get coupon: {}", e)))?;

        timer.observe_duration();

        Ok(coupon)
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id))]
    async fn list_coupons(&self, restaurant_id: Uuid) -> Result<Vec<Coupon>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_coupons"])
            .start_timer();

        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE restaurant_id = $1 ORDER BY created_utc DESC",
            COUPON_COLUMNS
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list coupons: {}", e)))?;

        timer.observe_duration();

        Ok(coupons)
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id))]
    async fn code_exists(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["code_exists"])
            .start_timer();

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM coupons
                WHERE restaurant_id = $1 AND coupon_code = $2
                  AND ($3::uuid IS NULL OR coupon_id <> $3)
            )
            "#,
        )
        .bind(restaurant_id)
        .bind(coupon_code)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check coupon code: {}", e))
        })?;

        timer.observe_duration();

        Ok(exists)
    }

    #[instrument(skip(self, input), fields(restaurant_id = %input.restaurant_id))]
    async fn insert_coupon(&self, input: &NewCoupon) -> Result<Coupon, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_coupon"])
            .start_timer();

        let coupon_id = Uuid::new_v4();
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r#"
            INSERT INTO coupons (coupon_id, restaurant_id, coupon_code, coupon_type, discount_value, max_discount_amount, min_order_value, max_usage_count, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(coupon_id)
        .bind(input.restaurant_id)
        .bind(&input.coupon_code)
        .bind(input.coupon_type.as_str())
        .bind(input.discount_value)
        .bind(input.max_discount_amount)
        .bind(input.min_order_value)
        .bind(input.max_usage_count)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| coupon_write_error(e, &input.coupon_code, "create"))?;

        timer.observe_duration();
        info!(coupon_id = %coupon.coupon_id, coupon_code = %coupon.coupon_code, "Coupon created");

        Ok(coupon)
    }

    #[instrument(skip(self, changes), fields(restaurant_id = %restaurant_id, coupon_id = %coupon_id))]
    async fn update_coupon(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
        changes: &CouponChanges,
    ) -> Result<Option<Coupon>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_coupon"])
            .start_timer();

        let (set_cap, cap) = match changes.max_discount_amount {
            Some(cap) => (true, cap),
            None => (false, None),
        };

        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r#"
            UPDATE coupons SET
                coupon_code = COALESCE($3, coupon_code),
                coupon_type = COALESCE($4, coupon_type),
                discount_value = COALESCE($5, discount_value),
                max_discount_amount = CASE WHEN $6 THEN $7 ELSE max_discount_amount END,
                min_order_value = COALESCE($8, min_order_value),
                max_usage_count = COALESCE($9, max_usage_count),
                start_date = COALESCE($10, start_date),
                end_date = COALESCE($11, end_date),
                is_active = COALESCE($12, is_active),
                updated_utc = NOW()
            WHERE restaurant_id = $1 AND coupon_id = $2
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(coupon_id)
        .bind(&changes.coupon_code)
        .bind(changes.coupon_type.map(|t| t.as_str()))
        .bind(changes.discount_value)
        .bind(set_cap)
        .bind(cap)
        .bind(changes.min_order_value)
        .bind(changes.max_usage_count)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let code = changes.coupon_code.as_deref().unwrap_or_default();
            coupon_write_error(e, code, "update")
        })?;

        timer.observe_duration();

        if coupon.is_some() {
            info!("Coupon updated");
        }

        Ok(coupon)
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id, coupon_id = %coupon_id))]
    async fn delete_coupon(&self, restaurant_id: Uuid, coupon_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_coupon"])
            .start_timer();

        let result = sqlx::query("DELETE FROM coupons WHERE restaurant_id = $1 AND coupon_id = $2")
            .bind(restaurant_id)
            .bind(coupon_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete coupon: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Coupon deleted");
        }

        Ok(deleted)
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id, coupon_id = %coupon_id))]
    async fn atomic_increment_usage(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<UsageIncrement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["atomic_increment_usage"])
            .start_timer();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        let usage = increment_usage(&mut *conn, restaurant_id, coupon_id).await?;

        timer.observe_duration();

        Ok(match usage {
            Some(count) => UsageIncrement::Applied(count),
            None => UsageIncrement::CapacityExceeded,
        })
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    #[instrument(skip(self, order), fields(restaurant_id = %order.restaurant_id))]
    async fn place_order(&self, order: NewOrder) -> Result<OrderPlacement, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["place_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if let Some(applied) = &order.coupon {
            let usage = increment_usage(&mut *tx, order.restaurant_id, applied.coupon_id).await?;

            if usage.is_none() {
                let current = sqlx::query_as::<_, Coupon>(&format!(
                    "SELECT {} FROM coupons WHERE restaurant_id = $1 AND coupon_id = $2",
                    COUPON_COLUMNS
                ))
                .bind(order.restaurant_id)
                .bind(applied.coupon_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to get coupon: {}", e))
                })?;
                tx.rollback().await.ok();
                timer.observe_duration();

                let refused = OrderPlacement::refused(current.as_ref(), Utc::now());
                warn!(
                    coupon_id = %applied.coupon_id,
                    outcome = ?refused,
                    "Coupon refused at commit"
                );
                return Ok(refused);
            }
        }

        let order_id = Uuid::new_v4();
        let discount_amount = order.discount_amount();
        let payable_amount = order.payable_amount();
        let (coupon_id, coupon_code) = match &order.coupon {
            Some(applied) => (Some(applied.coupon_id), Some(applied.coupon_code.clone())),
            None => (None, None),
        };

        let inserted = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (order_id, restaurant_id, items, subtotal, tax_amount, delivery_charge, total_amount, discount_amount, payable_amount, coupon_id, coupon_code, customer_name, customer_phone, table_number, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(order.restaurant_id)
        .bind(Json(&order.items))
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.delivery_charge)
        .bind(order.total_amount)
        .bind(discount_amount)
        .bind(payable_amount)
        .bind(coupon_id)
        .bind(coupon_code)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.table_number)
        .bind(&order.notes)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert order: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            order_id = %inserted.order_id,
            total_amount = %inserted.total_amount,
            discount_amount = %inserted.discount_amount,
            "Order placed"
        );

        Ok(OrderPlacement::Placed(inserted))
    }

    #[instrument(skip(self), fields(restaurant_id = %restaurant_id, order_id = %order_id))]
    async fn get_order(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE restaurant_id = $1 AND order_id = $2",
            ORDER_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }
}
