//! Quote and commit flows for coupons applied at checkout.

use crate::coupons::{
    calculate_discount, check_eligibility, is_redeemable, normalize_code, validate_code_format,
    CodeFormatError, Rejection,
};
use crate::dtos::coupon::{CouponQuote, PublicCoupon};
use crate::dtos::order::PlaceOrderRequest;
use crate::models::{AppliedCoupon, Coupon, NewOrder, Order, OrderItem, OrderPlacement};
use crate::services::metrics::{
    record_coupon_quote, record_coupon_redemption, record_notification_failure,
    record_order_placed,
};
use crate::services::notifier::OrderNotifier;
use crate::services::store::CouponStore;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

/// Failures of applying a coupon to an order.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error(transparent)]
    Format(#[from] CodeFormatError),

    /// Unknown code, or a code belonging to another restaurant.
    #[error("Invalid coupon code")]
    NotFound,

    #[error(transparent)]
    Ineligible(#[from] Rejection),

    #[error("Order total is too large to apply this coupon")]
    AmountOutOfRange,

    #[error(transparent)]
    Upstream(#[from] AppError),
}

impl CouponError {
    /// Label used for quote/redemption metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CouponError::Format(_) => "format",
            CouponError::NotFound => "not_found",
            CouponError::Ineligible(rejection) => rejection.as_str(),
            CouponError::AmountOutOfRange => "out_of_range",
            CouponError::Upstream(_) => "upstream",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CouponError::NotFound => StatusCode::NOT_FOUND,
            CouponError::Format(_)
            | CouponError::Ineligible(_)
            | CouponError::AmountOutOfRange => StatusCode::BAD_REQUEST,
            CouponError::Upstream(e) => e.status_code(),
        }
    }

    fn into_response_with_status(self, status: StatusCode) -> Response {
        #[derive(Serialize)]
        struct CouponErrorResponse {
            ok: bool,
            error: String,
            #[serde(
                rename = "amountNeeded",
                skip_serializing_if = "Option::is_none",
                with = "rust_decimal::serde::float_option"
            )]
            amount_needed: Option<Decimal>,
        }

        if let CouponError::Upstream(e) = self {
            return e.into_response();
        }

        let amount_needed = match &self {
            CouponError::Ineligible(rejection) => rejection.amount_needed().map(|a| a.round_dp(2)),
            _ => None,
        };

        (
            status,
            Json(CouponErrorResponse {
                ok: false,
                error: self.to_string(),
                amount_needed,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.into_response_with_status(status)
    }
}

/// Failures of the order commit endpoint.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Any coupon problem fails the whole order with 400.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Request(#[from] AppError),
}

impl IntoResponse for PlaceOrderError {
    fn into_response(self) -> Response {
        match self {
            PlaceOrderError::Coupon(CouponError::Upstream(e)) | PlaceOrderError::Request(e) => {
                e.into_response()
            }
            PlaceOrderError::Coupon(e) => e.into_response_with_status(StatusCode::BAD_REQUEST),
        }
    }
}

/// Read-only quote flow and the order commit flow.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn CouponStore>,
    notifier: Arc<dyn OrderNotifier>,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn CouponStore>, notifier: Arc<dyn OrderNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Resolve a customer-supplied code and price it against `order_total`.
    async fn evaluate(
        &self,
        restaurant_id: Uuid,
        raw_code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Coupon, Decimal), CouponError> {
        let code = normalize_code(raw_code);
        validate_code_format(&code)?;

        let coupon = self
            .store
            .find_coupon_by_code(restaurant_id, &code)
            .await?
            .ok_or(CouponError::NotFound)?;

        check_eligibility(&coupon, order_total, now)?;
        let discount = calculate_discount(&coupon.discount(), order_total)
            .ok_or(CouponError::AmountOutOfRange)?;

        Ok((coupon, discount))
    }

    /// Price a coupon without touching any state.
    #[instrument(skip(self, raw_code), fields(restaurant_id = %restaurant_id))]
    pub async fn quote(
        &self,
        restaurant_id: Uuid,
        raw_code: &str,
        order_total: Decimal,
    ) -> Result<CouponQuote, CouponError> {
        self.quote_at(restaurant_id, raw_code, order_total, Utc::now())
            .await
    }

    pub async fn quote_at(
        &self,
        restaurant_id: Uuid,
        raw_code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote, CouponError> {
        let restaurant_label = restaurant_id.to_string();
        match self.evaluate(restaurant_id, raw_code, order_total, now).await {
            Ok((coupon, discount)) => {
                record_coupon_quote(&restaurant_label, "applied");
                info!(
                    coupon_id = %coupon.coupon_id,
                    discount_amount = %discount,
                    "Coupon quoted"
                );
                Ok(CouponQuote::new(&coupon, discount))
            }
            Err(e) => {
                record_coupon_quote(&restaurant_label, e.outcome());
                Err(e)
            }
        }
    }

    /// Coupons a diner could redeem right now, ignoring order minimums.
    pub async fn redeemable_coupons(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<PublicCoupon>, AppError> {
        let now = Utc::now();
        let coupons = self.store.list_coupons(restaurant_id).await?;
        Ok(coupons
            .iter()
            .filter(|c| is_redeemable(c, now))
            .map(PublicCoupon::from)
            .collect())
    }

    /// Commit an order, re-validating and redeeming its coupon if any.
    ///
    /// Nothing is written unless the coupon is still eligible and its usage
    /// increment succeeds. The notification is sent after the response path
    /// and never affects the outcome.
    #[instrument(skip(self, request), fields(restaurant_id = %request.restaurant_id))]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, PlaceOrderError> {
        let restaurant_id = request.restaurant_id;
        let restaurant_label = restaurant_id.to_string();
        let amounts = OrderAmounts::from_request(&request)?;

        let coupon = match request
            .coupon_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
        {
            Some(raw_code) => {
                let evaluated = self
                    .evaluate(restaurant_id, raw_code, amounts.total, Utc::now())
                    .await;
                match evaluated {
                    Ok((coupon, discount_amount)) => Some(AppliedCoupon {
                        coupon_id: coupon.coupon_id,
                        coupon_code: coupon.coupon_code,
                        discount_amount,
                    }),
                    Err(e) => {
                        record_coupon_redemption(&restaurant_label, e.outcome());
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };
        let with_coupon = coupon.is_some();

        let new_order = NewOrder {
            restaurant_id,
            items: request.items.into_iter().map(OrderItem::from).collect(),
            subtotal: amounts.subtotal,
            tax_amount: amounts.tax,
            delivery_charge: amounts.delivery,
            total_amount: amounts.total,
            coupon,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            table_number: request.table_number,
            notes: request.notes,
        };

        let order = match self.store.place_order(new_order).await? {
            OrderPlacement::Placed(order) => order,
            OrderPlacement::CouponRejected(rejection) => {
                let err = CouponError::Ineligible(rejection);
                record_coupon_redemption(&restaurant_label, err.outcome());
                return Err(err.into());
            }
            OrderPlacement::CouponGone => {
                record_coupon_redemption(&restaurant_label, CouponError::NotFound.outcome());
                return Err(CouponError::NotFound.into());
            }
        };

        if with_coupon {
            record_coupon_redemption(&restaurant_label, "redeemed");
        }
        record_order_placed(&restaurant_label, with_coupon);
        info!(
            order_id = %order.order_id,
            payable_amount = %order.payable_amount,
            coupon_code = order.coupon_code.as_deref().unwrap_or("-"),
            "Order placed"
        );

        self.spawn_notification(order.clone());

        Ok(order)
    }

    fn spawn_notification(&self, order: Order) {
        let notifier = self.notifier.clone();
        let span = tracing::info_span!("order_notification", order_id = %order.order_id);
        tokio::spawn(
            async move {
                if let Err(e) = notifier.notify(&order).await {
                    record_notification_failure(notifier.channel());
                    warn!(error = %e, channel = notifier.channel(), "Order notification failed");
                }
            }
            .instrument(span),
        );
    }
}

fn amounts_out_of_range() -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Order amounts are out of range"))
}

/// Monetary breakdown of an order after consistency checks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderAmounts {
    subtotal: Decimal,
    tax: Decimal,
    delivery: Decimal,
    total: Decimal,
}

impl OrderAmounts {
    fn from_request(request: &PlaceOrderRequest) -> Result<Self, AppError> {
        let tax = request.tax_amount.unwrap_or(Decimal::ZERO);
        let delivery = request.delivery_charge.unwrap_or(Decimal::ZERO);
        let total = request.total_amount;

        for (name, value) in [
            ("tax_amount", tax),
            ("delivery_charge", delivery),
            ("total_amount", total),
        ] {
            if value < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "{} cannot be negative",
                    name
                )));
            }
        }

        let subtotal = match request.subtotal {
            Some(subtotal) => {
                if subtotal < Decimal::ZERO {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "subtotal cannot be negative"
                    )));
                }
                let sum = subtotal
                    .checked_add(tax)
                    .and_then(|sum| sum.checked_add(delivery))
                    .ok_or_else(amounts_out_of_range)?;
                if sum != total {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "total_amount must equal subtotal + tax_amount + delivery_charge"
                    )));
                }
                subtotal
            }
            None => {
                let derived = total
                    .checked_sub(tax)
                    .and_then(|rest| rest.checked_sub(delivery))
                    .ok_or_else(amounts_out_of_range)?;
                if derived < Decimal::ZERO {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "tax_amount and delivery_charge exceed total_amount"
                    )));
                }
                derived
            }
        };

        Ok(Self {
            subtotal,
            tax,
            delivery,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::order::OrderItemRequest;
    use crate::models::{CouponChanges, CouponType, NewCoupon, UsageIncrement};
    use crate::services::memory::InMemoryStore;
    use crate::services::notifier::DisabledNotifier;
    use chrono::Duration;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn request(restaurant_id: Uuid, total: &str, coupon_code: Option<&str>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            restaurant_id,
            items: vec![OrderItemRequest {
                name: "Thali".to_string(),
                quantity: 1,
                unit_price: d(total),
            }],
            subtotal: None,
            tax_amount: None,
            delivery_charge: None,
            total_amount: d(total),
            coupon_code: coupon_code.map(str::to_string),
            customer_name: None,
            customer_phone: None,
            table_number: Some("3".to_string()),
            notes: None,
        }
    }

    async fn setup(coupon: NewCoupon) -> (CheckoutService, Arc<InMemoryStore>, Coupon) {
        let store = Arc::new(InMemoryStore::new());
        let created = store.insert_coupon(&coupon).await.unwrap();
        let service = CheckoutService::new(store.clone(), Arc::new(DisabledNotifier));
        (service, store, created)
    }

    fn flat_100_min_500(restaurant_id: Uuid) -> NewCoupon {
        let now = Utc::now();
        NewCoupon {
            restaurant_id,
            coupon_code: "FLAT100".to_string(),
            coupon_type: CouponType::Flat,
            discount_value: d("100"),
            max_discount_amount: None,
            min_order_value: d("500"),
            max_usage_count: 10,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(7),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn quote_is_case_insensitive_and_pure() {
        let restaurant = Uuid::new_v4();
        let (service, store, coupon) = setup(flat_100_min_500(restaurant)).await;

        let now = Utc::now();
        let first = service.quote_at(restaurant, " flat100 ", d("800"), now).await.unwrap();
        let second = service.quote_at(restaurant, "FLAT100", d("800"), now).await.unwrap();

        assert_eq!(first.discount_amount, d("100"));
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
        let reloaded = store
            .find_coupon_by_id(restaurant, coupon.coupon_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.current_usage_count, 0);
    }

    #[tokio::test]
    async fn quote_hides_other_restaurants_coupons() {
        let (service, _, _) = setup(flat_100_min_500(Uuid::new_v4())).await;
        let err = service
            .quote(Uuid::new_v4(), "FLAT100", d("800"))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::NotFound));
        assert_eq!(err.to_string(), "Invalid coupon code");
    }

    #[tokio::test]
    async fn quote_rejects_malformed_code_before_lookup() {
        let restaurant = Uuid::new_v4();
        let (service, store, _) = setup(flat_100_min_500(restaurant)).await;
        store.set_unavailable(true).await;

        let err = service.quote(restaurant, "SAVE-20", d("800")).await.unwrap_err();
        assert!(matches!(
            err,
            CouponError::Format(CodeFormatError::InvalidCharacters)
        ));
    }

    #[tokio::test]
    async fn commit_records_discount_and_usage() {
        let restaurant = Uuid::new_v4();
        let (service, store, coupon) = setup(flat_100_min_500(restaurant)).await;

        let order = service
            .place_order(request(restaurant, "800", Some("flat100")))
            .await
            .unwrap();

        assert_eq!(order.discount_amount, d("100"));
        assert_eq!(order.payable_amount, d("700"));
        assert_eq!(order.coupon_id, Some(coupon.coupon_id));
        assert_eq!(order.coupon_code.as_deref(), Some("FLAT100"));

        let reloaded = store
            .find_coupon_by_id(restaurant, coupon.coupon_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.current_usage_count, 1);
    }

    #[tokio::test]
    async fn commit_rechecks_minimum_against_current_total() {
        let restaurant = Uuid::new_v4();
        let (service, store, coupon) = setup(flat_100_min_500(restaurant)).await;

        service.quote(restaurant, "FLAT100", d("800")).await.unwrap();
        let err = service
            .place_order(request(restaurant, "300", Some("FLAT100")))
            .await
            .unwrap_err();

        match err {
            PlaceOrderError::Coupon(CouponError::Ineligible(rejection)) => {
                assert_eq!(rejection.amount_needed(), Some(d("200")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let reloaded = store
            .find_coupon_by_id(restaurant, coupon.coupon_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.current_usage_count, 0);
    }

    #[tokio::test]
    async fn blank_coupon_code_places_plain_order() {
        let restaurant = Uuid::new_v4();
        let (service, _, _) = setup(flat_100_min_500(restaurant)).await;

        let order = service
            .place_order(request(restaurant, "250", Some("   ")))
            .await
            .unwrap();
        assert_eq!(order.discount_amount, Decimal::ZERO);
        assert_eq!(order.payable_amount, d("250"));
        assert!(order.coupon_id.is_none());
    }

    #[test]
    fn amounts_must_add_up_when_subtotal_given() {
        let mut req = request(Uuid::new_v4(), "550", None);
        req.subtotal = Some(d("500"));
        req.tax_amount = Some(d("25"));
        req.delivery_charge = Some(d("25"));
        assert!(OrderAmounts::from_request(&req).is_ok());

        req.delivery_charge = Some(d("40"));
        assert!(OrderAmounts::from_request(&req).is_err());
    }

    #[test]
    fn subtotal_derived_when_omitted() {
        let mut req = request(Uuid::new_v4(), "550", None);
        req.tax_amount = Some(d("50"));
        let amounts = OrderAmounts::from_request(&req).unwrap();
        assert_eq!(amounts.subtotal, d("500"));
    }

    #[test]
    fn overflowing_amounts_are_rejected() {
        let huge = d("50000000000000000000000000000");

        let mut req = request(Uuid::new_v4(), "100", None);
        req.total_amount = huge;
        req.subtotal = Some(huge);
        req.tax_amount = Some(huge);
        assert!(matches!(
            OrderAmounts::from_request(&req),
            Err(AppError::BadRequest(_))
        ));

        let mut req = request(Uuid::new_v4(), "0", None);
        req.tax_amount = Some(huge);
        req.delivery_charge = Some(huge);
        assert!(matches!(
            OrderAmounts::from_request(&req),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn quote_with_overflowing_total_is_rejected() {
        let restaurant = Uuid::new_v4();
        let mut coupon = flat_100_min_500(restaurant);
        coupon.coupon_code = "SAVE20".to_string();
        coupon.coupon_type = CouponType::Percentage;
        coupon.discount_value = d("20");
        coupon.max_discount_amount = Some(d("150"));
        let (service, _, _) = setup(coupon).await;

        let err = service
            .quote(restaurant, "SAVE20", d("10000000000000000000000000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::AmountOutOfRange));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    /// Changes the coupon between the commit-time eligibility check and the
    /// store's increment.
    struct ChangeBeforeCommit {
        inner: Arc<InMemoryStore>,
        change: CouponChanges,
        delete: bool,
    }

    #[async_trait::async_trait]
    impl CouponStore for ChangeBeforeCommit {
        async fn health_check(&self) -> Result<(), AppError> {
            self.inner.health_check().await
        }

        async fn find_coupon_by_code(
            &self,
            restaurant_id: Uuid,
            coupon_code: &str,
        ) -> Result<Option<Coupon>, AppError> {
            self.inner.find_coupon_by_code(restaurant_id, coupon_code).await
        }

        async fn find_coupon_by_id(
            &self,
            restaurant_id: Uuid,
            coupon_id: Uuid,
        ) -> Result<Option<Coupon>, AppError> {
            self.inner.find_coupon_by_id(restaurant_id, coupon_id).await
        }

        async fn list_coupons(&self, restaurant_id: Uuid) -> Result<Vec<Coupon>, AppError> {
            self.inner.list_coupons(restaurant_id).await
        }

        async fn code_exists(
            &self,
            restaurant_id: Uuid,
            coupon_code: &str,
            excluding: Option<Uuid>,
        ) -> Result<bool, AppError> {
            self.inner
                .code_exists(restaurant_id, coupon_code, excluding)
                .await
        }

        async fn insert_coupon(&self, input: &NewCoupon) -> Result<Coupon, AppError> {
            self.inner.insert_coupon(input).await
        }

        async fn update_coupon(
            &self,
            restaurant_id: Uuid,
            coupon_id: Uuid,
            changes: &CouponChanges,
        ) -> Result<Option<Coupon>, AppError> {
            self.inner
                .update_coupon(restaurant_id, coupon_id, changes)
                .await
        }

        async fn delete_coupon(
            &self,
            restaurant_id: Uuid,
            coupon_id: Uuid,
        ) -> Result<bool, AppError> {
            self.inner.delete_coupon(restaurant_id, coupon_id).await
        }

        async fn atomic_increment_usage(
            &self,
            restaurant_id: Uuid,
            coupon_id: Uuid,
        ) -> Result<UsageIncrement, AppError> {
            self.inner
                .atomic_increment_usage(restaurant_id, coupon_id)
                .await
        }

        async fn place_order(&self, order: NewOrder) -> Result<OrderPlacement, AppError> {
            if let Some(applied) = &order.coupon {
                if self.delete {
                    self.inner
                        .delete_coupon(order.restaurant_id, applied.coupon_id)
                        .await?;
                } else {
                    self.inner
                        .update_coupon(order.restaurant_id, applied.coupon_id, &self.change)
                        .await?;
                }
            }
            self.inner.place_order(order).await
        }

        async fn get_order(
            &self,
            restaurant_id: Uuid,
            order_id: Uuid,
        ) -> Result<Option<Order>, AppError> {
            self.inner.get_order(restaurant_id, order_id).await
        }
    }

    async fn racing_setup(change: CouponChanges, delete: bool) -> (CheckoutService, Uuid) {
        let restaurant = Uuid::new_v4();
        let inner = Arc::new(InMemoryStore::new());
        inner
            .insert_coupon(&flat_100_min_500(restaurant))
            .await
            .unwrap();
        let store = Arc::new(ChangeBeforeCommit {
            inner,
            change,
            delete,
        });
        let service = CheckoutService::new(store, Arc::new(DisabledNotifier));
        (service, restaurant)
    }

    #[tokio::test]
    async fn coupon_deactivated_mid_commit_fails_the_order() {
        let change = CouponChanges {
            is_active: Some(false),
            ..Default::default()
        };
        let (service, restaurant) = racing_setup(change, false).await;

        let err = service
            .place_order(request(restaurant, "800", Some("FLAT100")))
            .await
            .unwrap_err();
        match err {
            PlaceOrderError::Coupon(CouponError::Ineligible(rejection)) => {
                assert_eq!(rejection, Rejection::Inactive);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn coupon_expired_mid_commit_fails_the_order() {
        let change = CouponChanges {
            start_date: Some(Utc::now() - Duration::days(3)),
            end_date: Some(Utc::now() - Duration::days(1)),
            ..Default::default()
        };
        let (service, restaurant) = racing_setup(change, false).await;

        let err = service
            .place_order(request(restaurant, "800", Some("FLAT100")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaceOrderError::Coupon(CouponError::Ineligible(Rejection::Expired))
        ));
        assert_eq!(err.to_string(), "This coupon has expired.");
    }

    #[tokio::test]
    async fn coupon_deleted_mid_commit_fails_the_order() {
        let (service, restaurant) = racing_setup(CouponChanges::default(), true).await;

        let err = service
            .place_order(request(restaurant, "800", Some("FLAT100")))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceOrderError::Coupon(CouponError::NotFound)));
    }

    #[test]
    fn commit_errors_are_bad_requests() {
        let res = PlaceOrderError::Coupon(CouponError::NotFound).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = CouponError::NotFound.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let upstream = CouponError::Upstream(AppError::DatabaseError(anyhow::anyhow!("down")));
        let res = PlaceOrderError::Coupon(upstream).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
