//! Order notifications pushed to the restaurant's Telegram chat.

use crate::config::TelegramConfig;
use crate::models::Order;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify(&self, order: &Order) -> Result<(), NotifierError>;
    fn channel(&self) -> &'static str;
}

/// Sends nothing. Used when Telegram is not configured.
pub struct DisabledNotifier;

#[async_trait]
impl OrderNotifier for DisabledNotifier {
    async fn notify(&self, _order: &Order) -> Result<(), NotifierError> {
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "disabled"
    }
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token.expose_secret()
        )
    }
}

#[async_trait]
impl OrderNotifier for TelegramNotifier {
    async fn notify(&self, order: &Order) -> Result<(), NotifierError> {
        let text = render_order_message(order);
        let request = SendMessageRequest {
            chat_id: &self.config.chat_id,
            text: &text,
        };

        let response = self
            .client
            .traced_post(&self.send_message_url())
            .json(&request)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| {
                // reqwest errors include the URL, which carries the bot token.
                NotifierError::Connection(e.without_url().to_string())
            })?;

        let status = response.status();
        let body: Option<SendMessageResponse> = response.json().await.ok();

        match body {
            Some(SendMessageResponse { ok: true, .. }) if status.is_success() => {
                tracing::info!(order_id = %order.order_id, "Order notification sent via Telegram");
                Ok(())
            }
            Some(SendMessageResponse { description, .. }) => Err(NotifierError::SendFailed(
                format!(
                    "Telegram API returned {}: {}",
                    status,
                    description.unwrap_or_default()
                ),
            )),
            None => Err(NotifierError::SendFailed(format!(
                "Telegram API returned {} with an unreadable body",
                status
            ))),
        }
    }

    fn channel(&self) -> &'static str {
        "telegram"
    }
}

fn rupees(amount: Decimal) -> String {
    format!("₹{:.2}", amount.round_dp(2))
}

/// Plain-text summary of an order for the kitchen chat.
pub fn render_order_message(order: &Order) -> String {
    let mut text = String::new();
    let short_id: String = order.order_id.simple().to_string().chars().take(8).collect();

    let _ = writeln!(text, "New order #{}", short_id.to_uppercase());
    if let Some(table) = &order.table_number {
        let _ = writeln!(text, "Table: {}", table);
    }
    match (&order.customer_name, &order.customer_phone) {
        (Some(name), Some(phone)) => {
            let _ = writeln!(text, "Customer: {} ({})", name, phone);
        }
        (Some(name), None) => {
            let _ = writeln!(text, "Customer: {}", name);
        }
        (None, Some(phone)) => {
            let _ = writeln!(text, "Customer: {}", phone);
        }
        (None, None) => {}
    }

    let _ = writeln!(text, "Items:");
    for item in order.items.iter() {
        let _ = writeln!(
            text,
            "- {} x {} @ {}",
            item.quantity,
            item.name,
            rupees(item.unit_price)
        );
    }

    let _ = writeln!(text, "Total: {}", rupees(order.total_amount));
    if let Some(code) = &order.coupon_code {
        let _ = writeln!(text, "Coupon: {} (-{})", code, rupees(order.discount_amount));
    }
    let _ = write!(text, "Payable: {}", rupees(order.payable_amount));

    if let Some(notes) = &order.notes {
        let _ = write!(text, "\nNotes: {}", notes);
    }

    text
}
