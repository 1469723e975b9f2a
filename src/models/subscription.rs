use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_days: i32,
    pub includes_parking: bool,
    pub includes_charging: bool,
    pub includes_vehicles: bool,
    pub includes_revision: bool,
    pub max_reservations: Option<i32>,
    pub features: Option<JsonValue>, // JSONB array of strings
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Extra feature strings; anything that is not a string array is ignored.
    pub fn feature_list(&self) -> Vec<String> {
        match &self.features {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub promo_code_id: Option<Uuid>,
    pub amount_paid: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub is_active: bool,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionData {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub promo_code_id: Option<Uuid>,
    pub amount_paid: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
}

/// Subscription row joined with its plan and subscriber, for the admin overview.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionOverviewRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_name: String,
    pub plan_price: Decimal,
    pub amount_paid: Decimal,
    pub subscriber_email: Option<String>,
    pub subscriber_name: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoyaltyCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub card_number: String,
    pub qr_code: String, // data: URI of the rendered QR image
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateLoyaltyCardData {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub card_number: String,
    pub qr_code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
