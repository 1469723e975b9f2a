use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{PromoCodeStore, Store, StoreError};
use crate::models::{
    promo_code::{normalize_code, CreatePromoCodeData, DiscountType, PromoCode, PromoRejection},
    role::Actor,
    subscription::SubscriptionPlan,
};

pub const GENERATED_CODE_LEN: usize = 8;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(thiserror::Error, Debug)]
pub enum PromoError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rejected(#[from] PromoRejection),

    #[error("Only admins can manage promo codes")]
    AdminOnly,

    #[error("Promo code not found")]
    NotFound,

    #[error("A promo code with this name already exists")]
    DuplicateCode,

    #[error("{0}")]
    Validation(String),
}

/// Price of a plan once an accepted promo code is applied.
#[derive(Debug, Clone, Serialize)]
pub struct PromoQuote {
    pub promo: PromoCode,
    pub original_price: Decimal,
    pub discount: Decimal,
    pub final_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Uppercase letters and digits, `len` characters long.
pub(crate) fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

pub fn generate_code() -> String {
    random_code(GENERATED_CODE_LEN)
}

/// Checks a user-typed code against `plan` without redeeming it.
#[tracing::instrument(skip(store, plan), fields(plan = %plan.name))]
pub async fn apply_promo_code(
    store: &dyn Store,
    raw_code: &str,
    plan: &SubscriptionPlan,
) -> Result<PromoQuote, PromoError> {
    let code = normalize_code(raw_code);
    if code.is_empty() {
        return Err(PromoError::Validation("Enter a promo code".to_string()));
    }

    let promo = store
        .find_active_promo_code(&code)
        .await?
        .ok_or(PromoRejection::NotFound)?;

    promo.check_redeemable(Utc::now())?;

    let final_price = promo.apply_to(plan.price);

    tracing::debug!(code = %promo.code, final_price = %final_price, "Promo code accepted");

    Ok(PromoQuote {
        original_price: plan.price,
        discount: plan.price - final_price,
        final_price,
        promo,
    })
}

fn require_admin(actor: Actor) -> Result<(), PromoError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(PromoError::AdminOnly)
    }
}

#[tracing::instrument(skip(store, new_code), fields(actor = %actor.user_id))]
pub async fn create_promo_code(
    store: &dyn Store,
    actor: Actor,
    new_code: NewPromoCode,
) -> Result<PromoCode, PromoError> {
    require_admin(actor)?;

    let code = normalize_code(&new_code.code);
    if code.is_empty() {
        return Err(PromoError::Validation("Code is required".to_string()));
    }
    if new_code.discount_value <= Decimal::ZERO {
        return Err(PromoError::Validation(
            "Discount value must be greater than zero".to_string(),
        ));
    }
    if new_code.discount_type == DiscountType::Percentage
        && new_code.discount_value > Decimal::ONE_HUNDRED
    {
        return Err(PromoError::Validation(
            "A percentage discount cannot exceed 100".to_string(),
        ));
    }
    if matches!(new_code.max_uses, Some(n) if n <= 0) {
        return Err(PromoError::Validation(
            "Maximum uses must be positive".to_string(),
        ));
    }

    let promo = store
        .insert_promo_code(CreatePromoCodeData {
            code,
            discount_type: new_code.discount_type,
            discount_value: new_code.discount_value,
            max_uses: new_code.max_uses,
            valid_until: new_code.valid_until,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => PromoError::DuplicateCode,
            other => PromoError::Store(other),
        })?;

    tracing::info!(promo_id = %promo.id, code = %promo.code, "Promo code created");

    Ok(promo)
}

pub async fn list_promo_codes(store: &dyn Store, actor: Actor) -> Result<Vec<PromoCode>, PromoError> {
    require_admin(actor)?;
    Ok(store.list_promo_codes().await?)
}

/// Flips the active flag.
pub async fn toggle_promo_code(
    store: &dyn Store,
    actor: Actor,
    promo_id: Uuid,
) -> Result<PromoCode, PromoError> {
    require_admin(actor)?;

    let promo = store
        .find_promo_code(promo_id)
        .await?
        .ok_or(PromoError::NotFound)?;

    store
        .set_promo_code_active(promo_id, !promo.is_active)
        .await?
        .ok_or(PromoError::NotFound)
}

pub async fn delete_promo_code(
    store: &dyn Store,
    actor: Actor,
    promo_id: Uuid,
) -> Result<(), PromoError> {
    require_admin(actor)?;

    if !store.delete_promo_code(promo_id).await? {
        return Err(PromoError::NotFound);
    }
    tracing::info!(promo_id = %promo_id, "Promo code deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::role::AppRole;
    use rust_decimal_macros::dec;

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), AppRole::Admin)
    }

    fn plan(price: Decimal) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: "Resident".to_string(),
            description: None,
            price,
            duration_days: 30,
            includes_parking: true,
            includes_charging: true,
            includes_vehicles: false,
            includes_revision: false,
            max_reservations: None,
            features: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn new_code(code: &str, discount_type: DiscountType, value: Decimal) -> NewPromoCode {
        NewPromoCode {
            code: code.to_string(),
            discount_type,
            discount_value: value,
            max_uses: None,
            valid_until: None,
        }
    }

    #[tokio::test]
    async fn test_apply_percentage_code() {
        let store = MemoryStore::new();
        create_promo_code(&store, admin(), new_code("save10", DiscountType::Percentage, dec!(10)))
            .await
            .unwrap();

        let quote = apply_promo_code(&store, " Save10 ", &plan(dec!(50)))
            .await
            .unwrap();
        assert_eq!(quote.promo.code, "SAVE10");
        assert_eq!(quote.final_price, dec!(45.00));
        assert_eq!(quote.discount, dec!(5.00));
    }

    #[tokio::test]
    async fn test_apply_rejections() {
        let store = MemoryStore::new();
        let actor = admin();
        let mut limited = new_code("ONCE", DiscountType::Fixed, dec!(5));
        limited.max_uses = Some(1);
        let promo = create_promo_code(&store, actor, limited).await.unwrap();
        store.redeem_promo_code(promo.id, Utc::now()).await.unwrap();

        assert!(matches!(
            apply_promo_code(&store, "once", &plan(dec!(10))).await,
            Err(PromoError::Rejected(PromoRejection::LimitReached))
        ));
        assert!(matches!(
            apply_promo_code(&store, "MISSING", &plan(dec!(10))).await,
            Err(PromoError::Rejected(PromoRejection::NotFound))
        ));
        assert!(matches!(
            apply_promo_code(&store, "   ", &plan(dec!(10))).await,
            Err(PromoError::Validation(_))
        ));

        let off = create_promo_code(&store, actor, new_code("OFF", DiscountType::Fixed, dec!(1)))
            .await
            .unwrap();
        toggle_promo_code(&store, actor, off.id).await.unwrap();
        assert!(matches!(
            apply_promo_code(&store, "OFF", &plan(dec!(10))).await,
            Err(PromoError::Rejected(PromoRejection::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_create_validation_and_duplicates() {
        let store = MemoryStore::new();
        let actor = admin();

        assert!(matches!(
            create_promo_code(&store, actor, new_code("BIG", DiscountType::Percentage, dec!(150))).await,
            Err(PromoError::Validation(_))
        ));
        assert!(matches!(
            create_promo_code(&store, actor, new_code("ZERO", DiscountType::Fixed, dec!(0))).await,
            Err(PromoError::Validation(_))
        ));

        create_promo_code(&store, actor, new_code("WELCOME", DiscountType::Fixed, dec!(2)))
            .await
            .unwrap();
        assert!(matches!(
            create_promo_code(&store, actor, new_code("welcome", DiscountType::Fixed, dec!(3))).await,
            Err(PromoError::DuplicateCode)
        ));

        let client = Actor::new(Uuid::new_v4(), AppRole::Client);
        assert!(matches!(
            list_promo_codes(&store, client).await,
            Err(PromoError::AdminOnly)
        ));
    }

    #[tokio::test]
    async fn test_toggle_and_delete() {
        let store = MemoryStore::new();
        let actor = admin();
        let promo = create_promo_code(&store, actor, new_code("FLIP", DiscountType::Fixed, dec!(2)))
            .await
            .unwrap();
        assert!(promo.is_active);

        let toggled = toggle_promo_code(&store, actor, promo.id).await.unwrap();
        assert!(!toggled.is_active);
        let toggled = toggle_promo_code(&store, actor, promo.id).await.unwrap();
        assert!(toggled.is_active);

        delete_promo_code(&store, actor, promo.id).await.unwrap();
        assert!(list_promo_codes(&store, actor).await.unwrap().is_empty());
        assert!(matches!(
            delete_promo_code(&store, actor, promo.id).await,
            Err(PromoError::NotFound)
        ));
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code();
        assert_eq!(code.len(), GENERATED_CODE_LEN);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
