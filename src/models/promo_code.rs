use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePromoCodeData {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Why a promo code cannot be applied.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoRejection {
    #[error("Promo code not found")]
    NotFound,

    #[error("Promo code is inactive")]
    Inactive,

    #[error("Promo code has expired")]
    Expired,

    #[error("Promo code usage limit reached")]
    LimitReached,
}

/// Uppercases and trims a user-typed code.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

impl PromoCode {
    /// Checks whether the code may be redeemed at `now`.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }
        if let Some(valid_until) = self.valid_until {
            if valid_until < now {
                return Err(PromoRejection::Expired);
            }
        }
        if let Some(max_uses) = self.max_uses {
            if self.current_uses >= max_uses {
                return Err(PromoRejection::LimitReached);
            }
        }
        Ok(())
    }

    /// Amount taken off `price`, before clamping.
    pub fn discount_for(&self, price: Decimal) -> Decimal {
        match self.discount_type {
            DiscountType::Percentage => price * self.discount_value / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => self.discount_value,
        }
    }

    /// Final price after the discount, never below zero, rounded to cents.
    pub fn apply_to(&self, price: Decimal) -> Decimal {
        (price - self.discount_for(price))
            .max(Decimal::ZERO)
            .round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn promo(discount_type: DiscountType, value: Decimal) -> PromoCode {
        PromoCode {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            discount_type,
            discount_value: value,
            max_uses: None,
            current_uses: 0,
            valid_until: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_limit_reached() {
        let mut p = promo(DiscountType::Percentage, dec!(10));
        p.max_uses = Some(1);
        p.current_uses = 1;
        assert_eq!(p.check_redeemable(Utc::now()), Err(PromoRejection::LimitReached));

        p.current_uses = 0;
        assert_eq!(p.check_redeemable(Utc::now()), Ok(()));
        assert_eq!(p.apply_to(dec!(50)), dec!(45.00));
    }

    #[test]
    fn test_fixed_discount_clamps_to_zero() {
        let p = promo(DiscountType::Fixed, dec!(5));
        assert_eq!(p.apply_to(dec!(3)), Decimal::ZERO);
    }

    #[test]
    fn test_expired_and_inactive() {
        let mut p = promo(DiscountType::Fixed, dec!(5));
        p.valid_until = Some(Utc::now() - Duration::days(1));
        assert_eq!(p.check_redeemable(Utc::now()), Err(PromoRejection::Expired));

        p.valid_until = Some(Utc::now() + Duration::days(1));
        p.is_active = false;
        assert_eq!(p.check_redeemable(Utc::now()), Err(PromoRejection::Inactive));
    }

    #[test]
    fn test_percentage_rounds_to_cents() {
        let p = promo(DiscountType::Percentage, dec!(15));
        assert_eq!(p.apply_to(dec!(19.99)), dec!(16.99));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save10 "), "SAVE10");
    }
}
