// Models module - Domain types, status enums and transition rules

pub mod alert;
pub mod drone;
pub mod profile;
pub mod promo_code;
pub mod reservation;
pub mod resource;
pub mod role;
pub mod subscription;

pub use alert::{Alert, AlertAction, AlertStatus, AlertVisibility};
pub use drone::{Drone, DronePatrol, DroneStatus};
pub use profile::{Profile, UserWithRole};
pub use promo_code::{DiscountType, PromoCode};
pub use reservation::{Reservation, ReservationStatus};
pub use resource::{Coordinate, Resource, ResourceDetails, ResourceKind};
pub use role::{Actor, AppRole, RoleAssignment};
pub use subscription::{LoyaltyCard, SubscriptionPlan, UserSubscription};
