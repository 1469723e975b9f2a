// Services module - workflow logic, called by the API layer with an explicit Actor

pub mod admin;
pub mod alerts;
pub mod auth;
pub mod drone_patrol;
pub mod image_analysis;
pub mod password;
pub mod promo;
pub mod qr_generator;
pub mod reservations;
pub mod subscriptions;
