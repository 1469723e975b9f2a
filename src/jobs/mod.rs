// Jobs module - Scheduled background work

pub mod maintenance;
