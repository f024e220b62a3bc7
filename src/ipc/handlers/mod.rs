pub mod auth;
pub mod cache;
pub mod collections;
pub mod core;
pub mod dashboard;
pub mod exports;
pub mod payments;
pub mod plans;
pub mod reports;
pub mod students;
