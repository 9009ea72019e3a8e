pub mod activity;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod enquiries;
