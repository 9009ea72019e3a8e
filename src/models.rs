pub mod activity;
pub mod auth;
pub mod crm;
pub mod dashboard;
pub mod enquiry;
pub mod responses;
