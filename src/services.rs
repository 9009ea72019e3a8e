pub mod aggregation;
pub mod auth;
pub mod crm_service;
pub mod dashboard_service;
pub mod enquiry_service;
pub mod export;
pub mod storage;
