pub mod filters;

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod customer_repo;
pub use customer_repo::CustomerRepository;
pub mod enquiry_repo;
pub use enquiry_repo::EnquiryRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
pub mod activity_repo;
pub use activity_repo::ActivityRepository;
