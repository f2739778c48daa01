pub mod store;
pub use store::BillingStore;
pub mod pg_store;
pub use pg_store::PgBillingStore;
pub mod contract_repo;
pub use contract_repo::ContractRepository;
pub mod company_repo;
pub use company_repo::CompanyRepository;
pub mod billing_repo;
pub use billing_repo::BillingRepository;
pub mod month_status_repo;
pub use month_status_repo::MonthStatusRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod gateway_link_repo;
pub use gateway_link_repo::GatewayLinkRepository;
