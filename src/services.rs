// src/services.rs

pub mod billing_pipeline;
pub mod gateway;
pub mod locks;
pub mod messenger;
pub mod month_status_service;
pub mod notification_service;
pub mod reconcile_service;
pub mod reminder_service;
pub mod schedule;
pub mod scheduler;
pub mod templates;

pub use billing_pipeline::BillingPipeline;
pub use month_status_service::MonthStatusService;
pub use notification_service::NotificationService;
pub use reconcile_service::ReconcileService;
pub use reminder_service::ReminderService;
