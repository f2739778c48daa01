pub mod date_only;
pub mod error;
