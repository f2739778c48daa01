pub mod auth;
pub mod billing;
pub mod company;
pub mod contract;
pub mod gateway;
pub mod notification;
