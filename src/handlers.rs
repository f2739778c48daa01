// src/handlers.rs

pub mod billing;
