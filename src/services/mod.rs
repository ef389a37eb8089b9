// src/services/mod.rs

pub mod aggregation;
pub mod catalog;
pub mod submission;
