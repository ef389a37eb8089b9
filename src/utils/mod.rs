// src/utils/mod.rs

pub mod api_token;
pub mod hash;
pub mod html;
pub mod identity;
pub mod jwt;
