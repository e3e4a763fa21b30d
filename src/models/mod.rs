pub mod availability;
pub mod common;
pub mod meeting;
