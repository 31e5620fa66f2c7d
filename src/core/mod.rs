// Core domain: errors, models and collaborator traits

pub mod errors;
pub mod models;
pub mod traits;
