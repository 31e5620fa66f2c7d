// Registration lifecycle

pub mod service;

pub use service::RegistrationService;
