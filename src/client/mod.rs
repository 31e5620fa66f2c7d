// Outbound HTTP clients for remote collaborators

pub mod callback_client;
pub mod identity_client;

pub use callback_client::HttpCallbackClient;
pub use identity_client::HttpIdentityVerifier;
