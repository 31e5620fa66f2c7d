// Authentication: admission gate and session token handling

pub mod gate;
pub mod session_token;

pub use gate::{auth_gate, AuthState};
