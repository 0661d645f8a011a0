//! Authentication module

mod context;
mod extractors;
pub mod middleware;

pub use context::AuthContext;
pub use extractors::{Auth, AuthRejection};
pub use middleware::{AuthError, AuthState, require_auth};
