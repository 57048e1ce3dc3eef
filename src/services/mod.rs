pub mod auth;
pub mod ledger;
pub mod registry;
pub mod validation;

pub use auth::{AuthService, LoginError, RegisterError, Session};
pub use ledger::{CreateKeyError, KeyLedger};
pub use registry::ServiceRegistry;
pub use validation::{ValidationEngine, Verdict, VerifyRequest};
