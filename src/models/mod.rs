pub mod key;
pub mod service;
pub mod user;

pub use key::LicenseKey;
pub use service::Service;
pub use user::User;
