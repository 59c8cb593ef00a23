mod identity;

pub use identity::{CallerIdentity, USER_IDENTITY_HEADER};
