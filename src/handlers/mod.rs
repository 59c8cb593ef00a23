//! Request dispatch: verb x shape handler tables and the default handlers.

pub mod dispatch;
pub mod verbs;
pub use dispatch::*;
