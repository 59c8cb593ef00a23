//! Entity marshalling and method invocation on top of the registry and storage.

mod invoke;
mod marshal;
pub use invoke::invoke;
pub use marshal::Marshaller;
