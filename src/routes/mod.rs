pub mod common;
pub mod rest;

pub use common::common_routes;
pub use rest::rest_routes;
