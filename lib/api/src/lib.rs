pub mod rest;

pub use rest::{RestApi, ServiceConfig};
