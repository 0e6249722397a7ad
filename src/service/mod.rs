pub mod links;

pub use links::{LinkService, ServiceError};
