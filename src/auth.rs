//! Identity types, signed claims, and the stateless token service.

pub mod claim;
pub mod id;
pub mod registry;
pub mod secret;
pub mod service;

pub use claim::*;
pub use id::*;
pub use registry::*;
pub use secret::*;
pub use service::*;
