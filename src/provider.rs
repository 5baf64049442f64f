//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` holds validated OAuth metadata for the token-issuing providers: HTTPS-only
//! endpoints, enabled grants, the client authentication mode, and quirks such as the scope
//! delimiter. `strategy` maps token-endpoint failures into the broker error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
