//! Identifiers, redacted secrets, short-lived credentials, and persisted refresh records.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{credential::*, refresh::*, secret::*};
