//! Identity Module
//!
//! Role dispatch is resolved here once per session and exposed as a single
//! [`UserRole`] value, instead of each consumer branching on raw metadata.

pub mod identity;
pub mod resolver;

pub use identity::{UserIdentity, UserRole};
pub use resolver::IdentityResolver;
