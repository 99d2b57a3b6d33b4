//! Access control for paperflow.

pub mod roles;

pub use roles::{Permissions, Role, RoleTable};
