//! Ensures a scoped MongoDB application user exists.
//!
//! The provisioner reads its target from [`ProvisionRequest`], issues one
//! create-user call through a [`Deployment`] and classifies the reply into an
//! [`Outcome`]. A user that already exists counts as success, so the run is
//! safe to repeat on every start.

pub mod acknowledgement;
pub mod provisioner;
pub mod request;

pub use acknowledgement::{classify, Acknowledgement, Outcome};
pub use provisioner::{Deployment, Provisioner, UserAdmin};
pub use request::{ProvisionRequest, RoleGrant};
