//! Typed wrappers over the external CLIs the demo drives.
//!
//! Each wrapper builds [`Invocation`](crate::runner::Invocation)s and hands
//! them to a [`CommandRunner`](crate::runner::CommandRunner); none of them
//! keep state of their own.

mod aws;
mod helm;
mod kubectl;

pub use aws::{AwsCli, CallerIdentity};
pub use helm::Helm;
pub use kubectl::Kubectl;
