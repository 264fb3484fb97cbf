//! Typed resource quantities and the keyed lists hosts and VMs trade in.
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`unit`] | [`ResourceKind`], [`Resource`] |
//! | [`list`] | [`ResourceList`] |

pub mod list;
pub mod unit;

pub use list::ResourceList;
pub use unit::{Resource, ResourceKind};
