//! Auth-domain identifiers, scope sets, registered clients, and token models.

pub mod client;
pub mod id;
pub mod scope;
pub mod token;

pub use client::*;
pub use id::*;
pub use scope::*;
pub use token::{claims::*, record::*, secret::*};
