//! Access token models: signed claims, stored records, and redacted secrets.

pub mod claims;
pub mod record;
pub mod secret;
