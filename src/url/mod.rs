//! URL scope handling for Linkrelay
//!
//! The Scope Filter decides whether a discovered link stays inside the site
//! being crawled. No canonicalization is performed: two URLs that differ
//! only in trailing slash, query order, or fragment are distinct.

mod scope;

pub use scope::{is_internal, netloc};
