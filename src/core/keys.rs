//! core::keys
//!
//! Random key generation for records inserted without a key.

use uuid::Uuid;

/// Generate a fresh random key.
///
/// Keys are UUID v4 in simple (unhyphenated, lowercase) form, so they sort
/// and escape without special cases.
pub fn random_key() -> String {
    Uuid::new_v4().simple().to_string()
}
