//! Interned string identifiers.
//!
//! A [`StringId`] is the 32-bit FNV-1a hash of a string. Hashing is a
//! `const fn`, so ids for well-known names can be computed at compile time.
//! The reverse table from id back to text lives in a [`StringRegistry`];
//! one process-wide instance backs [`StringId::new`] and [`StringId::as_str`].
//!
//! Distinct strings that hash to the same id are rejected, never aliased.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::StringIdError;

/// Raw hash value carried by a [`StringId`].
pub type StringHash = u32;

/// An interned string, stored as its 32-bit hash.
///
/// `StringId` is plain data, so it can live inside components.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct StringId(pub StringHash);

impl StringId {
    /// FNV-1a 32-bit offset basis.
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

    /// FNV-1a 32-bit prime.
    const FNV_PRIME: u32 = 0x0100_0193;

    /// The "no string" id.
    pub const NONE: StringId = StringId(0);

    /// Hash `text` without registering it.
    ///
    /// ```text
    /// hash = 0x811c9dc5
    /// for each byte in text.as_bytes():
    ///     hash = (hash XOR byte) * 0x01000193
    /// ```
    #[must_use]
    pub const fn hash(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Intern `text` in the global registry and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`StringIdError::Collision`] if another string owns the hash.
    /// The first owner keeps the id.
    pub fn new(text: &str) -> Result<Self, StringIdError> {
        StringRegistry::global().intern(text).inspect_err(|e| {
            error!(%e, "string id collision");
        })
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn id(self) -> StringHash {
        self.0
    }

    /// Returns the interned text, or `""` if the global registry does not
    /// know this id (never interned, or cleared).
    #[must_use]
    pub fn as_str(self) -> Arc<str> {
        StringRegistry::global()
            .lookup(self)
            .unwrap_or_else(|| Arc::from(""))
    }
}

impl TryFrom<&str> for StringId {
    type Error = StringIdError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match StringRegistry::global().lookup(*self) {
            Some(text) => f.write_str(&text),
            None => write!(f, "#{:08x}", self.0),
        }
    }
}

/// Reverse table from [`StringId`] to the text it was computed from.
#[derive(Debug, Default)]
pub struct StringRegistry {
    table: DashMap<StringHash, Arc<str>>,
}

impl StringRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`StringId::new`].
    pub fn global() -> &'static StringRegistry {
        static GLOBAL: OnceLock<StringRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StringRegistry::new)
    }

    /// Register `text` and return its id. Interning the same text again
    /// returns the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StringIdError::Collision`] if a different string already
    /// owns the hash; the table is left unchanged.
    pub fn intern(&self, text: &str) -> Result<StringId, StringIdError> {
        let id = StringId::hash(text);
        match self.table.entry(id.0) {
            Entry::Occupied(existing) => {
                if existing.get().as_ref() == text {
                    Ok(id)
                } else {
                    Err(StringIdError::Collision {
                        id: id.0,
                        existing: existing.get().to_string(),
                        incoming: text.to_string(),
                    })
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::from(text));
                Ok(id)
            }
        }
    }

    /// Look up the text for `id`.
    #[must_use]
    pub fn lookup(&self, id: StringId) -> Option<Arc<str>> {
        self.table.get(&id.0).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns every registered string, sorted.
    #[must_use]
    pub fn strings(&self) -> Vec<Arc<str>> {
        let mut all: Vec<Arc<str>> = self.table.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort();
        all
    }

    /// Returns the number of registered strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Forget every registered string.
    pub fn clear(&self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(StringId::hash(""), StringId(0x811c_9dc5));
        assert_eq!(StringId::hash("a"), StringId(0xe40c_292c));
    }

    #[test]
    fn test_hash_is_const() {
        const TRANSFORM: StringId = StringId::hash("Transform");
        assert_eq!(TRANSFORM, StringId::hash("Transform"));
        assert_ne!(TRANSFORM, StringId::hash("Name"));
    }

    #[test]
    fn test_intern_is_idempotent() {
        let registry = StringRegistry::new();
        let a = registry.intern("robot").unwrap();
        let b = registry.intern("robot").unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(a).as_deref(), Some("robot"));
    }

    #[test]
    fn test_collision_is_rejected() {
        let registry = StringRegistry::new();
        let id = StringId::hash("liquid");
        registry.table.insert(id.0, Arc::from("forged"));

        let err = registry.intern("liquid").unwrap_err();
        assert_eq!(
            err,
            StringIdError::Collision {
                id: id.0,
                existing: "forged".to_string(),
                incoming: "liquid".to_string(),
            }
        );
        // The first owner is kept.
        assert_eq!(registry.lookup(id).as_deref(), Some("forged"));
    }

    #[test]
    fn test_global_collision_does_not_alias() {
        // FNV-1a 32 collides on these two words.
        assert_eq!(StringId::hash("costarring"), StringId::hash("liquid"));
        let first = StringId::new("costarring").unwrap();
        assert!(matches!(
            StringId::new("liquid"),
            Err(StringIdError::Collision { existing, .. }) if existing == "costarring"
        ));
        assert!(StringId::try_from("liquid").is_err());
        assert_eq!(&*first.as_str(), "costarring");
    }

    #[test]
    fn test_cleared_registry_loses_text() {
        let registry = StringRegistry::new();
        let id = registry.intern("lidar").unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup(id).is_none());
    }

    #[test]
    fn test_global_round_trip() {
        let id = StringId::new("string_id_global_round_trip").unwrap();
        assert_eq!(&*id.as_str(), "string_id_global_round_trip");
        assert_eq!(id, StringId::hash("string_id_global_round_trip"));
        assert_eq!(id.to_string(), "string_id_global_round_trip");
    }

    #[test]
    fn test_unknown_id_falls_back_to_empty() {
        let id = StringId::hash("string_id_never_interned_anywhere");
        assert_eq!(&*id.as_str(), "");
        assert!(id.to_string().starts_with('#'));
    }

    #[test]
    fn test_strings_sorted() {
        let registry = StringRegistry::new();
        registry.intern("b").unwrap();
        registry.intern("a").unwrap();
        let all = registry.strings();
        assert_eq!(all.iter().map(|s| s.as_ref()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
