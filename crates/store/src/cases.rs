//! Case records: the slug-keyed registry behind the provisioning routes.
//!
//! A case holds the protected phone number a monitor call dials. Minting and
//! number registration are thin; the interesting rule is the conflict check —
//! a different number on file is only replaced with an explicit override.

use std::collections::HashMap;

use parking_lot::RwLock;

use cc_domain::advice::now_ms;
use cc_domain::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub slug: String,
    pub phone_number: Option<String>,
    pub created_at: i64,
}

/// In-memory case registry.
pub struct CaseStore {
    cases: RwLock<HashMap<String, CaseRecord>>,
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseStore {
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a fresh case and return its slug.
    pub fn create(&self) -> String {
        let slug = mint_slug();
        let record = CaseRecord {
            slug: slug.clone(),
            phone_number: None,
            created_at: now_ms(),
        };
        self.cases.write().insert(slug.clone(), record);
        tracing::info!(slug, "case created");
        slug
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.cases.read().contains_key(slug)
    }

    pub fn phone(&self, slug: &str) -> Option<String> {
        self.cases.read().get(slug)?.phone_number.clone()
    }

    /// Register the protected number for a case. A different number already
    /// on file is a conflict unless `replace` is set.
    pub fn set_phone(&self, slug: &str, phone_number: &str, replace: bool) -> Result<()> {
        let mut cases = self.cases.write();
        let record = cases.get_mut(slug).ok_or(Error::NotFound)?;
        match &record.phone_number {
            Some(existing) if existing != phone_number && !replace => Err(Error::Conflict(
                "a different phone number is already on file for this case".into(),
            )),
            _ => {
                record.phone_number = Some(phone_number.to_owned());
                Ok(())
            }
        }
    }
}

/// 12 lowercase hex chars — comfortably inside the 3–64 slug shape.
fn mint_slug() -> String {
    let mut slug = uuid::Uuid::new_v4().simple().to_string();
    slug.truncate(12);
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_domain::call::validate_slug;

    #[test]
    fn minted_slugs_are_valid() {
        let store = CaseStore::new();
        for _ in 0..16 {
            let slug = store.create();
            assert!(validate_slug(&slug), "bad slug {slug}");
            assert!(store.exists(&slug));
        }
    }

    #[test]
    fn phone_registration_and_conflict() {
        let store = CaseStore::new();
        let slug = store.create();

        store.set_phone(&slug, "+14155552671", false).unwrap();
        assert_eq!(store.phone(&slug), Some("+14155552671".into()));

        // Same number again is fine.
        store.set_phone(&slug, "+14155552671", false).unwrap();

        // Different number without override conflicts.
        let err = store.set_phone(&slug, "+14155550000", false).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // With override it replaces.
        store.set_phone(&slug, "+14155550000", true).unwrap();
        assert_eq!(store.phone(&slug), Some("+14155550000".into()));
    }

    #[test]
    fn unknown_case_is_not_found() {
        let store = CaseStore::new();
        assert!(matches!(
            store.set_phone("missing", "+14155552671", false),
            Err(Error::NotFound)
        ));
    }
}
