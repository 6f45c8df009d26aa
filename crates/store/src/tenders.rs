//! Typed tender storage with source-url uniqueness.

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use std::sync::RwLock;

use domain::{Tender, TenderStatus};

use crate::backend::{BackendConfig, StoreBackend};
use crate::{decode_entity, encode_entity, StoreError};

const TENDER_PREFIX: &str = "tender/";

/// CRUD over tenders. `source_url` is enforced unique so re-imports update in
/// place instead of duplicating.
pub struct TenderStore {
    backend: Box<dyn StoreBackend>,
    /// source_url -> tender id, kept in lockstep with the backend.
    url_index: RwLock<HashMap<String, String>>,
}

impl TenderStore {
    pub fn new(backend_cfg: BackendConfig) -> Result<Self, StoreError> {
        Ok(Self {
            backend: backend_cfg.build()?,
            url_index: RwLock::new(HashMap::new()),
        })
    }

    /// Insert or update a tender. A different tender already holding the same
    /// `source_url` is a conflict.
    pub fn upsert(&self, tender: &Tender) -> Result<(), StoreError> {
        tender
            .validate()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        {
            let mut urls = self.url_index.write().expect("url index lock poisoned");
            if let Some(existing) = urls.get(&tender.source_url) {
                if existing != &tender.id {
                    return Err(StoreError::DuplicateSourceUrl(tender.source_url.clone()));
                }
            }
            urls.insert(tender.source_url.clone(), tender.id.clone());
        }

        self.backend
            .put(&format!("{TENDER_PREFIX}{}", tender.id), &encode_entity(tender)?)
    }

    pub fn get(&self, tender_id: &str) -> Result<Option<Tender>, StoreError> {
        match self.backend.get(&format!("{TENDER_PREFIX}{tender_id}"))? {
            Some(data) => Ok(Some(decode_entity(&data)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, tender_id: &str) -> Result<(), StoreError> {
        if let Some(tender) = self.get(tender_id)? {
            self.url_index
                .write()
                .expect("url index lock poisoned")
                .remove(&tender.source_url);
        }
        self.backend.delete(&format!("{TENDER_PREFIX}{tender_id}"))
    }

    /// Visit every stored tender. Decode failures abort the scan.
    pub fn scan(
        &self,
        visitor: &mut dyn FnMut(&Tender) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.backend.scan_prefix(TENDER_PREFIX, &mut |_key, data| {
            let tender: Tender = decode_entity(data)?;
            visitor(&tender)
        })
    }

    /// Tenders that read as published at `now`, most recently published
    /// first. This is the candidate pool for the rule-only path, so the
    /// ordering has to be reproducible: ties on `published_at` break by id.
    pub fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Tender>, StoreError> {
        let mut published = Vec::new();
        self.scan(&mut |tender| {
            if tender.effective_status(now) == TenderStatus::Published {
                published.push(tender.clone());
            }
            Ok(())
        })?;
        published.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(published)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        self.backend.scan_prefix(TENDER_PREFIX, &mut |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }
}
