//! Company profile storage. One profile per company; lookups by either the
//! profile id or the owning company id.

use hashbrown::HashMap;
use std::sync::RwLock;

use domain::CompanyProfile;

use crate::backend::{BackendConfig, StoreBackend};
use crate::{decode_entity, encode_entity, StoreError};

const PROFILE_PREFIX: &str = "profile/";

pub struct ProfileStore {
    backend: Box<dyn StoreBackend>,
    company_index: RwLock<HashMap<String, String>>,
}

impl ProfileStore {
    pub fn new(backend_cfg: BackendConfig) -> Result<Self, StoreError> {
        Ok(Self {
            backend: backend_cfg.build()?,
            company_index: RwLock::new(HashMap::new()),
        })
    }

    pub fn upsert(&self, profile: &CompanyProfile) -> Result<(), StoreError> {
        profile
            .validate()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        {
            let mut companies = self.company_index.write().expect("company index poisoned");
            if let Some(existing) = companies.get(&profile.company_id) {
                if existing != &profile.id {
                    return Err(StoreError::Backend(format!(
                        "company {} already owns profile {existing}",
                        profile.company_id
                    )));
                }
            }
            companies.insert(profile.company_id.clone(), profile.id.clone());
        }

        self.backend
            .put(&format!("{PROFILE_PREFIX}{}", profile.id), &encode_entity(profile)?)
    }

    pub fn get(&self, profile_id: &str) -> Result<Option<CompanyProfile>, StoreError> {
        match self.backend.get(&format!("{PROFILE_PREFIX}{profile_id}"))? {
            Some(data) => Ok(Some(decode_entity(&data)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_company(&self, company_id: &str) -> Result<Option<CompanyProfile>, StoreError> {
        let profile_id = {
            let companies = self.company_index.read().expect("company index poisoned");
            companies.get(company_id).cloned()
        };
        match profile_id {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }
}
