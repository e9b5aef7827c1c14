use log::{info, warn};

use crate::api::client::ApiClient;
use crate::api::models::Partner;
use crate::error::Result;
use crate::storage::PartnerCache;

/// The list of doctors the user can open a conversation with.
pub struct Directory {
    partners: Vec<Partner>,
    cache: Option<PartnerCache>,
}

impl Directory {
    pub fn new(cache: Option<PartnerCache>) -> Self {
        let partners = match cache.as_ref().map(|c| c.get_partners(None)) {
            Some(Ok(cached)) => cached,
            Some(Err(e)) => {
                warn!("Could not read doctor cache: {}", e);
                Vec::new()
            }
            None => Vec::new(),
        };
        Self { partners, cache }
    }

    pub fn partners(&self) -> &[Partner] {
        &self.partners
    }

    pub fn find(&self, id: &str) -> Option<&Partner> {
        self.partners.iter().find(|p| p.id == id)
    }

    /// The listed doctor with this id, or a bare entry named after the id when
    /// the directory does not know them yet.
    pub fn resolve(&self, id: &str) -> Partner {
        self.find(id).cloned().unwrap_or_else(|| Partner {
            id: id.to_string(),
            first_name: id.to_string(),
            last_name: String::new(),
            email: String::new(),
            specialty: None,
        })
    }

    /// Refresh from the API. On failure the current list is kept and the
    /// error is returned for the caller to surface.
    pub async fn load(&mut self, client: &ApiClient, current_user_id: &str) -> Result<&[Partner]> {
        match client.partners(current_user_id).await {
            Ok((partners, raws)) => {
                info!("Loaded {} doctors", partners.len());
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store_partners(&partners, Some(&raws)) {
                        warn!("Could not update doctor cache: {}", e);
                    }
                }
                self.partners = partners;
                Ok(&self.partners)
            }
            Err(e) => {
                warn!("Loading doctors failed, keeping {} known: {}", self.partners.len(), e);
                Err(e)
            }
        }
    }
}

/// Case-insensitive match on full name, email or specialty. The term is used
/// as given, whitespace included; an empty term returns everything. The input
/// slice is left untouched.
pub fn filter(partners: &[Partner], term: &str) -> Vec<Partner> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return partners.to_vec();
    }
    partners
        .iter()
        .filter(|p| {
            p.full_name().to_lowercase().contains(&needle)
                || p.email.to_lowercase().contains(&needle)
                || p.specialty.as_deref().is_some_and(|s| s.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
