//! Tenant resolution
//!
//! Order, first match wins: tenant header, tenant query parameter, the
//! WhatsApp phone-number-id from the payload, then the configured default
//! tenant. Organizations are cached by tenant id.

use std::sync::Arc;

use careline_core::{Cache, Organization};
use careline_persistence::OrganizationStore;

use crate::AgentError;

/// Tenant hints extracted from one inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantRequest {
    pub header: Option<String>,
    pub query: Option<String>,
    pub phone_number_id: Option<String>,
}

impl TenantRequest {
    pub fn from_phone_number_id(phone_number_id: impl Into<String>) -> Self {
        Self {
            phone_number_id: Some(phone_number_id.into()),
            ..Self::default()
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct TenantResolver {
    store: Arc<dyn OrganizationStore>,
    cache: Arc<dyn Cache<String, Organization>>,
    default_tenant_id: Option<String>,
}

impl TenantResolver {
    pub fn new(
        store: Arc<dyn OrganizationStore>,
        cache: Arc<dyn Cache<String, Organization>>,
        default_tenant_id: Option<String>,
    ) -> Self {
        Self {
            store,
            cache,
            default_tenant_id,
        }
    }

    /// `Ok(None)` when no organization matches any hint
    pub async fn resolve(&self, request: &TenantRequest) -> Result<Option<Organization>, AgentError> {
        for (source, id) in [("header", &request.header), ("query", &request.query)] {
            if let Some(id) = present(id) {
                if let Some(org) = self.by_id(id).await? {
                    tracing::debug!(tenant = %org.id, source, "Tenant resolved");
                    return Ok(Some(org));
                }
                tracing::debug!(tenant = %id, source, "Explicit tenant id not found");
            }
        }

        if let Some(phone_number_id) = present(&request.phone_number_id) {
            if let Some(org) = self.store.find_by_phone_number_id(phone_number_id).await? {
                tracing::debug!(tenant = %org.id, phone_number_id, "Tenant resolved from payload");
                self.cache.set(org.id.clone(), org.clone());
                return Ok(Some(org));
            }
        }

        if let Some(id) = present(&self.default_tenant_id) {
            if let Some(org) = self.by_id(id).await? {
                tracing::debug!(tenant = %org.id, "Falling back to default tenant");
                return Ok(Some(org));
            }
        }

        Ok(None)
    }

    /// Organization by id, served from the cache when fresh
    pub async fn by_id(&self, id: &str) -> Result<Option<Organization>, AgentError> {
        let key = id.to_string();
        if let Some(org) = self.cache.get(&key) {
            return Ok(Some(org));
        }

        let org = self.store.get(id).await?;
        if let Some(org) = &org {
            self.cache.set(key, org.clone());
        }
        Ok(org)
    }

    /// Invalidate one tenant or the whole cache; returns entries dropped
    pub fn refresh(&self, tenant: Option<&str>) -> usize {
        match tenant {
            Some(id) => usize::from(self.cache.invalidate(&id.to_string())),
            None => {
                let dropped = self.cache.len();
                self.cache.clear();
                dropped
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Organization>, AgentError> {
        Ok(self.store.list().await?)
    }
}
