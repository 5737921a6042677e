use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use leadfunnel_core::{Clock, Lead, LeadFields, LeadId, SystemClock};
use tokio::sync::RwLock;

use crate::{DbError, LeadStore};

/// Process-local lead store. Contents are lost on restart.
#[derive(Debug, Clone)]
pub struct MemoryLeadStore {
    leads: Arc<RwLock<HashMap<LeadId, Lead>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryLeadStore {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            leads: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryLeadStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn create(&self, fields: LeadFields) -> Result<Lead, DbError> {
        let now = self.clock.now();
        let lead = Lead {
            id: LeadId::new(),
            fields,
            created_at: now,
            updated_at: now,
        };
        self.leads.write().await.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>, DbError> {
        Ok(self.leads.read().await.get(&id).cloned())
    }

    async fn update(&self, id: LeadId, fields: LeadFields) -> Result<Lead, DbError> {
        let mut leads = self.leads.write().await;
        let lead = leads.get_mut(&id).ok_or(DbError::NotFound(id))?;
        lead.merge(fields, self.clock.now());
        Ok(lead.clone())
    }
}
