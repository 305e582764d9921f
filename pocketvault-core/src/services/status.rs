//! Status service - record counts per collection

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{EntityKind, KeyStatus};
use crate::ports::Repository;

pub struct StatusService {
    repository: Arc<dyn Repository>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn get_status(&self, key: KeyStatus, backup_count: usize) -> Result<StatusSummary> {
        let mut collections = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            collections.push(CollectionCount {
                kind,
                count: self.repository.count(kind)?,
            });
        }

        Ok(StatusSummary {
            total_records: collections.iter().map(|c| c.count).sum(),
            collections,
            key,
            backup_count,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_records: u64,
    pub collections: Vec<CollectionCount>,
    pub key: KeyStatus,
    pub backup_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CollectionCount {
    pub kind: EntityKind,
    pub count: u64,
}
