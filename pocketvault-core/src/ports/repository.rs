//! Repository port - database abstraction

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{EntityKind, EntityRecord};

/// Persistence abstraction the services depend on.
///
/// Backup and restore only need the per-collection list/create/delete-all
/// operations; the password API also reads and deletes single records.
/// Credential secrets cross this boundary already encrypted.
pub trait Repository: Send + Sync {
    /// List every record of a collection
    fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    /// Insert a record, keeping its id
    fn create_entity(&self, record: &EntityRecord) -> Result<()>;

    /// Delete every record of a collection, returning how many were removed
    fn delete_all(&self, kind: EntityKind) -> Result<u64>;

    /// Get a single record by id
    fn get_entity(&self, kind: EntityKind, id: Uuid) -> Result<Option<EntityRecord>>;

    /// Delete a single record, returning whether it existed
    fn delete_entity(&self, kind: EntityKind, id: Uuid) -> Result<bool>;

    /// Number of records in a collection
    fn count(&self, kind: EntityKind) -> Result<u64> {
        Ok(self.list_entities(kind)?.len() as u64)
    }
}
