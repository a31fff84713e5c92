//! The logical network container.

use chrono::Utc;
use leaklens_core::{NetworkId, Timestamp};
use serde::{Deserialize, Serialize};

/// A logical water distribution network; the tenant for every other entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Unique id
    pub id: NetworkId,
    /// Optional display name
    pub name: Option<String>,
    /// Creation instant
    pub created_at: Timestamp,
}

impl Network {
    /// Creates a new network.
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self {
            id: NetworkId::new(),
            name,
            created_at: Utc::now(),
        }
    }
}
