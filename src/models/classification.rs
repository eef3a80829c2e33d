//! Retention classification.
//!
//! Every stored payload carries a classification that decides how long it may
//! be kept. Purging happens in a separate process; this module only defines
//! the windows that process relies on.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Public,
    Confidential,
    Secret,
    TopSecret,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Public,
        Classification::Confidential,
        Classification::Secret,
        Classification::TopSecret,
    ];

    /// Days a record of this class may be retained.
    ///
    /// `TOP_SECRET` is 0: purge as soon as it has been delivered.
    pub const fn retention_days(self) -> u32 {
        match self {
            Classification::Public => 365,
            Classification::Confidential => 180,
            Classification::Secret => 90,
            Classification::TopSecret => 0,
        }
    }
}

/// One row of the public retention table.
#[derive(Debug, Serialize)]
pub struct RetentionPolicy {
    pub classification: Classification,
    pub retention_days: u32,
}

impl From<Classification> for RetentionPolicy {
    fn from(classification: Classification) -> Self {
        Self {
            classification,
            retention_days: classification.retention_days(),
        }
    }
}
