//! Schema versioning
//!
//! Every store records the layout version it was written with. Opening a
//! store written by a newer build fails instead of misreading its records.

use crate::error::{GraphError, Result};
use rocksdb::DB;

/// Schema version stored in metadata
pub(crate) const SCHEMA_VERSION_KEY: &[u8] = b"_schema_version";
pub const CURRENT_VERSION: u32 = 1;

/// Check the stored schema version, stamping fresh databases
pub fn ensure_schema(db: &DB) -> Result<u32> {
    let stored = match db.get(SCHEMA_VERSION_KEY)? {
        Some(bytes) => {
            let bytes_slice: &[u8] = bytes.as_ref();
            let version_bytes: [u8; 4] = bytes_slice
                .try_into()
                .map_err(|_| GraphError::other("Invalid schema version format"))?;
            Some(u32::from_le_bytes(version_bytes))
        }
        None => None,
    };

    match stored {
        None => {
            log::debug!("Stamping schema version {}", CURRENT_VERSION);
            db.put(SCHEMA_VERSION_KEY, CURRENT_VERSION.to_le_bytes())?;
            db.flush()?;
            Ok(CURRENT_VERSION)
        }
        Some(version) if version == CURRENT_VERSION => Ok(version),
        // v1 is the first layout, so any other version is unreadable
        Some(version) => Err(GraphError::IncompatibleSchema {
            found: version,
            supported: CURRENT_VERSION,
        }),
    }
}
