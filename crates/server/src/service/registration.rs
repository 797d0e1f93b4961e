//! Account registration.

use super::{Service, ServiceError};
use crate::store::StoreError;

impl Service {
    /// Create an identity for `handle` with the bcrypt hash of `password`.
    pub async fn register(&self, handle: &str, password: &str) -> Result<(), ServiceError> {
        if handle.is_empty() {
            return Err(ServiceError::InvalidHandle);
        }

        let hashed = bcrypt::hash(password, self.password_mode.cost())
            .map_err(|e| ServiceError::Internal(format!("failed to hash password: {e}")))?;

        match self
            .identities
            .insert_identity(handle, hashed.as_bytes())
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::UniqueViolation) => Err(ServiceError::HandleExists),
            Err(e) => Err(ServiceError::Internal(format!(
                "failed to insert account: {e}"
            ))),
        }
    }
}
