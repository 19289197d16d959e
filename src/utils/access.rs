use mongodb::bson::oid::ObjectId;

use crate::middleware::auth::AuthUser;
use crate::models::Role;
use crate::utils::AppError;

/// Ownership guard: the car's owner or any admin may mutate a car and its services.
pub fn can_modify(requester: &AuthUser, owner: &ObjectId) -> bool {
    requester.id == *owner || requester.role == Role::Admin
}

/// `action` completes the message "Not authorized to ...".
pub fn ensure_can_modify(requester: &AuthUser, owner: &ObjectId, action: &str) -> Result<(), AppError> {
    if can_modify(requester, owner) {
        Ok(())
    } else {
        log::warn!(
            "🚫 User {} ({}) denied: {} (owner {})",
            requester.id,
            requester.role,
            action,
            owner
        );
        Err(AppError::forbidden(format!("Not authorized to {}", action)))
    }
}
