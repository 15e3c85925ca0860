use crate::error::{Resource, ServiceError};
use crate::models::{Dashboard, Dataset};

/// Something exclusively owned by one user.
pub trait Owned {
    const RESOURCE: Resource;

    fn owner_id(&self) -> i64;
}

impl Owned for Dataset {
    const RESOURCE: Resource = Resource::Dataset;

    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

impl Owned for Dashboard {
    const RESOURCE: Resource = Resource::Dashboard;

    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// The single access rule: a resource is only visible to its owner.
pub fn require_owner<T: Owned>(resource: Option<T>, caller_id: i64) -> Result<T, ServiceError> {
    let resource = resource.ok_or(ServiceError::NotFound(T::RESOURCE))?;
    if resource.owner_id() != caller_id {
        tracing::warn!(
            resource = %T::RESOURCE,
            owner_id = resource.owner_id(),
            caller_id,
            "access denied"
        );
        return Err(ServiceError::Forbidden(T::RESOURCE));
    }
    Ok(resource)
}
