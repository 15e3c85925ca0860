mod dashboards;
mod datasets;

pub use dashboards::DashboardService;
pub use datasets::DatasetService;

use crate::error::ServiceError;

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}
