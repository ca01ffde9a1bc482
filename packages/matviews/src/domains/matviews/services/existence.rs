use serde_json::json;

use super::Services;
use crate::common::{EnvelopeError, MatViewError, ServiceResponse, ServiceStatus};
use crate::domains::matviews::models::MatViewDefinition;

impl Services {
    /// Check whether the definition's physical view exists.
    ///
    /// Queries `pg_matviews` by (schema, name); no side effects. Only a
    /// connection-level failure produces an error envelope.
    pub async fn view_exists(
        &self,
        definition: &MatViewDefinition,
    ) -> Result<ServiceResponse, MatViewError> {
        let request = json!({
            "view": self.qualified(&definition.name),
            "operation": "existence_check",
        });

        match self.matview_exists(&definition.name).await {
            Ok(exists) => Ok(ServiceResponse::ok(
                ServiceStatus::Checked,
                request,
                json!({ "exists": exists }),
            )),
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Existence check failed");
                Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)))
            }
        }
    }
}
