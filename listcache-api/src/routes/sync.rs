//! Change-stream ingestion endpoint.
//!
//! Any non-2xx answer leaves the batch unacknowledged, so the delivery layer
//! sends it again. Undecodable records do not fail the batch; they are
//! reported in the response and logged.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use listcache_core::{StreamBatch, SyncError};
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics::with_metrics;
use crate::types::SyncResponse;

/// POST /property-sync - Apply a change-stream batch
#[utoipa::path(
    post,
    path = "/property-sync",
    tag = "Sync",
    request_body = StreamBatch,
    responses(
        (status = 200, description = "Batch applied", body = SyncResponse),
        (status = 400, description = "Body is not a change batch", body = ApiError),
        (status = 503, description = "Cache store failed; redeliver the batch", body = ApiError),
    ),
)]
pub async fn apply_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StreamBatch>, JsonRejection>,
) -> ApiResult<Json<SyncResponse>> {
    let Json(batch) = payload?;

    match state.processor.process_batch(&batch).await {
        Ok(report) => {
            with_metrics(|m| m.record_sync_batch(report.upserted, report.removed, report.dropped, true));
            Ok(Json(SyncResponse::from(report)))
        }
        Err(err) => {
            with_metrics(|m| m.record_sync_batch(0, 0, 0, false));
            error!(key = %err.key(), error = %err, "Change batch aborted");
            Err(sync_failure(&err))
        }
    }
}

/// Every store failure asks for redelivery, refusals included.
fn sync_failure(err: &SyncError) -> ApiError {
    let stage = match err {
        SyncError::Projection { .. } => "projection",
        SyncError::Index { .. } => "index",
    };
    ApiError::service_unavailable("Change batch could not be applied; redeliver").with_details(
        serde_json::json!({
            "key": err.key().as_str(),
            "stage": stage,
            "transient": err.is_transient(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use listcache_core::{CacheKey, ChangeOperation, StorageError};

    #[test]
    fn test_rejected_write_still_asks_for_redelivery() {
        let err = SyncError::Projection {
            key: CacheKey::from_stored("AG1#AGT1"),
            operation: ChangeOperation::Insert,
            source: StorageError::Rejected {
                operation: "HSET".to_string(),
                reason: "OOM command not allowed".to_string(),
            },
        };
        let api = sync_failure(&err);
        assert_eq!(api.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let details = api.details.unwrap();
        assert_eq!(details["stage"], "projection");
        assert_eq!(details["transient"], false);
    }
}
