use super::controller::PartitionController;
use super::protocol::*;
use crate::lease::store::LeaseStore;

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_list_leases(
    Extension(store): Extension<Arc<dyn LeaseStore>>,
) -> (StatusCode, Json<LeasesResponse>) {
    match store.list_leases().await {
        Ok(leases) => (StatusCode::OK, Json(LeasesResponse { leases })),
        Err(e) => {
            tracing::error!("Failed to list leases: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LeasesResponse { leases: vec![] }),
            )
        }
    }
}

pub async fn handle_list_partitions(
    Extension(controller): Extension<Arc<PartitionController>>,
) -> (StatusCode, Json<PartitionsResponse>) {
    let stopped = controller
        .outcomes()
        .into_iter()
        .map(|(lease_token, reason)| PartitionOutcome {
            lease_token,
            reason,
        })
        .collect();

    (
        StatusCode::OK,
        Json(PartitionsResponse {
            host: controller.host_name().to_string(),
            running: controller.running_partitions(),
            stopped,
        }),
    )
}
