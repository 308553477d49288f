//! Location pickers and scope totals.

use canvass_core::query::LocationScope;
use canvass_core::shape::{LocationCounts, LocationOption};
use canvass_core::CanvassResult;

use crate::store::CanvassStore;

pub async fn circles(store: &dyn CanvassStore) -> CanvassResult<Vec<LocationOption>> {
    store.circles().await
}

pub async fn centers(store: &dyn CanvassStore, circle_id: &str) -> CanvassResult<Vec<LocationOption>> {
    store.centers(circle_id).await
}

pub async fn boxes(store: &dyn CanvassStore, circle_id: &str, center_id: &str) -> CanvassResult<Vec<LocationOption>> {
    store.boxes(circle_id, center_id).await
}

pub async fn location_counts(store: &dyn CanvassStore, scope: &LocationScope) -> CanvassResult<LocationCounts> {
    store.location_counts(scope).await
}
