//! A person's family neighborhood as a graph view.

use canvass_core::query::InfluenceFilter;
use canvass_core::shape::GraphView;
use canvass_core::CanvassResult;

use crate::store::CanvassStore;

/// Most edges fetched per edge kind.
pub const DEFAULT_EDGE_LIMIT: u32 = 500;

pub async fn family_view(store: &dyn CanvassStore, filter: &InfluenceFilter, limit: u32) -> CanvassResult<GraphView> {
    let rows = store.family_edges(filter, limit).await?;
    Ok(GraphView::build(&filter.national_no, rows))
}
