//! Top persons in a location by relatives voting at their own box.

use tracing::debug;

use canvass_core::query::TraversalFilter;
use canvass_core::shape::RankedTable;
use canvass_core::CanvassResult;

use crate::store::CanvassStore;

/// Rank persons in scope by distinct relatives reachable within the filter
/// depth that vote at the same box. Influence percentages are against the
/// voter total of the scope.
pub async fn relative_ranks(
    store: &dyn CanvassStore,
    filter: &TraversalFilter,
    top_n: u32,
) -> CanvassResult<RankedTable> {
    let counts = store.location_counts(&filter.scope).await?;
    let rows = store.relative_counts(filter, top_n).await?;
    if rows.is_empty() {
        debug!(scope = filter.scope.level(), id = filter.scope.id(), "No persons with relatives in scope");
    }
    Ok(RankedTable::build(rows, top_n as usize, counts.num_voters))
}
