//! One person's relatives, aggregated by where they vote.

use tracing::debug;

use canvass_core::query::InfluenceFilter;
use canvass_core::shape::InfluenceBreakdown;
use canvass_core::CanvassResult;

use crate::store::CanvassStore;

/// Shares are computed against every voter in the graph.
pub async fn person_influence(store: &dyn CanvassStore, filter: &InfluenceFilter) -> CanvassResult<InfluenceBreakdown> {
    let seed = store.person(&filter.national_no).await?;
    if seed.is_none() {
        debug!(national_no = %filter.national_no, "No person with this national number");
        return Ok(InfluenceBreakdown::build(None, Vec::new(), 0));
    }
    let relatives = store.relatives(filter).await?;
    let total = store.total_voters().await?;
    Ok(InfluenceBreakdown::build(seed, relatives, total))
}
