//! CELF influence-maximization ranking over a location's family graph.

use tracing::info;

use canvass_core::query::{CelfParams, LocationScope, RelationshipSet};
use canvass_core::shape::{rank_by_spread, InfluenceRank};
use canvass_core::CanvassResult;

use crate::store::CanvassStore;

pub async fn influence_ranking(
    store: &dyn CanvassStore,
    scope: &LocationScope,
    relationships: &RelationshipSet,
    params: &CelfParams,
) -> CanvassResult<Vec<InfluenceRank>> {
    params.validate()?;
    let rows = store.influence_spread(scope, relationships, params).await?;
    info!(
        scope = scope.level(),
        seeds = rows.len(),
        seed_set_size = params.seed_set_size,
        "CELF ranking complete"
    );
    Ok(rank_by_spread(rows))
}
