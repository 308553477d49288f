//! Query shapes for the interactive read path.
//!
//! The family path pattern always spans `1..MAX_DEPTH` hops over every family
//! relationship type; the requested depth and type subset are applied as
//! bound predicates on the path, so any hop may use any selected type.

use crate::error::{CanvassError, CanvassResult};

use super::cypher::CypherQuery;
use super::filter::{CelfParams, InfluenceFilter, LocationScope, RelationshipSet, TraversalFilter};

/// Variable-length family pattern. The upper bound matches `MAX_DEPTH`.
pub const FAMILY_PATTERN: &str = "[:FATHER|MOTHER|SPOUSE|SIBLING*1..5]";

const FAMILY_PREDICATE: &str =
    "length(path) <= $max_depth AND all(r IN relationships(path) WHERE type(r) IN $relationship_types)";

const PERSON_COLUMNS: &str = "person.national_no AS national_no,
            person.full_name AS full_name,
            person.first_name AS first_name,
            person.father_name AS father_name,
            person.grand_name AS grand_name,
            person.family_name AS family_name,
            person.phone_number AS phone_number,
            person.primary_key AS primary_key,
            coalesce(person.synthetic, false) AS synthetic";

fn require(value: &str, what: &str) -> CanvassResult<()> {
    if value.trim().is_empty() {
        Err(CanvassError::invalid_filter(format!("{} is required", what)))
    } else {
        Ok(())
    }
}

/// MATCH clauses binding `person` and the `box` they vote at, within scope.
fn scope_match(scope: &LocationScope) -> &'static str {
    match scope {
        LocationScope::Box(_) => {
            "MATCH (box:Box) WHERE elementId(box) = $location_id
        MATCH (person:Person)-[:VOTES_AT]->(box)"
        }
        LocationScope::Center(_) => {
            "MATCH (center:Center) WHERE elementId(center) = $location_id
        MATCH (center)-[:HAS_BOX]->(box:Box)<-[:VOTES_AT]-(person:Person)"
        }
        LocationScope::Circle(_) => {
            "MATCH (circle:Circle) WHERE elementId(circle) = $location_id
        MATCH (circle)-[:HAS_CENTER]->(:Center)-[:HAS_BOX]->(box:Box)<-[:VOTES_AT]-(person:Person)"
        }
    }
}

/// All circles, for the location picker.
pub fn list_circles() -> CypherQuery {
    CypherQuery::new(
        "MATCH (c:Circle)
        RETURN elementId(c) AS id, c.name AS name
        ORDER BY name ASC",
    )
}

/// Centers of one circle.
pub fn list_centers(circle_id: &str) -> CanvassResult<CypherQuery> {
    require(circle_id, "circle")?;
    Ok(CypherQuery::new(
        "MATCH (c:Circle)-[:HAS_CENTER]->(ce:Center)
        WHERE elementId(c) = $circle_id
        RETURN elementId(ce) AS id, ce.name AS name
        ORDER BY name ASC",
    )
    .param("circle_id", circle_id))
}

/// Boxes of one center within one circle.
pub fn list_boxes(circle_id: &str, center_id: &str) -> CanvassResult<CypherQuery> {
    require(circle_id, "circle")?;
    require(center_id, "center")?;
    Ok(CypherQuery::new(
        "MATCH (c:Circle)-[:HAS_CENTER]->(ce:Center)-[:HAS_BOX]->(b:Box)
        WHERE elementId(c) = $circle_id AND elementId(ce) = $center_id
        RETURN elementId(b) AS id, b.name AS name
        ORDER BY name ASC",
    )
    .param("circle_id", circle_id)
    .param("center_id", center_id))
}

/// Number of centers, boxes and voters within a scope.
pub fn location_counts(scope: &LocationScope) -> CypherQuery {
    let text = match scope {
        LocationScope::Box(_) => {
            "MATCH (box:Box) WHERE elementId(box) = $location_id
        OPTIONAL MATCH (person:Person)-[:VOTES_AT]->(box)
        RETURN 1 AS num_centers, 1 AS num_boxes, count(DISTINCT person) AS num_voters"
        }
        LocationScope::Center(_) => {
            "MATCH (center:Center) WHERE elementId(center) = $location_id
        OPTIONAL MATCH (center)-[:HAS_BOX]->(box:Box)
        OPTIONAL MATCH (person:Person)-[:VOTES_AT]->(box)
        RETURN 1 AS num_centers, count(DISTINCT box) AS num_boxes, count(DISTINCT person) AS num_voters"
        }
        LocationScope::Circle(_) => {
            "MATCH (circle:Circle) WHERE elementId(circle) = $location_id
        OPTIONAL MATCH (circle)-[:HAS_CENTER]->(center:Center)
        OPTIONAL MATCH (center)-[:HAS_BOX]->(box:Box)
        OPTIONAL MATCH (person:Person)-[:VOTES_AT]->(box)
        RETURN count(DISTINCT center) AS num_centers, count(DISTINCT box) AS num_boxes, count(DISTINCT person) AS num_voters"
        }
    };
    CypherQuery::new(text).param("location_id", scope.id())
}

/// Voters registered at any box.
pub fn total_voters() -> CypherQuery {
    CypherQuery::new(
        "MATCH (person:Person)-[:VOTES_AT]->(:Box)
        RETURN count(DISTINCT person) AS num_voters",
    )
}

/// Top persons in scope by distinct relatives who vote at the person's own box.
pub fn relative_ranks(filter: &TraversalFilter, limit: u32) -> CanvassResult<CypherQuery> {
    if limit == 0 {
        return Err(CanvassError::invalid_filter("limit must be at least 1"));
    }
    let text = format!(
        "{scope}
        MATCH path = (person){pattern}->(relative:Person)
        WHERE {predicate} AND relative <> person
        MATCH (relative)-[:VOTES_AT]->(box)
        WITH person, count(DISTINCT relative) AS num_relatives
        RETURN {columns},
            num_relatives
        ORDER BY num_relatives DESC, national_no ASC
        LIMIT $limit",
        scope = scope_match(&filter.scope),
        pattern = FAMILY_PATTERN,
        predicate = FAMILY_PREDICATE,
        columns = PERSON_COLUMNS,
    );
    Ok(CypherQuery::new(text)
        .param("location_id", filter.scope.id())
        .param("max_depth", filter.depth.get())
        .param("relationship_types", filter.relationships.names())
        .param("limit", limit))
}

/// One person with their voting-location chain.
pub fn person_lookup(national_no: &str) -> CanvassResult<CypherQuery> {
    require(national_no, "national number")?;
    Ok(CypherQuery::new(format!(
        "MATCH (person:Person {{national_no: $national_no}})
        OPTIONAL MATCH (person)-[:VOTES_AT]->(box:Box)<-[:HAS_BOX]-(center:Center)<-[:HAS_CENTER]-(circle:Circle)
        RETURN {columns},
            circle.name AS circle,
            center.name AS center,
            box.name AS box
        LIMIT 1",
        columns = PERSON_COLUMNS,
    ))
    .param("national_no", national_no.trim()))
}

/// Relatives of one person within depth, each joined to its
/// Box → Center → Circle chain. One row per relative at its shortest distance.
pub fn person_influence(filter: &InfluenceFilter) -> CypherQuery {
    let text = format!(
        "MATCH (seed:Person {{national_no: $national_no}})
        MATCH path = (seed){pattern}->(person:Person)
        WHERE {predicate} AND person <> seed
        WITH person, min(length(path)) AS distance
        OPTIONAL MATCH (person)-[:VOTES_AT]->(box:Box)<-[:HAS_BOX]-(center:Center)<-[:HAS_CENTER]-(circle:Circle)
        RETURN {columns},
            distance,
            circle.name AS circle,
            center.name AS center,
            box.name AS box
        ORDER BY distance ASC, national_no ASC",
        pattern = FAMILY_PATTERN,
        predicate = FAMILY_PREDICATE,
        columns = PERSON_COLUMNS,
    );
    CypherQuery::new(text)
        .param("national_no", filter.national_no.as_str())
        .param("max_depth", filter.depth.get())
        .param("relationship_types", filter.relationships.names())
}

fn endpoint_columns(node: &str, prefix: &str) -> String {
    format!(
        "elementId({node}) AS {prefix}_id,
            labels({node})[0] AS {prefix}_label,
            coalesce({node}.national_no, {node}.name) AS {prefix}_key,
            coalesce({node}.full_name, {node}.name) AS {prefix}_name,
            coalesce({node}.synthetic, false) AS {prefix}_synthetic"
    )
}

/// Family edges around one person, plus each member's VOTES_AT edge, as
/// flat edge rows for the graph view.
pub fn family_graph(filter: &InfluenceFilter, limit: u32) -> CypherQuery {
    let columns = format!(
        "{},
            {},
            type(rel) AS rel_type",
        endpoint_columns("a", "from"),
        endpoint_columns("b", "to"),
    );
    let text = format!(
        "MATCH (seed:Person {{national_no: $national_no}})
        MATCH path = (seed){pattern}->(:Person)
        WHERE {predicate}
        UNWIND relationships(path) AS rel
        WITH DISTINCT rel
        WITH rel, startNode(rel) AS a, endNode(rel) AS b
        RETURN {columns}
        LIMIT $limit
        UNION
        MATCH (seed:Person {{national_no: $national_no}})
        OPTIONAL MATCH path = (seed){pattern}->(relative:Person)
        WHERE {predicate}
        WITH seed, collect(DISTINCT relative) AS relatives
        UNWIND [seed] + relatives AS member
        MATCH (member)-[rel:VOTES_AT]->(:Box)
        WITH DISTINCT rel
        WITH rel, startNode(rel) AS a, endNode(rel) AS b
        RETURN {columns}
        LIMIT $limit",
        pattern = FAMILY_PATTERN,
        predicate = FAMILY_PREDICATE,
        columns = columns,
    );
    CypherQuery::new(text)
        .param("national_no", filter.national_no.as_str())
        .param("max_depth", filter.depth.get())
        .param("relationship_types", filter.relationships.names())
        .param("limit", limit.max(1))
}

/// The three statements of a CELF ranking run: project the scoped family
/// graph, stream CELF over it, drop the projection.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceRankingPlan {
    pub graph_name: String,
    pub project: CypherQuery,
    pub stream: CypherQuery,
    pub drop: CypherQuery,
}

pub fn influence_ranking(
    scope: &LocationScope,
    relationships: &RelationshipSet,
    params: &CelfParams,
    graph_name: &str,
) -> CanvassResult<InfluenceRankingPlan> {
    params.validate()?;
    require(graph_name, "projection name")?;

    let project = CypherQuery::new(format!(
        "{scope}
        WITH DISTINCT person AS source
        OPTIONAL MATCH (source)-[r:FATHER|MOTHER|SPOUSE|SIBLING]->(target:Person)
        WHERE type(r) IN $relationship_types
        WITH gds.graph.project($graph_name, source, target) AS g
        RETURN g.graphName AS graph_name, g.nodeCount AS node_count, g.relationshipCount AS relationship_count",
        scope = scope_match(scope),
    ))
    .param("location_id", scope.id())
    .param("relationship_types", relationships.names())
    .param("graph_name", graph_name);

    let stream = CypherQuery::new(format!(
        "CALL gds.influenceMaximization.celf.stream($graph_name, {{
            seedSetSize: $seed_set_size,
            monteCarloSimulations: $monte_carlo_simulations,
            propagationProbability: $propagation_probability
        }})
        YIELD nodeId, spread
        WITH gds.util.asNode(nodeId) AS person, spread
        RETURN {columns},
            spread
        ORDER BY spread DESC",
        columns = PERSON_COLUMNS,
    ))
    .param("graph_name", graph_name)
    .param("seed_set_size", params.seed_set_size)
    .param("monte_carlo_simulations", params.monte_carlo_simulations)
    .param("propagation_probability", params.propagation_probability);

    let drop = CypherQuery::new(
        "CALL gds.graph.drop($graph_name, false) YIELD graphName
        RETURN graphName AS graph_name",
    )
    .param("graph_name", graph_name);

    Ok(InfluenceRankingPlan {
        graph_name: graph_name.to_string(),
        project,
        stream,
        drop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::cypher::ParamValue;
    use crate::query::filter::{Relationship, MAX_DEPTH};

    fn box_filter(rels: &[Relationship], depth: u32) -> TraversalFilter {
        TraversalFilter::new(LocationScope::Box("4:abc:17".into()), rels.iter().copied(), depth).unwrap()
    }

    #[test]
    fn test_pattern_bound_matches_max_depth() {
        assert!(FAMILY_PATTERN.ends_with(&format!("*1..{}]", MAX_DEPTH)));
    }

    #[test]
    fn test_father_only_depth_one() {
        let q = relative_ranks(&box_filter(&[Relationship::Father], 1), 10).unwrap();
        assert_eq!(q.get("max_depth"), Some(&ParamValue::Int(1)));
        assert_eq!(
            q.get("relationship_types"),
            Some(&ParamValue::StrList(vec!["FATHER".into()]))
        );
        assert_eq!(q.get("location_id"), Some(&ParamValue::Str("4:abc:17".into())));
        assert!(q.text.contains("elementId(box) = $location_id"));
        assert!(q.text.contains("MATCH (relative)-[:VOTES_AT]->(box)"));
        assert!(q.text.contains("length(path) <= $max_depth"));
    }

    #[test]
    fn test_depth_two_widens_only_the_bound() {
        let one = relative_ranks(&box_filter(&[Relationship::Father], 1), 10).unwrap();
        let two = relative_ranks(&box_filter(&[Relationship::Father], 2), 10).unwrap();
        assert_eq!(one.text, two.text);
        assert_eq!(two.get("max_depth"), Some(&ParamValue::Int(2)));
    }

    #[test]
    fn test_scope_levels_anchor_on_the_selected_node() {
        let center = TraversalFilter::new(LocationScope::Center("c1".into()), Relationship::ALL, 2).unwrap();
        let q = relative_ranks(&center, 10).unwrap();
        assert!(q.text.contains("elementId(center) = $location_id"));
        assert!(!q.text.contains("elementId(box)"));

        let circle = TraversalFilter::new(LocationScope::Circle("c0".into()), Relationship::ALL, 2).unwrap();
        let q = relative_ranks(&circle, 10).unwrap();
        assert!(q.text.contains("elementId(circle) = $location_id"));
    }

    #[test]
    fn test_user_values_never_reach_text() {
        let hostile = "x') DETACH DELETE n //";
        let filter = TraversalFilter::new(LocationScope::Box(hostile.into()), Relationship::ALL, 3).unwrap();
        let q = relative_ranks(&filter, 10).unwrap();
        assert!(!q.text.contains("DETACH"));

        let influence = InfluenceFilter::new(hostile, Relationship::ALL, 3).unwrap();
        assert!(!person_influence(&influence).text.contains("DETACH"));
        assert!(!family_graph(&influence, 100).text.contains("DETACH"));
        assert!(!person_lookup(hostile).unwrap().text.contains("DETACH"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(relative_ranks(&box_filter(&[Relationship::Father], 1), 0).is_err());
    }

    #[test]
    fn test_picker_queries_validate_ids() {
        assert!(list_centers("").is_err());
        assert!(list_boxes("c", " ").is_err());
        let q = list_boxes("c", "ce").unwrap();
        assert_eq!(q.get("center_id"), Some(&ParamValue::Str("ce".into())));
    }

    #[test]
    fn test_influence_joins_location_chain() {
        let f = InfluenceFilter::new("1000000001", [Relationship::Father, Relationship::Spouse], 3).unwrap();
        let q = person_influence(&f);
        assert!(q.text.contains("<-[:HAS_BOX]-(center:Center)<-[:HAS_CENTER]-(circle:Circle)"));
        assert_eq!(q.get("max_depth"), Some(&ParamValue::Int(3)));
        assert_eq!(
            q.get("relationship_types"),
            Some(&ParamValue::StrList(vec!["FATHER".into(), "SPOUSE".into()]))
        );
    }

    #[test]
    fn test_location_counts_per_level() {
        let q = location_counts(&LocationScope::Box("b".into()));
        assert!(q.text.contains("1 AS num_boxes"));
        let q = location_counts(&LocationScope::Circle("c".into()));
        assert!(q.text.contains("count(DISTINCT center) AS num_centers"));
    }

    #[test]
    fn test_influence_ranking_plan() {
        let plan = influence_ranking(
            &LocationScope::Center("ce".into()),
            &RelationshipSet::new([Relationship::Father, Relationship::Mother]).unwrap(),
            &CelfParams::default(),
            "canvass-celf-1",
        )
        .unwrap();
        assert!(plan.project.text.contains("gds.graph.project($graph_name"));
        assert!(plan.stream.text.contains("gds.influenceMaximization.celf.stream"));
        assert_eq!(plan.stream.get("seed_set_size"), Some(&ParamValue::Int(10)));
        assert_eq!(
            plan.stream.get("propagation_probability"),
            Some(&ParamValue::Float(0.1))
        );
        assert_eq!(plan.drop.get("graph_name"), Some(&ParamValue::Str("canvass-celf-1".into())));
    }

    #[test]
    fn test_influence_ranking_rejects_bad_params() {
        let params = CelfParams {
            monte_carlo_simulations: 0,
            ..Default::default()
        };
        assert!(influence_ranking(
            &LocationScope::Box("b".into()),
            &RelationshipSet::all(),
            &params,
            "g"
        )
        .is_err());
    }
}
