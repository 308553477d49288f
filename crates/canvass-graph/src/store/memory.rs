//! In-process [`CanvassStore`] holding the whole graph in ordered maps.
//!
//! Mirrors the Neo4j statement semantics closely enough to exercise the
//! pipeline and query services without a server, and backs `--dry-run`.
//! CELF ranking needs the graph data science engine and is not available.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use canvass_core::campaign::{CampaignFields, CampaignUpdate, OverlayJoin};
use canvass_core::ingest::Stage;
use canvass_core::query::{
    CelfParams, InfluenceFilter, LocationScope, Relationship, RelationshipSet, TraversalFilter,
};
use canvass_core::roster::{PersonRecord, PollingLocation};
use canvass_core::shape::{
    LocationCounts, LocationOption, PersonSummary, RawEdgeRow, RawNode, RelativeCountRow,
    RelativeLocationRow, SeedProfile, SpreadRow,
};
use canvass_core::{CanvassError, CanvassResult};

use super::{CampaignOutcome, CanvassStore, GraphCounts, LinkPage};

fn circle_id(circle: &str) -> String {
    format!("circle:{}", circle)
}

fn center_id(circle: &str, center: &str) -> String {
    format!("center:{}/{}", circle, center)
}

fn box_id(loc: &PollingLocation) -> String {
    format!("box:{}/{}/{}", loc.circle, loc.center, loc.box_name)
}

fn person_id(key: &str) -> String {
    format!("person:{}", key)
}

fn in_scope(scope: &LocationScope, loc: &PollingLocation) -> bool {
    match scope {
        LocationScope::Circle(id) => circle_id(&loc.circle) == *id,
        LocationScope::Center(id) => center_id(&loc.circle, &loc.center) == *id,
        LocationScope::Box(id) => box_id(loc) == *id,
    }
}

fn require(value: &str, what: &str) -> CanvassResult<()> {
    if value.trim().is_empty() {
        return Err(CanvassError::invalid_filter(format!("{} is required", what)));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct PersonNode {
    record: PersonRecord,
    synthetic: bool,
    campaign: CampaignFields,
}

impl PersonNode {
    fn summary(&self) -> PersonSummary {
        let r = &self.record;
        PersonSummary {
            national_no: r.national_no.clone(),
            full_name: r.full_name.clone(),
            first_name: r.first_name.clone(),
            father_name: r.father_name.clone(),
            grand_name: r.grand_name.clone(),
            family_name: r.family_name.clone(),
            phone_number: self.campaign.phone_number.clone(),
            primary_key: r.primary_key.clone(),
            synthetic: self.synthetic,
        }
    }

    fn raw_node(&self) -> RawNode {
        RawNode {
            id: person_id(&self.record.national_no),
            label: "Person".to_string(),
            key: Some(self.record.national_no.clone()),
            name: self.record.full_name.clone(),
            synthetic: self.synthetic,
        }
    }
}

/// Edge endpoints keyed by relationship type and anchor person.
type EdgeIndex = HashMap<(Relationship, String), BTreeSet<String>>;

#[derive(Debug, Default)]
struct MemoryGraph {
    persons: BTreeMap<String, PersonNode>,
    circles: BTreeSet<String>,
    centers: BTreeSet<(String, String)>,
    boxes: BTreeSet<PollingLocation>,
    /// (type, from, to)
    family: BTreeSet<(Relationship, String, String)>,
    outgoing: EdgeIndex,
    incoming: EdgeIndex,
    votes_at: BTreeMap<String, PollingLocation>,
}

impl MemoryGraph {
    fn has_edge(&self, rel: Relationship, from: &str, to: &str) -> bool {
        self.outgoing
            .get(&(rel, from.to_string()))
            .is_some_and(|targets| targets.contains(to))
    }

    fn has_undirected(&self, rel: Relationship, a: &str, b: &str) -> bool {
        self.has_edge(rel, a, b) || self.has_edge(rel, b, a)
    }

    /// Insert an edge, keeping both indexes in step. Returns false when it already exists.
    fn insert_edge(&mut self, rel: Relationship, from: &str, to: &str) -> bool {
        if !self.family.insert((rel, from.to_string(), to.to_string())) {
            return false;
        }
        self.outgoing
            .entry((rel, from.to_string()))
            .or_default()
            .insert(to.to_string());
        self.incoming
            .entry((rel, to.to_string()))
            .or_default()
            .insert(from.to_string());
        true
    }

    /// Sources of `rel` edges ending at `to`.
    fn sources(&self, rel: Relationship, to: &str) -> Vec<String> {
        Self::endpoints(&self.incoming, rel, to)
    }

    fn targets(&self, rel: Relationship, from: &str) -> Vec<String> {
        Self::endpoints(&self.outgoing, rel, from)
    }

    fn endpoints(index: &EdgeIndex, rel: Relationship, anchor: &str) -> Vec<String> {
        index
            .get(&(rel, anchor.to_string()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Shortest outgoing distance to every person reachable within `depth`
    /// hops over `relationships`. The start is included at distance 0.
    fn reach(&self, start: &str, relationships: &RelationshipSet, depth: u32) -> BTreeMap<String, u32> {
        let mut dist = BTreeMap::from([(start.to_string(), 0u32)]);
        let mut queue = VecDeque::from([(start.to_string(), 0u32)]);
        while let Some((node, d)) = queue.pop_front() {
            if d == depth {
                continue;
            }
            for rel in Relationship::ALL.into_iter().filter(|r| relationships.contains(*r)) {
                let Some(targets) = self.outgoing.get(&(rel, node.clone())) else {
                    continue;
                };
                for next in targets {
                    if !dist.contains_key(next) {
                        dist.insert(next.clone(), d + 1);
                        queue.push_back((next.clone(), d + 1));
                    }
                }
            }
        }
        dist
    }

    /// Up to `limit` keys after `after` in key order whose node passes `keep`.
    fn candidates(&self, after: Option<&str>, limit: usize, keep: impl Fn(&PersonNode) -> bool) -> Vec<String> {
        let lower = match after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };
        self.persons
            .range((lower, Bound::Unbounded))
            .filter(|(_, node)| keep(node))
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn link_parent(&mut self, rel: Relationship, children: &[String]) -> usize {
        let mut created = 0;
        for child in children {
            let parent = self.persons.get(child).and_then(|n| match rel {
                Relationship::Father => n.record.father_national_no.clone(),
                _ => n.record.mother_national_no.clone(),
            });
            let Some(parent) = parent else { continue };
            if parent == *child || !self.persons.contains_key(&parent) {
                continue;
            }
            if self.insert_edge(rel, &parent, child) {
                created += 1;
            }
        }
        created
    }

    fn link_spouses(&mut self, children: &[String]) -> usize {
        let mut created = 0;
        for child in children {
            for f in self.sources(Relationship::Father, child) {
                for m in self.sources(Relationship::Mother, child) {
                    if f != m && !self.has_undirected(Relationship::Spouse, &f, &m) {
                        self.insert_edge(Relationship::Spouse, &f, &m);
                        created += 1;
                    }
                }
            }
        }
        created
    }

    fn link_siblings(&mut self, page: &[String]) -> usize {
        let mut created = 0;
        for p1 in page {
            for f in self.sources(Relationship::Father, p1) {
                for p2 in self.targets(Relationship::Father, &f) {
                    if p1.as_str() > p2.as_str() && !self.has_undirected(Relationship::Sibling, p1, &p2) {
                        self.insert_edge(Relationship::Sibling, p1, &p2);
                        created += 1;
                    }
                }
            }
        }
        created
    }

    fn link_votes(&mut self, page: &[String]) -> usize {
        let mut created = 0;
        for key in page {
            let Some(loc) = self.persons.get(key).and_then(|n| n.record.location()) else {
                continue;
            };
            if self.boxes.contains(&loc) && self.votes_at.get(key) != Some(&loc) {
                self.votes_at.insert(key.clone(), loc);
                created += 1;
            }
        }
        created
    }

    fn location_of(&self, key: &str) -> (Option<String>, Option<String>, Option<String>) {
        match self.votes_at.get(key) {
            Some(loc) => (
                Some(loc.circle.clone()),
                Some(loc.center.clone()),
                Some(loc.box_name.clone()),
            ),
            None => (None, None, None),
        }
    }
}

/// A graph store living entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: Mutex<MemoryGraph>,
    pending_failures: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` write calls fail with a retryable store error.
    pub fn fail_next_writes(&self, count: u32) {
        *lock(&self.pending_failures) = count;
    }

    pub fn is_synthetic(&self, national_no: &str) -> Option<bool> {
        self.graph().persons.get(national_no).map(|n| n.synthetic)
    }

    pub fn campaign_fields(&self, national_no: &str) -> Option<CampaignFields> {
        self.graph().persons.get(national_no).map(|n| n.campaign.clone())
    }

    pub fn person_record(&self, national_no: &str) -> Option<PersonRecord> {
        self.graph().persons.get(national_no).map(|n| n.record.clone())
    }

    /// Whether a relationship of `rel_type` runs from `from` to `to`.
    pub fn has_relationship(&self, rel_type: &str, from: &str, to: &str) -> bool {
        let graph = self.graph();
        match rel_type.parse::<Relationship>() {
            Ok(rel) => graph.has_edge(rel, from, to),
            Err(_) if rel_type == "VOTES_AT" => graph
                .votes_at
                .get(from)
                .is_some_and(|loc| box_id(loc) == to),
            Err(_) => false,
        }
    }

    /// Element id of a box, as the pickers report it.
    pub fn box_element_id(loc: &PollingLocation) -> String {
        box_id(loc)
    }

    fn graph(&self) -> MutexGuard<'_, MemoryGraph> {
        lock(&self.graph)
    }

    fn check_write(&self) -> CanvassResult<()> {
        let mut pending = lock(&self.pending_failures);
        if *pending > 0 {
            *pending -= 1;
            return Err(CanvassError::store("injected write failure"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CanvassStore for MemoryStore {
    async fn ensure_schema(&self) -> CanvassResult<()> {
        Ok(())
    }

    async fn upsert_locations(&self, batch: &[PollingLocation]) -> CanvassResult<usize> {
        self.check_write()?;
        let mut graph = self.graph();
        for loc in batch {
            graph.circles.insert(loc.circle.clone());
            graph.centers.insert((loc.circle.clone(), loc.center.clone()));
            graph.boxes.insert(loc.clone());
        }
        Ok(batch.len())
    }

    async fn upsert_persons(&self, batch: &[PersonRecord]) -> CanvassResult<usize> {
        self.check_write()?;
        let mut graph = self.graph();
        for record in batch {
            match graph.persons.get_mut(&record.national_no) {
                Some(node) => {
                    node.record = record.clone();
                    node.synthetic = false;
                }
                None => {
                    graph.persons.insert(
                        record.national_no.clone(),
                        PersonNode {
                            record: record.clone(),
                            synthetic: false,
                            campaign: CampaignFields::default(),
                        },
                    );
                }
            }
        }
        Ok(batch.len())
    }

    async fn create_placeholders(&self, keys: &[String]) -> CanvassResult<usize> {
        self.check_write()?;
        let mut graph = self.graph();
        let mut created = 0;
        for key in keys {
            if graph.persons.contains_key(key) {
                continue;
            }
            graph.persons.insert(
                key.clone(),
                PersonNode {
                    record: PersonRecord::bare(key.clone()),
                    synthetic: true,
                    campaign: CampaignFields::default(),
                },
            );
            created += 1;
        }
        Ok(created)
    }

    async fn link_page(&self, stage: Stage, after: Option<&str>, limit: usize) -> CanvassResult<LinkPage> {
        self.check_write()?;
        let mut graph = self.graph();
        let page = match stage {
            Stage::Father => graph.candidates(after, limit, |n| n.record.father_national_no.is_some()),
            Stage::Mother => graph.candidates(after, limit, |n| n.record.mother_national_no.is_some()),
            Stage::Spouse => graph.candidates(after, limit, |n| {
                n.record.father_national_no.is_some() && n.record.mother_national_no.is_some()
            }),
            Stage::Sibling => graph.candidates(after, limit, |n| n.record.father_national_no.is_some()),
            Stage::VotesAt => graph.candidates(after, limit, |n| n.record.box_name.is_some()),
            other => {
                return Err(CanvassError::validation(format!(
                    "stage '{}' is not a relationship pass",
                    other
                )))
            }
        };

        let created = match stage {
            Stage::Father => graph.link_parent(Relationship::Father, &page),
            Stage::Mother => graph.link_parent(Relationship::Mother, &page),
            Stage::Spouse => graph.link_spouses(&page),
            Stage::Sibling => graph.link_siblings(&page),
            _ => graph.link_votes(&page),
        };

        Ok(LinkPage {
            scanned: page.len(),
            last_key: page.last().cloned(),
            created,
        })
    }

    async fn apply_campaign(&self, join: OverlayJoin, batch: &[CampaignUpdate]) -> CanvassResult<CampaignOutcome> {
        self.check_write()?;
        let mut graph = self.graph();
        let mut outcome = CampaignOutcome::default();

        let by_primary_key: HashMap<String, Vec<String>> = match join {
            OverlayJoin::NationalNo => HashMap::new(),
            OverlayJoin::PrimaryKey => {
                let mut index: HashMap<String, Vec<String>> = HashMap::new();
                for (key, node) in &graph.persons {
                    if let Some(pk) = &node.record.primary_key {
                        index.entry(pk.clone()).or_default().push(key.clone());
                    }
                }
                index
            }
        };

        for update in batch {
            let keys = match join {
                OverlayJoin::NationalNo => vec![update.key.clone()],
                OverlayJoin::PrimaryKey => by_primary_key.get(&update.key).cloned().unwrap_or_default(),
            };
            let mut matched = 0;
            for key in &keys {
                if let Some(node) = graph.persons.get_mut(key) {
                    node.campaign = update.fields.clone();
                    matched += 1;
                }
            }
            if matched == 0 {
                outcome.unmatched_keys.push(update.key.clone());
            }
            outcome.matched += matched;
        }
        Ok(outcome)
    }

    async fn counts(&self) -> CanvassResult<GraphCounts> {
        let graph = self.graph();
        let mut relationships = BTreeMap::new();
        let mut add = |name: &str, n: usize| {
            if n > 0 {
                *relationships.entry(name.to_string()).or_insert(0) += n as u64;
            }
        };
        add("HAS_CENTER", graph.centers.len());
        add("HAS_BOX", graph.boxes.len());
        add("VOTES_AT", graph.votes_at.len());
        for (rel, _, _) in &graph.family {
            add(rel.as_str(), 1);
        }

        Ok(GraphCounts {
            persons: graph.persons.len() as u64,
            placeholders: graph.persons.values().filter(|n| n.synthetic).count() as u64,
            circles: graph.circles.len() as u64,
            centers: graph.centers.len() as u64,
            boxes: graph.boxes.len() as u64,
            relationships,
        })
    }

    async fn circles(&self) -> CanvassResult<Vec<LocationOption>> {
        Ok(self
            .graph()
            .circles
            .iter()
            .map(|c| LocationOption {
                id: circle_id(c),
                name: c.clone(),
            })
            .collect())
    }

    async fn centers(&self, circle: &str) -> CanvassResult<Vec<LocationOption>> {
        require(circle, "circle")?;
        let mut options: Vec<LocationOption> = self
            .graph()
            .centers
            .iter()
            .filter(|(ci, _)| circle_id(ci) == circle)
            .map(|(ci, ce)| LocationOption {
                id: center_id(ci, ce),
                name: ce.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(options)
    }

    async fn boxes(&self, circle: &str, center: &str) -> CanvassResult<Vec<LocationOption>> {
        require(circle, "circle")?;
        require(center, "center")?;
        let mut options: Vec<LocationOption> = self
            .graph()
            .boxes
            .iter()
            .filter(|loc| circle_id(&loc.circle) == circle && center_id(&loc.circle, &loc.center) == center)
            .map(|loc| LocationOption {
                id: box_id(loc),
                name: loc.box_name.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(options)
    }

    async fn location_counts(&self, scope: &LocationScope) -> CanvassResult<LocationCounts> {
        let graph = self.graph();
        let boxes: Vec<&PollingLocation> = graph.boxes.iter().filter(|loc| in_scope(scope, loc)).collect();
        let anchor_exists = match scope {
            LocationScope::Circle(id) => graph.circles.iter().any(|c| circle_id(c) == *id),
            LocationScope::Center(id) => graph.centers.iter().any(|(ci, ce)| center_id(ci, ce) == *id),
            LocationScope::Box(_) => !boxes.is_empty(),
        };
        if !anchor_exists {
            return Ok(LocationCounts::default());
        }

        let centers: BTreeSet<(&str, &str)> = boxes
            .iter()
            .map(|loc| (loc.circle.as_str(), loc.center.as_str()))
            .collect();
        let num_voters = graph.votes_at.values().filter(|loc| in_scope(scope, loc)).count() as u64;

        Ok(match scope {
            LocationScope::Box(_) => LocationCounts {
                num_centers: 1,
                num_boxes: 1,
                num_voters,
            },
            LocationScope::Center(_) => LocationCounts {
                num_centers: 1,
                num_boxes: boxes.len() as u64,
                num_voters,
            },
            LocationScope::Circle(_) => LocationCounts {
                num_centers: centers.len() as u64,
                num_boxes: boxes.len() as u64,
                num_voters,
            },
        })
    }

    async fn total_voters(&self) -> CanvassResult<u64> {
        Ok(self.graph().votes_at.len() as u64)
    }

    async fn relative_counts(&self, filter: &TraversalFilter, limit: u32) -> CanvassResult<Vec<RelativeCountRow>> {
        if limit == 0 {
            return Err(CanvassError::invalid_filter("limit must be at least 1"));
        }
        let graph = self.graph();
        let mut rows = Vec::new();

        for (key, loc) in graph.votes_at.iter().filter(|(_, loc)| in_scope(&filter.scope, loc)) {
            let reached = graph.reach(key, &filter.relationships, filter.depth.get());
            let num_relatives = reached
                .keys()
                .filter(|r| *r != key && graph.votes_at.get(*r) == Some(loc))
                .count() as u64;
            if num_relatives == 0 {
                continue;
            }
            if let Some(node) = graph.persons.get(key) {
                rows.push(RelativeCountRow {
                    person: node.summary(),
                    num_relatives,
                });
            }
        }

        // Input is in key order; the stable sort keeps it among ties.
        rows.sort_by(|a, b| b.num_relatives.cmp(&a.num_relatives));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn person(&self, national_no: &str) -> CanvassResult<Option<SeedProfile>> {
        require(national_no, "national number")?;
        let graph = self.graph();
        let key = national_no.trim();
        Ok(graph.persons.get(key).map(|node| {
            let (circle, center, box_name) = graph.location_of(key);
            SeedProfile {
                person: node.summary(),
                circle,
                center,
                box_name,
            }
        }))
    }

    async fn relatives(&self, filter: &InfluenceFilter) -> CanvassResult<Vec<RelativeLocationRow>> {
        let graph = self.graph();
        if !graph.persons.contains_key(&filter.national_no) {
            return Ok(Vec::new());
        }
        let reached = graph.reach(&filter.national_no, &filter.relationships, filter.depth.get());

        let mut rows: Vec<RelativeLocationRow> = reached
            .iter()
            .filter(|(key, _)| **key != filter.national_no)
            .filter_map(|(key, distance)| {
                let node = graph.persons.get(key)?;
                let (circle, center, box_name) = graph.location_of(key);
                Some(RelativeLocationRow {
                    person: node.summary(),
                    distance: *distance,
                    circle,
                    center,
                    box_name,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.person.national_no.cmp(&b.person.national_no))
        });
        Ok(rows)
    }

    async fn family_edges(&self, filter: &InfluenceFilter, limit: u32) -> CanvassResult<Vec<RawEdgeRow>> {
        let graph = self.graph();
        if !graph.persons.contains_key(&filter.national_no) {
            return Ok(Vec::new());
        }
        let depth = filter.depth.get();
        let reached = graph.reach(&filter.national_no, &filter.relationships, depth);
        let limit = limit.max(1) as usize;

        let mut family = Vec::new();
        for (rel, from, to) in &graph.family {
            let within = reached.get(from).is_some_and(|d| *d < depth);
            if !filter.relationships.contains(*rel) || !within {
                continue;
            }
            if let (Some(a), Some(b)) = (graph.persons.get(from), graph.persons.get(to)) {
                family.push(RawEdgeRow {
                    from: a.raw_node(),
                    to: b.raw_node(),
                    rel_type: rel.as_str().to_string(),
                });
            }
        }
        family.truncate(limit);

        let mut votes = Vec::new();
        for key in reached.keys() {
            let (Some(node), Some(loc)) = (graph.persons.get(key), graph.votes_at.get(key)) else {
                continue;
            };
            votes.push(RawEdgeRow {
                from: node.raw_node(),
                to: RawNode {
                    id: box_id(loc),
                    label: "Box".to_string(),
                    key: Some(loc.box_name.clone()),
                    name: Some(loc.box_name.clone()),
                    synthetic: false,
                },
                rel_type: "VOTES_AT".to_string(),
            });
        }
        votes.truncate(limit);

        family.extend(votes);
        Ok(family)
    }

    async fn influence_spread(
        &self,
        _scope: &LocationScope,
        _relationships: &RelationshipSet,
        params: &CelfParams,
    ) -> CanvassResult<Vec<SpreadRow>> {
        params.validate()?;
        Err(CanvassError::Unsupported(
            "CELF influence ranking requires Neo4j with Graph Data Science".to_string(),
        ))
    }
}
