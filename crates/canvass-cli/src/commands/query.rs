//! Query commands over the canvassing graph.

use anyhow::Result;
use clap::{Args, Subcommand};

use canvass_core::config::CanvassConfig;
use canvass_core::query::{
    CelfParams, InfluenceFilter, LocationScope, Relationship, RelationshipSet, TraversalFilter,
};
use canvass_core::CanvassResult;
use canvass_graph::queries::{self, family::DEFAULT_EDGE_LIMIT};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum QueryCommands {
    /// List electoral circles
    Circles,

    /// List polling centers in a circle
    Centers {
        /// Circle element id
        #[arg(long)]
        circle: String,
    },

    /// List ballot boxes in a center
    Boxes {
        /// Circle element id
        #[arg(long)]
        circle: String,
        /// Center element id
        #[arg(long)]
        center: String,
    },

    /// Count centers, boxes and voters in a location
    Counts {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Rank persons by relatives voting at their own box
    Ranks {
        #[command(flatten)]
        location: LocationArgs,

        #[command(flatten)]
        traversal: TraversalArgs,

        /// Number of persons to show
        #[arg(long, default_value_t = 20)]
        top: u32,
    },

    /// Show where a person's relatives vote
    Influence {
        /// National number of the person
        national_no: String,

        #[command(flatten)]
        traversal: TraversalArgs,
    },

    /// Show a person's family neighborhood as nodes and edges
    Family {
        /// National number of the person
        national_no: String,

        #[command(flatten)]
        traversal: TraversalArgs,

        /// Maximum number of edges returned
        #[arg(long, default_value_t = DEFAULT_EDGE_LIMIT)]
        limit: u32,
    },

    /// Rank seed voters by CELF influence maximization
    Celf {
        #[command(flatten)]
        location: LocationArgs,

        /// Relationship types to project (repeat or comma separate); all when omitted
        #[arg(long = "rel", value_delimiter = ',')]
        rels: Vec<Relationship>,

        /// Number of seeds to select
        #[arg(long, default_value_t = CelfParams::default().seed_set_size)]
        seeds: u32,

        /// Monte Carlo simulations per spread estimate
        #[arg(long, default_value_t = CelfParams::default().monte_carlo_simulations)]
        simulations: u32,

        /// Probability that influence crosses one relationship
        #[arg(long, default_value_t = CelfParams::default().propagation_probability)]
        probability: f64,
    },
}

/// Location scope. The most specific level given wins.
#[derive(Args, Debug)]
pub struct LocationArgs {
    /// Circle element id
    #[arg(long)]
    pub circle: Option<String>,

    /// Center element id
    #[arg(long)]
    pub center: Option<String>,

    /// Box element id
    #[arg(long = "box")]
    pub box_id: Option<String>,
}

impl LocationArgs {
    fn scope(&self) -> CanvassResult<LocationScope> {
        LocationScope::most_specific(
            self.circle.as_deref(),
            self.center.as_deref(),
            self.box_id.as_deref(),
        )
    }
}

#[derive(Args, Debug)]
pub struct TraversalArgs {
    /// Relationship types to follow (repeat or comma separate); all when omitted
    #[arg(long = "rel", value_delimiter = ',')]
    pub rels: Vec<Relationship>,

    /// Maximum number of relationship hops (1 to 5)
    #[arg(long, default_value_t = 2)]
    pub depth: u32,
}

impl TraversalArgs {
    fn relationships(&self) -> Vec<Relationship> {
        selected(&self.rels)
    }
}

fn selected(rels: &[Relationship]) -> Vec<Relationship> {
    if rels.is_empty() {
        Relationship::ALL.to_vec()
    } else {
        rels.to_vec()
    }
}

pub async fn execute(cmd: QueryCommands, config: &CanvassConfig, format: OutputFormat) -> Result<()> {
    // Validate filters before opening a connection.
    let request = Request::try_from(cmd)?;
    let store = super::connect(config).await?;

    match request {
        Request::Circles => {
            let options = queries::circles(&store).await?;
            output::emit(format, &options, |o| output::print_locations("Circles", o))
        }
        Request::Centers { circle } => {
            let options = queries::centers(&store, &circle).await?;
            output::emit(format, &options, |o| output::print_locations("Centers", o))
        }
        Request::Boxes { circle, center } => {
            let options = queries::boxes(&store, &circle, &center).await?;
            output::emit(format, &options, |o| output::print_locations("Boxes", o))
        }
        Request::Counts(scope) => {
            let counts = queries::location_counts(&store, &scope).await?;
            output::emit(format, &counts, |c| output::print_location_counts(&scope, c))
        }
        Request::Ranks { filter, top } => {
            let table = queries::relative_ranks(&store, &filter, top).await?;
            output::emit(format, &table, output::print_ranked_table)
        }
        Request::Influence(filter) => {
            let breakdown = queries::person_influence(&store, &filter).await?;
            output::emit(format, &breakdown, output::print_influence)
        }
        Request::Family { filter, limit } => {
            let view = queries::family_view(&store, &filter, limit).await?;
            output::emit(format, &view, output::print_graph_view)
        }
        Request::Celf { scope, relationships, params } => {
            let ranks = queries::influence_ranking(&store, &scope, &relationships, &params).await?;
            output::emit(format, &ranks, |r| output::print_influence_ranks(r))
        }
    }
}

/// A query command with its filters validated.
#[derive(Debug)]
enum Request {
    Circles,
    Centers { circle: String },
    Boxes { circle: String, center: String },
    Counts(LocationScope),
    Ranks { filter: TraversalFilter, top: u32 },
    Influence(InfluenceFilter),
    Family { filter: InfluenceFilter, limit: u32 },
    Celf {
        scope: LocationScope,
        relationships: RelationshipSet,
        params: CelfParams,
    },
}

impl TryFrom<QueryCommands> for Request {
    type Error = canvass_core::CanvassError;

    fn try_from(cmd: QueryCommands) -> CanvassResult<Self> {
        Ok(match cmd {
            QueryCommands::Circles => Request::Circles,
            QueryCommands::Centers { circle } => Request::Centers { circle },
            QueryCommands::Boxes { circle, center } => Request::Boxes { circle, center },
            QueryCommands::Counts { location } => Request::Counts(location.scope()?),
            QueryCommands::Ranks { location, traversal, top } => Request::Ranks {
                filter: TraversalFilter::new(location.scope()?, traversal.relationships(), traversal.depth)?,
                top,
            },
            QueryCommands::Influence { national_no, traversal } => Request::Influence(InfluenceFilter::new(
                &national_no,
                traversal.relationships(),
                traversal.depth,
            )?),
            QueryCommands::Family { national_no, traversal, limit } => Request::Family {
                filter: InfluenceFilter::new(&national_no, traversal.relationships(), traversal.depth)?,
                limit,
            },
            QueryCommands::Celf { location, rels, seeds, simulations, probability } => {
                let params = CelfParams {
                    seed_set_size: seeds,
                    monte_carlo_simulations: simulations,
                    propagation_probability: probability,
                };
                params.validate()?;
                Request::Celf {
                    scope: location.scope()?,
                    relationships: RelationshipSet::new(selected(&rels))?,
                    params,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use canvass_core::CanvassError;
    use clap::Parser;

    fn request(args: &[&str]) -> CanvassResult<Request> {
        match Cli::try_parse_from(args.iter().copied()).unwrap().command {
            Commands::Query(cmd) => Request::try_from(cmd),
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_ranks_uses_most_specific_location() {
        let req = request(&[
            "canvass", "query", "ranks", "--circle", "c1", "--center", "c2", "--rel", "father,mother",
            "--depth", "3",
        ])
        .unwrap();
        match req {
            Request::Ranks { filter, top } => {
                assert_eq!(filter.scope, LocationScope::Center("c2".into()));
                assert_eq!(filter.relationships.names(), vec!["FATHER", "MOTHER"]);
                assert_eq!(filter.depth.get(), 3);
                assert_eq!(top, 20);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_relationships_default_to_all() {
        match request(&["canvass", "query", "influence", "1000000001"]).unwrap() {
            Request::Influence(filter) => assert_eq!(filter.relationships, RelationshipSet::all()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_location_is_rejected() {
        let err = request(&["canvass", "query", "counts"]).unwrap_err();
        assert!(matches!(err, CanvassError::InvalidFilter(_)));
    }

    #[test]
    fn test_depth_out_of_range_is_rejected() {
        let err = request(&["canvass", "query", "family", "1000000001", "--depth", "6"]).unwrap_err();
        assert!(matches!(err, CanvassError::InvalidFilter(_)));
    }

    #[test]
    fn test_unknown_relationship_fails_to_parse() {
        let parsed = Cli::try_parse_from(["canvass", "query", "influence", "1", "--rel", "cousin"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_celf_params_are_validated() {
        let err = request(&["canvass", "query", "celf", "--box", "b1", "--probability", "1.5"]).unwrap_err();
        assert!(matches!(err, CanvassError::InvalidFilter(_)));

        match request(&["canvass", "query", "celf", "--box", "b1", "--seeds", "5"]).unwrap() {
            Request::Celf { scope, params, .. } => {
                assert_eq!(scope, LocationScope::Box("b1".into()));
                assert_eq!(params.seed_set_size, 5);
                assert_eq!(params.monte_carlo_simulations, 1000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
