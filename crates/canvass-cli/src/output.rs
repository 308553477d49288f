//! Terminal output formatting.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use canvass_core::ingest::Stage;
use canvass_core::query::LocationScope;
use canvass_core::roster::{NormalizeStats, PlannedNodes};
use canvass_core::shape::{
    GraphView, InfluenceBreakdown, InfluenceRank, LocationCounts, LocationOption, NodeKind,
    RankedTable,
};
use canvass_graph::{CampaignReport, GraphCounts, IngestReport};

/// Widest a table cell is allowed to grow before truncation.
const MAX_CELL_WIDTH: usize = 36;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

/// Print `value` as pretty JSON, or through `table` for terminal output.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, table: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            table(value);
            Ok(())
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Pad a plain string to a given visual width (left-padded).
fn pad_left(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", " ".repeat(width - visual), s)
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

fn numeric(column: &str) -> bool {
    matches!(
        column,
        "rank" | "num_relatives" | "influence_pct" | "share_pct" | "distance" | "spread" | "count"
    )
}

/// Print rows as an aligned table. Numeric columns are right-aligned.
fn print_table(columns: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = columns.iter().map(|c| UnicodeWidthStr::width(*c)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(cell.as_str()).min(MAX_CELL_WIDTH));
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad_right(&c.to_uppercase(), *w))
        .collect();
    println!("{}", header.join("  ").bold());
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    println!("{}", "─".repeat(total).dimmed());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .zip(&widths)
            .zip(row)
            .map(|((column, width), cell)| {
                let cell = truncate_visual(cell, *width);
                if numeric(column) {
                    pad_left(&cell, *width)
                } else {
                    pad_right(&cell, *width)
                }
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value)
}

fn empty(message: &str) {
    println!("{}", message.dimmed());
}

/// Print location picker options.
pub fn print_locations(title: &str, options: &[LocationOption]) {
    if options.is_empty() {
        empty(&format!("No {} found.", title.to_lowercase()));
        return;
    }
    println!("{}", title.bold());
    let rows: Vec<Vec<String>> = options
        .iter()
        .map(|o| vec![o.name.clone(), o.id.clone()])
        .collect();
    print_table(&["name", "id"], &rows);
    println!();
    println!("{} option(s)", options.len());
}

pub fn print_location_counts(scope: &LocationScope, counts: &LocationCounts) {
    println!("{} {}", scope.level().cyan().bold(), scope.id().dimmed());
    println!("{}", "─".repeat(40));
    println!("  Centers: {}", counts.num_centers.to_string().cyan());
    println!("  Boxes:   {}", counts.num_boxes.to_string().cyan());
    println!("  Voters:  {}", counts.num_voters.to_string().cyan());
}

pub fn print_ranked_table(table: &RankedTable) {
    if table.is_empty() {
        empty("No persons with relatives voting at their box.");
        return;
    }
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            vec![
                r.rank.to_string(),
                r.national_no.clone(),
                r.name.clone(),
                or_dash(r.phone_number.as_deref()),
                or_dash(r.primary_key.as_deref()),
                r.num_relatives.to_string(),
                pct(r.influence_pct),
            ]
        })
        .collect();
    print_table(table.columns, &rows);
    println!();
    println!(
        "{} of {} voter(s) in scope",
        "Influence".bold(),
        table.denominator.to_string().cyan()
    );
}

pub fn print_influence(breakdown: &InfluenceBreakdown) {
    let Some(seed) = &breakdown.seed else {
        println!("{}", "Person not found in graph.".red());
        return;
    };

    println!(
        "{} {}",
        seed.person.display_name().cyan().bold(),
        format!("({})", seed.person.national_no).dimmed()
    );
    println!(
        "  Votes at: {} / {} / {}",
        or_dash(seed.circle.as_deref()),
        or_dash(seed.center.as_deref()),
        or_dash(seed.box_name.as_deref())
    );
    println!();

    if breakdown.relatives.is_empty() {
        empty("No relatives within the selected depth.");
        return;
    }

    println!("{} ({})", "Relatives".bold(), breakdown.total_relatives);
    let rows: Vec<Vec<String>> = breakdown
        .relatives
        .iter()
        .map(|r| {
            vec![
                r.person.national_no.clone(),
                r.person.display_name(),
                r.distance.to_string(),
                or_dash(r.circle.as_deref()),
                or_dash(r.center.as_deref()),
                or_dash(r.box_name.as_deref()),
            ]
        })
        .collect();
    print_table(breakdown.columns.relatives, &rows);

    println!();
    println!("{}", "By circle".bold());
    let rows: Vec<Vec<String>> = breakdown
        .by_circle
        .iter()
        .map(|a| vec![a.circle.clone(), a.num_relatives.to_string(), pct(a.share_pct)])
        .collect();
    print_table(breakdown.columns.by_circle, &rows);

    println!();
    println!("{}", "By center".bold());
    let rows: Vec<Vec<String>> = breakdown
        .by_center
        .iter()
        .map(|a| {
            vec![
                a.circle.clone(),
                or_dash(a.center.as_deref()),
                a.num_relatives.to_string(),
                pct(a.share_pct),
            ]
        })
        .collect();
    print_table(breakdown.columns.by_center, &rows);

    if breakdown.unlocated > 0 {
        println!();
        println!(
            "{} relative(s) have no voting location",
            breakdown.unlocated.to_string().yellow()
        );
    }
    println!(
        "Shares are of all {} registered voter(s) in the graph",
        breakdown.graph_voters.to_string().cyan()
    );
}

fn kind_colored(kind: NodeKind, text: &str) -> ColoredString {
    match kind {
        NodeKind::Person => text.cyan(),
        NodeKind::Placeholder => text.dimmed(),
        NodeKind::Box => text.yellow(),
        NodeKind::Center => text.magenta(),
        NodeKind::Circle => text.green(),
    }
}

pub fn print_graph_view(view: &GraphView) {
    if view.is_empty() {
        empty("No family relationships found.");
        return;
    }

    println!("{} ({}):", "Nodes".bold(), view.nodes.len());
    for node in &view.nodes {
        let marker = if node.is_seed { "*".yellow().bold() } else { "•".dimmed() };
        let kind = format!("{:?}", node.kind);
        println!(
            "  {} [{}] {} {}",
            marker,
            kind_colored(node.kind, &kind),
            node.label,
            node.id.dimmed()
        );
    }

    let labels: std::collections::HashMap<&str, &str> = view
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str()))
        .collect();
    let label_of = |id: &str| labels.get(id).copied().unwrap_or("?").to_string();

    println!();
    println!("{} ({}):", "Relationships".bold(), view.edges.len());
    for edge in &view.edges {
        println!(
            "  {} {}{}{} {}",
            label_of(&edge.from),
            "-[".dimmed(),
            edge.rel_type.yellow(),
            "]->".dimmed(),
            label_of(&edge.to)
        );
    }
}

pub fn print_influence_ranks(ranks: &[InfluenceRank]) {
    if ranks.is_empty() {
        empty("No seeds returned.");
        return;
    }
    let rows: Vec<Vec<String>> = ranks
        .iter()
        .map(|r| {
            vec![
                r.rank.to_string(),
                r.national_no.clone(),
                r.name.clone(),
                or_dash(r.phone_number.as_deref()),
                format!("{:.3}", r.spread),
            ]
        })
        .collect();
    print_table(InfluenceRank::COLUMNS, &rows);
}

pub fn print_normalize_stats(stats: &NormalizeStats, planned: &PlannedNodes) {
    println!("{}", "Roster".bold());
    println!("{}", "─".repeat(40));
    println!("  Rows read:            {}", stats.rows_read);
    println!("  Non-canonical:        {}", dim_zero(stats.rejected_non_canonical));
    println!("  Missing identity:     {}", dim_zero(stats.missing_identity));
    println!("  Duplicates:           {}", dim_zero(stats.duplicates));
    println!("  Malformed parent ref: {}", dim_zero(stats.malformed_parent_refs));
    println!();
    println!("{}", "Planned nodes".bold());
    println!("{}", "─".repeat(40));
    println!("  Persons:      {}", planned.persons.to_string().cyan());
    println!("  Placeholders: {}", planned.placeholders.to_string().cyan());
    println!("  Circles:      {}", planned.circles.to_string().cyan());
    println!("  Centers:      {}", planned.centers.to_string().cyan());
    println!("  Boxes:        {}", planned.boxes.to_string().cyan());
    println!("  Total:        {}", planned.total().to_string().cyan().bold());
}

fn dim_zero(n: usize) -> ColoredString {
    if n == 0 {
        n.to_string().dimmed()
    } else {
        n.to_string().yellow()
    }
}

fn stage_unit(stage: Stage) -> &'static str {
    if stage.relationship_type().is_some() {
        "relationships"
    } else {
        "nodes"
    }
}

pub fn print_ingest_report(report: &IngestReport) {
    println!("{}", "Ingestion".bold());
    println!("{}", "─".repeat(56));
    for stage in &report.stages {
        if stage.skipped {
            println!("  {:<14} {}", stage.stage.as_str(), "done earlier, skipped".dimmed());
            continue;
        }
        println!(
            "  {:<14} {:>10} {:<14} {:>8} batch(es)",
            stage.stage.as_str(),
            stage.written.to_string().green(),
            stage_unit(stage.stage),
            stage.batches
        );
    }
    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!("{}", "─".repeat(56));
        println!("  Finished in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }
}

pub fn print_campaign_report(report: &CampaignReport) {
    println!("{}", "Campaign overlay".bold());
    println!("{}", "─".repeat(40));
    if report.stage.skipped {
        println!("  {}", "Completed by an earlier run, skipped".dimmed());
        return;
    }
    println!("  Join column:      {}", report.join.column());
    println!("  Matched:          {}", report.matched.to_string().green());
    println!("  Unmatched:        {}", dim_zero(report.unmatched));
    println!("  Rows without key: {}", dim_zero(report.rows_without_key));
    println!("  Superseded rows:  {}", dim_zero(report.superseded_rows));
    if !report.unmatched_sample.is_empty() {
        println!();
        println!("  {} {}", "Unmatched keys:".yellow(), report.unmatched_sample.join(", "));
    }
}

pub fn print_graph_counts(counts: &GraphCounts) {
    println!("{}", "Canvassing Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  Persons:       {}", counts.persons.to_string().cyan());
    println!("  Placeholders:  {}", counts.placeholders.to_string().cyan());
    println!("  Circles:       {}", counts.circles.to_string().cyan());
    println!("  Centers:       {}", counts.centers.to_string().cyan());
    println!("  Boxes:         {}", counts.boxes.to_string().cyan());
    println!("  Nodes:         {}", counts.total_nodes().to_string().cyan().bold());
    println!();
    for (rel_type, count) in &counts.relationships {
        println!("  {:<14} {}", format!("{}:", rel_type), count.to_string().cyan());
    }
    println!(
        "  Relationships: {}",
        counts.total_relationships().to_string().cyan().bold()
    );
    println!("{}", "─".repeat(40));
}
