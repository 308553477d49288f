//! Conversions between canvass values and bolt values / result rows.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, Query, Row};

use canvass_core::query::{CypherQuery, ParamValue};
use canvass_core::shape::{PersonSummary, RawNode};

pub fn string(value: &str) -> BoltType {
    BoltType::String(BoltString::from(value))
}

/// A string, or null so that `SET` removes the property.
pub fn opt_string(value: Option<&str>) -> BoltType {
    match value {
        Some(v) => string(v),
        None => BoltType::Null(BoltNull),
    }
}

pub fn opt_int(value: Option<i64>) -> BoltType {
    match value {
        Some(v) => BoltType::Integer(BoltInteger::new(v)),
        None => BoltType::Null(BoltNull),
    }
}

pub fn list(values: Vec<BoltType>) -> BoltType {
    BoltType::List(BoltList { value: values })
}

pub fn map<'a>(entries: impl IntoIterator<Item = (&'a str, BoltType)>) -> BoltType {
    BoltType::Map(BoltMap::from_iter(
        entries.into_iter().map(|(k, v)| (BoltString::from(k), v)),
    ))
}

pub fn param_value(value: &ParamValue) -> BoltType {
    match value {
        ParamValue::Str(s) => string(s),
        ParamValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        ParamValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        ParamValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        ParamValue::StrList(items) => list(items.iter().map(|s| string(s)).collect()),
    }
}

/// Build a driver query with every parameter bound.
pub fn to_query(cypher: &CypherQuery) -> Query {
    cypher
        .params
        .iter()
        .fold(Query::new(cypher.text.clone()), |q, (key, value)| {
            q.param(key, param_value(value))
        })
}

/// Optional string column; null and absent both read as `None`.
pub fn get_opt_string(row: &Row, column: &str) -> Option<String> {
    row.get::<String>(column).ok()
}

pub fn get_u64(row: &Row, column: &str) -> u64 {
    row.get::<i64>(column).map(|v| v.max(0) as u64).unwrap_or(0)
}

/// Decode the person column block shared by person-returning queries.
pub fn person_summary(row: &Row) -> Option<PersonSummary> {
    Some(PersonSummary {
        national_no: get_opt_string(row, "national_no")?,
        full_name: get_opt_string(row, "full_name"),
        first_name: get_opt_string(row, "first_name"),
        father_name: get_opt_string(row, "father_name"),
        grand_name: get_opt_string(row, "grand_name"),
        family_name: get_opt_string(row, "family_name"),
        phone_number: get_opt_string(row, "phone_number"),
        primary_key: get_opt_string(row, "primary_key"),
        synthetic: row.get::<bool>("synthetic").unwrap_or(false),
    })
}

/// Decode one `<prefix>_*` edge endpoint of the family-graph query.
pub fn raw_node(row: &Row, prefix: &str) -> Option<RawNode> {
    Some(RawNode {
        id: get_opt_string(row, &format!("{prefix}_id"))?,
        label: get_opt_string(row, &format!("{prefix}_label")).unwrap_or_default(),
        key: get_opt_string(row, &format!("{prefix}_key")),
        name: get_opt_string(row, &format!("{prefix}_name")),
        synthetic: row.get::<bool>(&format!("{prefix}_synthetic")).unwrap_or(false),
    })
}
