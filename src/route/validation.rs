//! Validation of raw publish and match payloads
//!
//! Payloads arrive as arbitrary JSON from peers. Required fields are checked
//! strictly; `via` is lenient and drops bad elements one by one.

use crate::route::error::{ValidationError, ValidationResult};
use crate::route::types::{MatchQuery, Point, RouteDraft};
use serde_json::{Map, Value};

/// Fields the relay assigns itself; client-supplied values are discarded
const RELAY_OWNED_FIELDS: &[&str] = &[
    "connectionID",
    "socketId",
    "createdAt",
    "updatedAt",
    "matchType",
    "matchScore",
];

/// Parse a numeric pair: an array of at least two elements whose first two
/// are numbers or numeric strings.
pub fn parse_point(value: &Value) -> Option<Point> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let lat = coerce_f64(&items[0])?;
    let lng = coerce_f64(&items[1])?;
    Some(Point(lat, lng))
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Validate a publish payload into a draft route
pub fn validate(raw: Value) -> ValidationResult<RouteDraft> {
    let Value::Object(mut fields) = raw else {
        return Err(ValidationError::NotAnObject);
    };

    let owner_user_id = take_owner(&mut fields)?;
    let source = take_point(&mut fields, "source")?;
    let destination = take_point(&mut fields, "destination")?;

    let path = match fields.remove("path") {
        Some(value) => parse_path(&value)?,
        None => return Err(ValidationError::MissingField("path")),
    };

    let via = fields.remove("via").map(|v| parse_via(&v)).unwrap_or_default();

    for name in RELAY_OWNED_FIELDS {
        fields.remove(*name);
    }

    Ok(RouteDraft {
        owner_user_id,
        source,
        destination,
        path,
        via,
        extra: fields,
    })
}

/// Validate a find-matches request body. `ownerUserID` and `path` are
/// required, the endpoints are optional.
pub fn validate_match_query(raw: &Value) -> ValidationResult<MatchQuery> {
    let Value::Object(fields) = raw else {
        return Err(ValidationError::NotAnObject);
    };
    let mut fields = fields.clone();

    let owner = take_owner(&mut fields)?;
    let path = match fields.remove("path") {
        Some(Value::Null) | None => return Err(ValidationError::MissingField("path")),
        Some(value) => parse_path(&value)?,
    };

    let mut query = MatchQuery::new(owner).with_path(path);
    query.source = take_optional_point(&mut fields, "source")?;
    query.destination = take_optional_point(&mut fields, "destination")?;
    Ok(query)
}

fn take_owner(fields: &mut Map<String, Value>) -> ValidationResult<String> {
    // Drop both spellings so a conflicting alias never passes through
    let canonical = fields.remove("ownerUserID");
    let legacy = fields.remove("userID");
    let value = canonical
        .or(legacy)
        .ok_or(ValidationError::MissingField("ownerUserID"))?;

    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(_) => Err(ValidationError::MissingField("ownerUserID")),
        _ => Err(ValidationError::InvalidField {
            field: "ownerUserID",
            reason: "expected a string".to_string(),
        }),
    }
}

fn take_point(fields: &mut Map<String, Value>, field: &'static str) -> ValidationResult<Point> {
    match take_optional_point(fields, field)? {
        Some(point) => Ok(point),
        None => Err(ValidationError::MissingField(field)),
    }
}

fn take_optional_point(
    fields: &mut Map<String, Value>,
    field: &'static str,
) -> ValidationResult<Option<Point>> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_point(&value)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidField {
                field,
                reason: "expected a [lat, lng] pair".to_string(),
            }),
    }
}

fn parse_path(value: &Value) -> ValidationResult<Vec<Point>> {
    let items = value.as_array().ok_or_else(|| ValidationError::InvalidField {
        field: "path",
        reason: "expected a sequence of points".to_string(),
    })?;

    if items.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "path",
            reason: "must contain at least one point".to_string(),
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_point(item).ok_or_else(|| ValidationError::InvalidField {
                field: "path",
                reason: format!("element {i} is not a [lat, lng] pair"),
            })
        })
        .collect()
}

fn parse_via(value: &Value) -> Vec<Point> {
    match value.as_array() {
        Some(items) => items.iter().filter_map(parse_point).collect(),
        None => Vec::new(),
    }
}
