// SPDX-License-Identifier: MIT
//! Typed translation of list-endpoint query parameters.
//!
//! `where`, `sort` and `select` arrive as JSON-in-a-query-string. This module
//! parses them against a per-resource field whitelist into a [`QueryPlan`]
//! the stores can render to SQL, rejecting anything malformed or referencing
//! unknown fields with a 400 naming the offending parameter. Parsing is pure:
//! no I/O, no state, and nothing caller-supplied is ever spliced into SQL
//! text (values travel as bind arguments).
//!
//! Multi-key sort order follows the alphabetical order of the field names,
//! not the textual order inside the `sort` JSON object, because object keys
//! are decoded into an ordered map. Documented here on purpose: clients that
//! need a specific secondary sort should not rely on key position.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::model::datetime;

// ─── Field whitelists ────────────────────────────────────────────────────────

/// What a field's values look like in storage. Drives predicate rendering
/// and scalar normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
    /// RFC 3339 millis text; query scalars are normalized to the stored form
    /// so text comparison stays chronological.
    DateTime,
    /// JSON id-list column. Equality means containment; operator objects and
    /// sorting are rejected.
    IdList,
}

/// One queryable field: public (camelCase) name, storage column, kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

/// Per-resource schema for `where`/`sort`/`select`, plus the listing
/// defaults. Tasks cap unpaged listings at 100 rows; user listings are
/// unbounded unless the caller passes `limit`.
#[derive(Debug)]
pub struct FieldSpec {
    pub fields: &'static [Field],
    pub default_limit: Option<i64>,
}

impl FieldSpec {
    fn get(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub static TASK_FIELDS: FieldSpec = FieldSpec {
    fields: &[
        Field { name: "id", column: "id", kind: FieldKind::Text },
        Field { name: "name", column: "name", kind: FieldKind::Text },
        Field { name: "description", column: "description", kind: FieldKind::Text },
        Field { name: "deadline", column: "deadline", kind: FieldKind::DateTime },
        Field { name: "completed", column: "completed", kind: FieldKind::Bool },
        Field { name: "assignedUser", column: "assigned_user", kind: FieldKind::Text },
        Field { name: "assignedUserName", column: "assigned_user_name", kind: FieldKind::Text },
        Field { name: "dateCreated", column: "date_created", kind: FieldKind::DateTime },
    ],
    default_limit: Some(100),
};

pub static USER_FIELDS: FieldSpec = FieldSpec {
    fields: &[
        Field { name: "id", column: "id", kind: FieldKind::Text },
        Field { name: "name", column: "name", kind: FieldKind::Text },
        Field { name: "email", column: "email", kind: FieldKind::Text },
        Field { name: "pendingTasks", column: "pending_tasks", kind: FieldKind::IdList },
        Field { name: "dateCreated", column: "date_created", kind: FieldKind::DateTime },
    ],
    default_limit: None,
};

// ─── Plan types ──────────────────────────────────────────────────────────────

/// A JSON scalar usable as a predicate operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Scalar),
    Ne(Scalar),
    Gt(Scalar),
    Gte(Scalar),
    Lt(Scalar),
    Lte(Scalar),
    In(Vec<Scalar>),
    Nin(Vec<Scalar>),
}

/// One `field <predicate>` pair from the `where` parameter. A filter is the
/// conjunction of its conditions.
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: &'static Field,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: &'static Field,
    pub direction: Direction,
}

/// The `select` projection. Inclusion and exclusion cannot mix, except that
/// `id` (always kept by default) may be excluded alongside inclusions.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    include: Vec<&'static str>,
    exclude: Vec<&'static str>,
    drop_id: bool,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && !self.drop_id
    }

    /// Project a serialized document down to the selected fields.
    pub fn apply(&self, doc: &mut serde_json::Map<String, Value>) {
        if !self.include.is_empty() {
            let keep = |key: &str| key == "id" || self.include.contains(&key);
            doc.retain(|key, _| keep(key));
        } else {
            for name in &self.exclude {
                doc.remove(*name);
            }
        }
        if self.drop_id {
            doc.remove("id");
        }
    }
}

/// Everything a list endpoint needs to run one query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: i64,
    pub limit: Option<i64>,
    /// `count=true`: return `{count: N}` instead of documents. Ignores
    /// skip and limit.
    pub count_only: bool,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Raw query parameters as they come off the URL.
#[derive(Debug, Default, Deserialize)]
pub struct RawParams {
    pub r#where: Option<String>,
    pub sort: Option<String>,
    pub select: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    pub count: Option<String>,
}

/// Validate and translate one endpoint's query parameters.
pub fn parse(raw: &RawParams, spec: &'static FieldSpec) -> Result<QueryPlan, Error> {
    let filter = match &raw.r#where {
        Some(text) => parse_where(text, spec)?,
        None => Filter::default(),
    };
    let sort = match &raw.sort {
        Some(text) => parse_sort(text, spec)?,
        None => Vec::new(),
    };
    let projection = match &raw.select {
        Some(text) => parse_select(text, spec)?,
        None => Projection::default(),
    };
    let skip = match &raw.skip {
        Some(text) => text
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or(Error::InvalidParameter("skip"))?,
        None => 0,
    };
    let limit = match &raw.limit {
        Some(text) => Some(
            text.trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(Error::InvalidParameter("limit"))?,
        ),
        None => spec.default_limit,
    };
    let count_only = raw.count.as_deref() == Some("true");
    Ok(QueryPlan { filter, sort, projection, skip, limit, count_only })
}

fn parse_where(text: &str, spec: &'static FieldSpec) -> Result<Filter, Error> {
    let err = || Error::InvalidParameter("where");
    let value: Value = serde_json::from_str(text).map_err(|_| err())?;
    let Value::Object(map) = value else { return Err(err()) };

    let mut conditions = Vec::with_capacity(map.len());
    for (key, raw) in &map {
        let field = spec.get(key).ok_or_else(err)?;
        push_conditions(field, raw, &mut conditions).map_err(|_| err())?;
    }
    Ok(Filter { conditions })
}

/// Expand one `where` entry into conditions. An operator object may carry
/// several operators (a range, say); each becomes its own condition.
fn push_conditions(
    field: &'static Field,
    raw: &Value,
    out: &mut Vec<Condition>,
) -> Result<(), ()> {
    match raw {
        Value::Object(ops) => {
            if ops.is_empty() {
                return Err(());
            }
            for (op, operand) in ops {
                let predicate = match (op.as_str(), operand) {
                    ("$ne", v) => Predicate::Ne(scalar(field, v)?),
                    ("$gt", v) => Predicate::Gt(scalar(field, v)?),
                    ("$gte", v) => Predicate::Gte(scalar(field, v)?),
                    ("$lt", v) => Predicate::Lt(scalar(field, v)?),
                    ("$lte", v) => Predicate::Lte(scalar(field, v)?),
                    ("$in", Value::Array(items)) => Predicate::In(scalars(field, items)?),
                    ("$nin", Value::Array(items)) => Predicate::Nin(scalars(field, items)?),
                    _ => return Err(()),
                };
                if field.kind == FieldKind::IdList {
                    // Only plain equality (containment) is defined for lists.
                    return Err(());
                }
                out.push(Condition { field, predicate });
            }
            Ok(())
        }
        Value::Array(_) => Err(()),
        v => {
            let predicate = Predicate::Eq(scalar(field, v)?);
            if field.kind == FieldKind::IdList && !matches!(predicate, Predicate::Eq(Scalar::Text(_))) {
                return Err(());
            }
            out.push(Condition { field, predicate });
            Ok(())
        }
    }
}

fn scalar(field: &Field, value: &Value) -> Result<Scalar, ()> {
    Scalar::from_json(value).map(|s| normalize(field.kind, s)).ok_or(())
}

fn scalars(field: &Field, values: &[Value]) -> Result<Vec<Scalar>, ()> {
    values.iter().map(|v| scalar(field, v)).collect()
}

/// Rewrite datetime scalars into the canonical stored text form. Values that
/// cannot be read as datetimes pass through untouched and simply match no
/// stored row.
fn normalize(kind: FieldKind, scalar: Scalar) -> Scalar {
    if kind != FieldKind::DateTime {
        return scalar;
    }
    match &scalar {
        Scalar::Text(s) => match chrono::DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Scalar::Text(datetime::format_stored(&dt.with_timezone(&chrono::Utc))),
            Err(_) => scalar,
        },
        Scalar::Int(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
            Some(dt) => Scalar::Text(datetime::format_stored(&dt)),
            None => scalar,
        },
        _ => scalar,
    }
}

fn parse_sort(text: &str, spec: &'static FieldSpec) -> Result<Vec<SortKey>, Error> {
    let err = || Error::InvalidParameter("sort");
    let value: Value = serde_json::from_str(text).map_err(|_| err())?;
    let Value::Object(map) = value else { return Err(err()) };

    let mut keys = Vec::with_capacity(map.len());
    for (name, dir) in &map {
        let field = spec.get(name).ok_or_else(err)?;
        if field.kind == FieldKind::IdList {
            return Err(err());
        }
        let direction = match dir.as_i64() {
            Some(1) => Direction::Asc,
            Some(-1) => Direction::Desc,
            _ => return Err(err()),
        };
        keys.push(SortKey { field, direction });
    }
    Ok(keys)
}

fn parse_select(text: &str, spec: &'static FieldSpec) -> Result<Projection, Error> {
    let err = || Error::InvalidParameter("select");
    let value: Value = serde_json::from_str(text).map_err(|_| err())?;
    let Value::Object(map) = value else { return Err(err()) };

    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut drop_id = false;
    for (name, flag) in &map {
        let field = spec.get(name).ok_or_else(err)?;
        let included = match flag {
            Value::Bool(b) => *b,
            Value::Number(n) => match n.as_i64() {
                Some(0) => false,
                Some(1) => true,
                _ => return Err(err()),
            },
            _ => return Err(err()),
        };
        if field.name == "id" && !included {
            drop_id = true;
        } else if included {
            include.push(field.name);
        } else {
            exclude.push(field.name);
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(err());
    }
    Ok(Projection { include, exclude, drop_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(where_: Option<&str>, sort: Option<&str>, select: Option<&str>) -> RawParams {
        RawParams {
            r#where: where_.map(String::from),
            sort: sort.map(String::from),
            select: select.map(String::from),
            ..RawParams::default()
        }
    }

    // ── where ──

    #[test]
    fn scalar_equality_parses() {
        let plan = parse(&raw(Some(r#"{"completed": false}"#), None, None), &TASK_FIELDS).unwrap();
        assert_eq!(plan.filter.conditions.len(), 1);
        let cond = &plan.filter.conditions[0];
        assert_eq!(cond.field.column, "completed");
        assert_eq!(cond.predicate, Predicate::Eq(Scalar::Bool(false)));
    }

    #[test]
    fn operator_object_may_carry_a_range() {
        let plan = parse(
            &raw(
                Some(r#"{"deadline": {"$gte": "2025-01-01T00:00:00Z", "$lt": "2026-01-01T00:00:00Z"}}"#),
                None,
                None,
            ),
            &TASK_FIELDS,
        )
        .unwrap();
        assert_eq!(plan.filter.conditions.len(), 2);
        assert!(matches!(plan.filter.conditions[0].predicate, Predicate::Gte(_)));
        assert!(matches!(plan.filter.conditions[1].predicate, Predicate::Lt(_)));
    }

    #[test]
    fn datetime_scalars_normalize_to_stored_form() {
        let plan = parse(
            &raw(Some(r#"{"deadline": {"$gt": 1735689600000}}"#), None, None),
            &TASK_FIELDS,
        )
        .unwrap();
        let Predicate::Gt(Scalar::Text(text)) = &plan.filter.conditions[0].predicate else {
            panic!("expected normalized text scalar");
        };
        assert_eq!(text, "2025-01-01T00:00:00.000Z");
    }

    #[test]
    fn in_and_nin_take_scalar_arrays() {
        let plan = parse(
            &raw(Some(r#"{"name": {"$in": ["a", "b"]}, "completed": {"$ne": true}}"#), None, None),
            &TASK_FIELDS,
        )
        .unwrap();
        assert_eq!(plan.filter.conditions.len(), 2);
    }

    #[test]
    fn malformed_where_is_rejected() {
        for bad in [
            "not json",
            "[1, 2]",
            r#"{"priority": 1}"#,
            r#"{"name": {"$regex": "x"}}"#,
            r#"{"name": {}}"#,
            r#"{"name": ["a"]}"#,
            r#"{"name": {"$in": "a"}}"#,
            r#"{"name": {"$in": [{"x": 1}]}}"#,
        ] {
            let err = parse(&raw(Some(bad), None, None), &TASK_FIELDS).unwrap_err();
            assert!(
                matches!(err, Error::InvalidParameter("where")),
                "{bad} should be an invalid where parameter"
            );
        }
    }

    #[test]
    fn pending_tasks_allows_containment_equality_only() {
        assert!(parse(&raw(Some(r#"{"pendingTasks": "t-1"}"#), None, None), &USER_FIELDS).is_ok());
        for bad in [r#"{"pendingTasks": {"$in": ["t-1"]}}"#, r#"{"pendingTasks": 3}"#] {
            assert!(parse(&raw(Some(bad), None, None), &USER_FIELDS).is_err());
        }
    }

    // ── sort ──

    #[test]
    fn sort_directions_parse() {
        let plan = parse(&raw(None, Some(r#"{"deadline": 1}"#), None), &TASK_FIELDS).unwrap();
        assert_eq!(plan.sort.len(), 1);
        assert_eq!(plan.sort[0].direction, Direction::Asc);
    }

    #[test]
    fn multi_key_sort_orders_fields_alphabetically() {
        let plan = parse(
            &raw(None, Some(r#"{"name": 1, "deadline": -1}"#), None),
            &TASK_FIELDS,
        )
        .unwrap();
        let fields: Vec<&str> = plan.sort.iter().map(|k| k.field.name).collect();
        assert_eq!(fields, vec!["deadline", "name"]);
    }

    #[test]
    fn malformed_sort_is_rejected() {
        for bad in ["nope", r#"{"deadline": 0}"#, r#"{"deadline": "asc"}"#, r#"{"priority": 1}"#] {
            let err = parse(&raw(None, Some(bad), None), &TASK_FIELDS).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter("sort")));
        }
        assert!(parse(&raw(None, Some(r#"{"pendingTasks": 1}"#), None), &USER_FIELDS).is_err());
    }

    // ── select ──

    #[test]
    fn inclusion_keeps_id_by_default() {
        let plan = parse(&raw(None, None, Some(r#"{"name": 1}"#)), &TASK_FIELDS).unwrap();
        let mut doc = serde_json::json!({"id": "t", "name": "x", "description": "y"});
        plan.projection.apply(doc.as_object_mut().unwrap());
        assert_eq!(doc, serde_json::json!({"id": "t", "name": "x"}));
    }

    #[test]
    fn id_may_be_dropped_alongside_inclusions() {
        let plan = parse(&raw(None, None, Some(r#"{"name": 1, "id": 0}"#)), &TASK_FIELDS).unwrap();
        let mut doc = serde_json::json!({"id": "t", "name": "x", "description": "y"});
        plan.projection.apply(doc.as_object_mut().unwrap());
        assert_eq!(doc, serde_json::json!({"name": "x"}));
    }

    #[test]
    fn exclusion_removes_named_fields() {
        let plan = parse(&raw(None, None, Some(r#"{"description": 0}"#)), &TASK_FIELDS).unwrap();
        let mut doc = serde_json::json!({"id": "t", "name": "x", "description": "y"});
        plan.projection.apply(doc.as_object_mut().unwrap());
        assert_eq!(doc, serde_json::json!({"id": "t", "name": "x"}));
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let err = parse(&raw(None, None, Some(r#"{"name": 1, "description": 0}"#)), &TASK_FIELDS)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter("select")));
        assert!(parse(&raw(None, None, Some(r#"{"name": 2}"#)), &TASK_FIELDS).is_err());
        assert!(parse(&raw(None, None, Some(r#"{"nope": 1}"#)), &TASK_FIELDS).is_err());
    }

    // ── skip / limit / count ──

    #[test]
    fn paging_defaults_differ_per_resource() {
        let tasks = parse(&RawParams::default(), &TASK_FIELDS).unwrap();
        assert_eq!(tasks.limit, Some(100));
        assert_eq!(tasks.skip, 0);

        let users = parse(&RawParams::default(), &USER_FIELDS).unwrap();
        assert_eq!(users.limit, None);
    }

    #[test]
    fn paging_values_are_validated() {
        let mut raw = RawParams { skip: Some("2".into()), limit: Some("5".into()), ..RawParams::default() };
        let plan = parse(&raw, &TASK_FIELDS).unwrap();
        assert_eq!((plan.skip, plan.limit), (2, Some(5)));

        raw.skip = Some("-1".into());
        assert!(matches!(
            parse(&raw, &TASK_FIELDS).unwrap_err(),
            Error::InvalidParameter("skip")
        ));

        raw.skip = Some("0".into());
        raw.limit = Some("0".into());
        assert!(matches!(
            parse(&raw, &TASK_FIELDS).unwrap_err(),
            Error::InvalidParameter("limit")
        ));

        raw.limit = Some("ten".into());
        assert!(parse(&raw, &TASK_FIELDS).is_err());
    }

    #[test]
    fn count_flag_must_be_exactly_true() {
        let raw = RawParams { count: Some("true".into()), ..RawParams::default() };
        assert!(parse(&raw, &TASK_FIELDS).unwrap().count_only);

        let raw = RawParams { count: Some("True".into()), ..RawParams::default() };
        assert!(!parse(&raw, &TASK_FIELDS).unwrap().count_only);
    }

    // ── fuzz ──

    proptest! {
        #[test]
        fn parse_never_panics(
            w in ".{0,60}",
            s in ".{0,40}",
            sel in ".{0,40}",
            skip in ".{0,8}",
            limit in ".{0,8}",
        ) {
            let raw = RawParams {
                r#where: Some(w),
                sort: Some(s),
                select: Some(sel),
                skip: Some(skip),
                limit: Some(limit),
                count: None,
            };
            let _ = parse(&raw, &TASK_FIELDS);
            let _ = parse(&raw, &USER_FIELDS);
        }

        #[test]
        fn integer_filters_accepted_iff_fields_known(
            obj in prop::collection::btree_map("[a-zA-Z]{1,14}", any::<i32>(), 0..4)
        ) {
            let text = serde_json::to_string(&obj).unwrap();
            let raw = RawParams { r#where: Some(text), ..RawParams::default() };
            let all_known = obj.keys().all(|k| TASK_FIELDS.fields.iter().any(|f| f.name == k));
            prop_assert_eq!(parse(&raw, &TASK_FIELDS).is_ok(), all_known);
        }
    }
}
