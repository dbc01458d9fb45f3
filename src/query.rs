//! Turns list-endpoint query strings into store predicates.
//!
//! The builder is permissive: malformed parameters drop the filter they
//! would have produced instead of failing the request. Column names only ever
//! come from the static schemas below, never from the request.

use std::collections::HashMap;

use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Compared after parsing the query value as an integer
    Integer,
    /// Numeric column, filtered by an inclusive range
    Number,
    /// Account id or other opaque reference, compared as text
    Reference,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, column: &'static str, kind: FieldKind) -> Field {
    Field { key, column, kind }
}

/// Per-resource allow-lists.
#[derive(Debug)]
pub struct QuerySchema {
    pub filterable: &'static [Field],
    pub sortable: &'static [Field],
    /// (latitude, longitude) columns when the resource supports `searchArea`
    pub location: Option<(Field, Field)>,
}

pub const PIN_QUERY: QuerySchema = QuerySchema {
    filterable: &[
        field("pinType", "pin_type", FieldKind::Integer),
        field("cost", "cost", FieldKind::Number),
        field("linkedAccount", "linked_account", FieldKind::Reference),
    ],
    sortable: &[
        field("rating", "rating", FieldKind::Text),
        field("cost", "cost", FieldKind::Number),
        field("createDate", "create_date", FieldKind::Text),
        field("likes", "likes", FieldKind::Integer),
        field("name", "name", FieldKind::Text),
    ],
    location: Some((
        field("latitude", "latitude", FieldKind::Number),
        field("longitude", "longitude", FieldKind::Number),
    )),
};

pub const TRIP_QUERY: QuerySchema = QuerySchema {
    filterable: &[
        field("type", "trip_type", FieldKind::Integer),
        field("linkedAccount", "linked_account", FieldKind::Reference),
    ],
    sortable: &[
        field("rating", "rating", FieldKind::Number),
        field("createDate", "create_date", FieldKind::Text),
        field("likes", "likes", FieldKind::Integer),
        field("name", "name", FieldKind::Text),
    ],
    location: None,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Exists(Field),
    Range { field: Field, min: f64, max: f64 },
    EqInt(Field, i64),
    EqText(Field, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub dir: SortDir,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Combined with AND
    pub predicates: Vec<Predicate>,
    pub sort: Option<Sort>,
    pub limit: Option<u32>,
}

impl QuerySchema {
    pub fn build(&self, params: &HashMap<String, String>) -> ListQuery {
        let mut predicates = Vec::new();

        if let Some((lat, lon)) = self.location {
            if let Some(area) = params.get("searchArea").and_then(|v| parse_numbers(v, 4)) {
                let (top_lat, top_lon, bottom_lat, bottom_lon) = (area[0], area[1], area[2], area[3]);
                predicates.push(Predicate::Range {
                    field: lat,
                    min: bottom_lat,
                    max: top_lat,
                });
                predicates.push(Predicate::Range {
                    field: lon,
                    min: bottom_lon,
                    max: top_lon,
                });
            }
        }

        for field in self.filterable {
            let Some(raw) = params.get(field.key) else {
                continue;
            };
            let filter = match field.kind {
                FieldKind::Number => parse_numbers(raw, 2).map(|range| Predicate::Range {
                    field: *field,
                    min: range[0],
                    max: range[1],
                }),
                FieldKind::Integer => raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .map(|v| Predicate::EqInt(*field, v)),
                FieldKind::Reference | FieldKind::Text => {
                    Some(Predicate::EqText(*field, raw.clone()))
                }
            };
            if let Some(filter) = filter {
                predicates.push(filter);
                // legacy rows may lack the column entirely
                predicates.push(Predicate::Exists(*field));
            }
        }

        ListQuery {
            predicates,
            sort: self.parse_sort(params),
            limit: params
                .get("limit")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0),
        }
    }

    fn parse_sort(&self, params: &HashMap<String, String>) -> Option<Sort> {
        let raw = params.get("sort")?.trim();
        let (key, embedded) = match raw.strip_prefix('-') {
            Some(key) => (key, Some(SortDir::Desc)),
            None => (raw, None),
        };
        let field = self.sortable.iter().find(|f| f.key == key)?;

        let explicit = params
            .get("sortdir")
            .and_then(|d| match d.trim().to_ascii_lowercase().as_str() {
                "1" | "asc" => Some(SortDir::Asc),
                "-1" | "desc" => Some(SortDir::Desc),
                _ => None,
            });

        Some(Sort {
            field: *field,
            dir: explicit.or(embedded).unwrap_or(SortDir::Asc),
        })
    }
}

/// Exactly `count` comma-separated finite numbers, or nothing.
fn parse_numbers(raw: &str, count: usize) -> Option<Vec<f64>> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()?;
    (values.len() == count).then_some(values)
}

impl Predicate {
    fn to_sql(&self, values: &mut Vec<Value>) -> String {
        match self {
            Predicate::Exists(field) => format!("{} IS NOT NULL", field.column),
            Predicate::Range { field, min, max } => {
                values.push(Value::Real(*min));
                values.push(Value::Real(*max));
                format!("{} BETWEEN ? AND ?", field.column)
            }
            Predicate::EqInt(field, v) => {
                values.push(Value::Integer(*v));
                format!("{} = ?", field.column)
            }
            Predicate::EqText(field, v) => {
                values.push(Value::Text(v.clone()));
                format!("{} = ?", field.column)
            }
        }
    }
}

impl ListQuery {
    /// `WHERE .. ORDER BY .. LIMIT ..` tail for a single-table select, plus
    /// its positional parameters. Unsorted results come back in insertion order.
    pub fn sql_tail(&self) -> (String, Vec<Value>) {
        let mut values = Vec::new();
        let mut sql = String::new();

        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self
                .predicates
                .iter()
                .map(|p| p.to_sql(&mut values))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        match self.sort {
            Some(Sort { field, dir }) => {
                let dir = match dir {
                    SortDir::Asc => "ASC",
                    SortDir::Desc => "DESC",
                };
                sql.push_str(&format!(" ORDER BY {} {}, rowid ASC", field.column, dir));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cost_field() -> Field {
        PIN_QUERY.filterable[1]
    }

    #[test]
    fn empty_query_has_no_filters() {
        let q = PIN_QUERY.build(&HashMap::new());
        assert_eq!(q, ListQuery::default());
        assert_eq!(q.sql_tail().0, " ORDER BY rowid ASC");
    }

    #[test]
    fn search_area_becomes_inclusive_box() {
        let q = PIN_QUERY.build(&params(&[("searchArea", "50,40,0,-10")]));
        let (lat, lon) = PIN_QUERY.location.unwrap();
        assert_eq!(
            q.predicates,
            vec![
                Predicate::Range { field: lat, min: 0.0, max: 50.0 },
                Predicate::Range { field: lon, min: -10.0, max: 40.0 },
            ]
        );
    }

    #[test]
    fn malformed_search_area_is_ignored() {
        for bad in ["50,50,0", "50,50,0,0,1", "a,b,c,d", ""] {
            let q = PIN_QUERY.build(&params(&[("searchArea", bad)]));
            assert!(q.predicates.is_empty(), "{bad:?} produced a filter");
        }
    }

    #[test]
    fn search_area_ignored_for_trips() {
        let q = TRIP_QUERY.build(&params(&[("searchArea", "50,50,0,0")]));
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn cost_range_adds_existence_check() {
        let q = PIN_QUERY.build(&params(&[("cost", "20,30")]));
        assert_eq!(
            q.predicates,
            vec![
                Predicate::Range { field: cost_field(), min: 20.0, max: 30.0 },
                Predicate::Exists(cost_field()),
            ]
        );
        let (sql, values) = q.sql_tail();
        assert_eq!(
            sql,
            " WHERE cost BETWEEN ? AND ? AND cost IS NOT NULL ORDER BY rowid ASC"
        );
        assert_eq!(values, vec![Value::Real(20.0), Value::Real(30.0)]);
    }

    #[test]
    fn cost_needs_exactly_two_numbers() {
        for bad in ["20", "20,30,40", "cheap,free"] {
            let q = PIN_QUERY.build(&params(&[("cost", bad)]));
            assert!(q.predicates.is_empty(), "{bad:?} produced a filter");
        }
    }

    #[test]
    fn integer_fields_parse_or_drop() {
        let q = PIN_QUERY.build(&params(&[("pinType", "3")]));
        let pin_type = PIN_QUERY.filterable[0];
        assert_eq!(
            q.predicates,
            vec![Predicate::EqInt(pin_type, 3), Predicate::Exists(pin_type)]
        );

        let q = PIN_QUERY.build(&params(&[("pinType", "three")]));
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn linked_account_compares_as_text() {
        let q = TRIP_QUERY.build(&params(&[("linkedAccount", "0190a1b2")]));
        let (sql, values) = q.sql_tail();
        assert_eq!(
            sql,
            " WHERE linked_account = ? AND linked_account IS NOT NULL ORDER BY rowid ASC"
        );
        assert_eq!(values, vec![Value::Text("0190a1b2".into())]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let q = PIN_QUERY.build(&params(&[("password", "1"), ("likedBy", "x")]));
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn sort_uses_allow_list_and_direction() {
        let q = PIN_QUERY.build(&params(&[("sort", "name")]));
        assert_eq!(q.sort.unwrap().dir, SortDir::Asc);

        let q = PIN_QUERY.build(&params(&[("sort", "likes"), ("sortdir", "-1")]));
        assert_eq!(q.sort.unwrap().dir, SortDir::Desc);
        assert_eq!(q.sql_tail().0, " ORDER BY likes DESC, rowid ASC");

        let q = PIN_QUERY.build(&params(&[("sort", "-createDate")]));
        let sort = q.sort.unwrap();
        assert_eq!(sort.field.column, "create_date");
        assert_eq!(sort.dir, SortDir::Desc);

        // explicit sortdir beats the embedded prefix
        let q = PIN_QUERY.build(&params(&[("sort", "-cost"), ("sortdir", "asc")]));
        assert_eq!(q.sort.unwrap().dir, SortDir::Asc);
    }

    #[test]
    fn unknown_sort_key_means_insertion_order() {
        let q = PIN_QUERY.build(&params(&[("sort", "description")]));
        assert!(q.sort.is_none());
        let q = TRIP_QUERY.build(&params(&[("sort", "cost")]));
        assert!(q.sort.is_none());
    }

    #[test]
    fn limit_accepts_positive_integers_only() {
        assert_eq!(PIN_QUERY.build(&params(&[("limit", "5")])).limit, Some(5));
        for unlimited in ["0", "-3", "lots", ""] {
            assert_eq!(PIN_QUERY.build(&params(&[("limit", unlimited)])).limit, None);
        }
        let (sql, _) = PIN_QUERY.build(&params(&[("limit", "5")])).sql_tail();
        assert!(sql.ends_with(" LIMIT 5"));
    }
}
