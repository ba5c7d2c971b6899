use std::{cmp::Ordering, fmt::Display};

use entity::{Record, Table};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq(String),
    Neq(String),
    In(Vec<String>),
}

/// Column filter. Values are kept in their textual wire form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Display) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.to_string()),
        }
    }

    pub fn neq(column: impl Into<String>, value: impl Display) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Neq(value.to_string()),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        Self {
            column: column.into(),
            op: FilterOp::In(values.into_iter().map(|v| v.to_string()).collect()),
        }
    }

    /// PostgREST query-string form, e.g. `("project_id", "eq.42")`.
    pub fn to_query_pair(&self) -> (String, String) {
        let value = match &self.op {
            FilterOp::Eq(value) => format!("eq.{value}"),
            FilterOp::Neq(value) => format!("neq.{value}"),
            FilterOp::In(values) => {
                let list = values
                    .iter()
                    .map(|value| quote_list_item(value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("in.({list})")
            }
        };
        (self.column.clone(), value)
    }

    /// Evaluate the filter against a JSON row.
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(&self.column).map(cell_text);
        match &self.op {
            FilterOp::Eq(value) => cell.as_deref() == Some(value.as_str()),
            FilterOp::Neq(value) => cell.as_deref() != Some(value.as_str()),
            FilterOp::In(values) => cell
                .map(|cell| values.iter().any(|value| value == &cell))
                .unwrap_or(false),
        }
    }
}

fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Text form of a JSON cell as it would appear in a filter.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    fn to_query_value(&self) -> String {
        match self.direction {
            Direction::Asc => format!("{}.asc", self.column),
            Direction::Desc => format!("{}.desc", self.column),
        }
    }

    /// Compare two rows on this ordering. Missing and null cells sort last.
    pub(crate) fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let left = a.get(&self.column).filter(|v| !v.is_null());
        let right = b.get(&self.column).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(Value::Number(x)), Some(Value::Number(y))) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
            (Some(x), Some(y)) => cell_text(x).cmp(&cell_text(y)),
        };
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// A `select` against one table: projection, filters, ordering and limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    pub table: Table,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Select from the table backing `R`.
    pub fn of<R: Record>() -> Self {
        Self::from(R::TABLE)
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Display) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn neq(self, column: impl Into<String>, value: impl Display) -> Self {
        self.filter(Filter::neq(column, value))
    }

    pub fn is_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        self.filter(Filter::is_in(column, values))
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filters.iter().map(Filter::to_query_pair));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(Order::to_query_value)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Keep only the projected columns of a row. `*` keeps everything.
    pub(crate) fn project(&self, row: &Value) -> Value {
        if self.columns.trim() == "*" {
            return row.clone();
        }
        let Some(object) = row.as_object() else {
            return row.clone();
        };
        let projected = self
            .columns
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .filter_map(|column| {
                object
                    .get(column)
                    .map(|value| (column.to_string(), value.clone()))
            })
            .collect();
        Value::Object(projected)
    }
}
