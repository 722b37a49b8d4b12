//! Filter / sort / field-selection grammar of the SuiteCRM V8 module endpoint.
//!
//! ```
//! use suitecrm_client::query::QueryBuilder;
//!
//! let url = QueryBuilder::new("Contacts")
//!     .select(&["name"])
//!     .filter("status", "Active")
//!     .filter_op("date_start", ">", "2020-05-08T09:59:00+00:00")
//!     .sort("date_entered")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     url,
//!     "/module/Contacts?fields[Contacts]=name&filter[status][eq]=Activeand&[date_start][GT]=2020-05-08T09:59:00+00:00&sort=-date_entered"
//! );
//! ```

use crate::error::QueryError;
use std::fmt;
use std::str::FromStr;

/// Separator SuiteCRM expects between filter terms
pub const CONJUNCTION: &str = "and&";

/// Comparison operators understood by the filter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    /// Operator name as it appears in the query string
    pub fn wire_name(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
        }
    }

    /// Comparison symbol accepted when building filters
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Operator::Eq),
            "<>" => Ok(Operator::Neq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Value side of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Plain value, emitted as `[field][eq]=value`
    Equals(String),
    /// `{operator, value}` pair; the operator is checked when the query is built
    Compare { operator: String, value: String },
}

impl FilterValue {
    pub fn compare(operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Compare {
            operator: operator.into(),
            value: value.into(),
        }
    }

    fn term(&self, field: &str) -> Result<String, QueryError> {
        match self {
            FilterValue::Equals(value) => Ok(format!("[{}][eq]={}", field, value)),
            FilterValue::Compare { operator, value } => {
                let operator: Operator = operator.parse()?;
                Ok(format!("[{}][{}]={}", field, operator.wire_name(), value))
            }
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Equals(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Equals(value)
    }
}

impl From<(Operator, &str)> for FilterValue {
    fn from((operator, value): (Operator, &str)) -> Self {
        FilterValue::compare(operator.symbol(), value)
    }
}

/// Ordered set of per-field filters. Insertion order is query-string order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    entries: Vec<(String, FilterValue)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality filter
    pub fn equals(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(field, FilterValue::Equals(value.into()))
    }

    /// Operator filter, e.g. `op("date_start", ">", "2020-05-08")`
    pub fn op(
        self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.with(field, FilterValue::compare(operator, value))
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.push(field, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) {
        self.entries.push((field.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(field, value)| (field.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for FilterSpec
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = FilterSpec::new();
        for (field, value) in iter {
            filters.push(field, value);
        }
        filters
    }
}

/// Build the path and query string for a filtered module listing.
///
/// The result is not percent-encoded; the executor encodes the final URL.
pub fn build_query(
    module: &str,
    fields: Option<&[&str]>,
    sort: Option<&str>,
    filters: &FilterSpec,
) -> Result<String, QueryError> {
    // Every term is rendered before anything is assembled so an unknown
    // operator leaves no partial URL behind.
    let terms = filters
        .iter()
        .map(|(field, value)| value.term(field))
        .collect::<Result<Vec<_>, _>>()?;

    let mut url = match fields {
        Some(fields) if !fields.is_empty() => format!(
            "/module/{module}?fields[{module}]={}&filter",
            fields.join(",")
        ),
        _ => format!("/module/{module}?filter"),
    };

    for term in &terms {
        url.push_str(term);
        url.push_str(CONJUNCTION);
    }
    if !terms.is_empty() {
        url.truncate(url.len() - CONJUNCTION.len());
    }

    if let Some(sort) = sort.filter(|s| !s.is_empty()) {
        url.push_str("&sort=-");
        url.push_str(sort);
    }

    Ok(url)
}

/// Path of one page of a module listing
pub fn page_path(module: &str, number: u64, size: u64) -> String {
    format!("/module/{}?page[number]={}&page[size]={}", module, number, size)
}

/// Fluent construction of a module query
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    module: String,
    fields: Option<Vec<String>>,
    sort: Option<String>,
    filters: FilterSpec,
}

impl QueryBuilder {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            fields: None,
            sort: None,
            filters: FilterSpec::new(),
        }
    }

    /// Restrict the attributes returned for each record
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Sort descending on a single field. A later call replaces the earlier one.
    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(field, FilterValue::Equals(value.into()));
        self
    }

    pub fn filter_op(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.filters.push(field, FilterValue::compare(operator, value));
        self
    }

    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    pub fn build(&self) -> Result<String, QueryError> {
        let fields: Option<Vec<&str>> = self
            .fields
            .as_ref()
            .map(|fields| fields.iter().map(String::as_str).collect());
        build_query(
            &self.module,
            fields.as_deref(),
            self.sort.as_deref(),
            &self.filters,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contacts_example_query() {
        let filters = FilterSpec::new()
            .equals("status", "Active")
            .op("date_start", ">", "2020-05-08T09:59:00+00:00");

        let url = build_query("Contacts", Some(&["name"][..]), Some("date_entered"), &filters).unwrap();
        assert_eq!(
            url,
            "/module/Contacts?fields[Contacts]=name&filter[status][eq]=Activeand&[date_start][GT]=2020-05-08T09:59:00+00:00&sort=-date_entered"
        );
    }

    #[test]
    fn test_no_filters_keeps_base_url() {
        let url = build_query("Accounts", None, None, &FilterSpec::new()).unwrap();
        assert_eq!(url, "/module/Accounts?filter");

        let url = build_query("Accounts", Some(&["name", "industry"][..]), None, &FilterSpec::new()).unwrap();
        assert_eq!(url, "/module/Accounts?fields[Accounts]=name,industry&filter");
    }

    #[test]
    fn test_no_filters_with_sort() {
        let url = build_query("Calls", None, Some("date_start"), &FilterSpec::new()).unwrap();
        assert_eq!(url, "/module/Calls?filter&sort=-date_start");
        assert!(!url.contains(CONJUNCTION));
    }

    #[test]
    fn test_operator_table() {
        let cases = [
            ("=", "EQ"),
            ("<>", "NEQ"),
            (">", "GT"),
            (">=", "GTE"),
            ("<", "LT"),
            ("<=", "LTE"),
        ];
        for (symbol, name) in cases {
            let filters = FilterSpec::new().op("amount", symbol, "100");
            let url = build_query("Opportunities", None, None, &filters).unwrap();
            assert_eq!(url, format!("/module/Opportunities?filter[amount][{}]=100", name));
            assert_eq!(symbol.parse::<Operator>().unwrap().wire_name(), name);
        }
    }

    #[test]
    fn test_unknown_operator_fails() {
        let filters = FilterSpec::new()
            .equals("status", "Active")
            .op("name", "LIKE", "Acme%");

        let err = build_query("Accounts", None, Some("name"), &filters).unwrap_err();
        assert_eq!(err, QueryError::UnknownOperator("LIKE".to_string()));
    }

    #[test]
    fn test_filter_order_is_insertion_order() {
        let filters: FilterSpec = vec![
            ("last_name", FilterValue::from("Smith")),
            ("account_type", FilterValue::compare("<>", "Customer")),
            ("first_name", FilterValue::from("Ann")),
        ]
        .into_iter()
        .collect();

        let url = build_query("Contacts", None, None, &filters).unwrap();
        assert_eq!(
            url,
            "/module/Contacts?filter[last_name][eq]=Smithand&[account_type][NEQ]=Customerand&[first_name][eq]=Ann"
        );

        // Deterministic across builds
        assert_eq!(url, build_query("Contacts", None, None, &filters).unwrap());
    }

    #[test]
    fn test_structured_equals_uses_uppercase_name() {
        let filters = FilterSpec::new()
            .op("status", "=", "Active")
            .equals("deleted", "0");
        let url = build_query("Leads", None, None, &filters).unwrap();
        assert_eq!(url, "/module/Leads?filter[status][EQ]=Activeand&[deleted][eq]=0");
    }

    #[test]
    fn test_query_builder_matches_build_query() {
        let built = QueryBuilder::new("Meetings")
            .select(&["name", "date_start"])
            .filter_op("date_start", ">=", "2021-01-01")
            .filter_op("date_start", "<", "2021-02-01")
            .sort("date_start")
            .build()
            .unwrap();

        assert_eq!(
            built,
            "/module/Meetings?fields[Meetings]=name,date_start&filter[date_start][GTE]=2021-01-01and&[date_start][LT]=2021-02-01&sort=-date_start"
        );
    }

    #[test]
    fn test_typed_operator_value() {
        let filters = FilterSpec::new().with("probability", (Operator::Lte, "50"));
        let url = build_query("Opportunities", None, None, &filters).unwrap();
        assert_eq!(url, "/module/Opportunities?filter[probability][LTE]=50");
    }

    #[test]
    fn test_page_path() {
        assert_eq!(page_path("Cases", 2, 50), "/module/Cases?page[number]=2&page[size]=50");
    }
}
