//! Hosted store backend speaking the PostgREST dialect
//!
//! Selects become `GET /rest/v1/{table}` with one query parameter per
//! predicate (`status=in.("requested","scheduled")`, `amount=gte.10`,
//! `or=(area.ilike."*oak*",notes.ilike."*oak*")`), `order`, `offset` and
//! `limit`. An exact count is requested through `Prefer: count=exact` and
//! read back from `Content-Range`.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgrest` feature flag.

use crate::core::field::FieldValue;
use crate::core::filter::Predicate;
use crate::core::query::SortDirection;
use crate::core::store::{DataStore, SelectQuery, SelectResult, StoreError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

/// Error body returned by PostgREST
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Data store backed by a PostgREST endpoint
#[derive(Clone, Debug)]
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    /// Create a store for `base_url` (e.g. `https://project.example.co`)
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let err = map_error(status, &body, table);
        tracing::debug!(table, %status, error = %err, "postgrest request failed");
        Err(err)
    }

    async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl DataStore for PostgrestStore {
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError> {
        let mut request = self
            .client
            .get(self.url(&query.table))
            .query(&encode_select(query));
        if query.count {
            request = request.header("Prefer", "count=exact");
        }

        let response = self.send(&query.table, request).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows = Self::rows(response).await?;

        Ok(SelectResult {
            rows,
            total: if query.count { total } else { None },
        })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let request = self
            .client
            .post(self.url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.send(table, request).await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("insert returned no row".to_string()))
    }

    async fn update(&self, table: &str, id: &Uuid, patch: Value) -> Result<Value, StoreError> {
        let request = self
            .client
            .patch(self.url(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(table, request).await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::RowNotFound {
                table: table.to_string(),
                id: *id,
            })
    }

    async fn update_where(
        &self,
        table: &str,
        predicates: &[Predicate],
        patch: Value,
    ) -> Result<usize, StoreError> {
        let request = self
            .client
            .patch(self.url(table))
            .query(&encode_predicates(predicates))
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.send(table, request).await?;
        Ok(Self::rows(response).await?.len())
    }

    async fn delete(&self, table: &str, id: &Uuid) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.url(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let response = self.send(table, request).await?;
        if Self::rows(response).await?.is_empty() {
            return Err(StoreError::RowNotFound {
                table: table.to_string(),
                id: *id,
            });
        }
        Ok(())
    }

    async fn delete_where(&self, table: &str, predicates: &[Predicate]) -> Result<usize, StoreError> {
        let request = self
            .client
            .delete(self.url(table))
            .query(&encode_predicates(predicates))
            .header("Prefer", "return=representation");
        let response = self.send(table, request).await?;
        Ok(Self::rows(response).await?.len())
    }
}

/// Query parameters for a select
pub fn encode_select(query: &SelectQuery) -> Vec<(String, String)> {
    let select = match &query.columns {
        Some(columns) if !columns.is_empty() => columns.join(","),
        _ => "*".to_string(),
    };
    let mut params = vec![("select".to_string(), select)];
    params.extend(encode_predicates(&query.predicates));

    // `id` breaks ties between equal sort keys
    match &query.order {
        Some(order) => {
            let direction = match order.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            let mut value = format!("{}.{}", order.field, direction);
            if order.field != "id" {
                value.push_str(",id.asc");
            }
            params.push(("order".to_string(), value));
        }
        None if query.range.is_some() => params.push(("order".to_string(), "id.asc".to_string())),
        None => {}
    }
    if let Some(range) = query.range {
        params.push(("offset".to_string(), range.offset.to_string()));
        params.push(("limit".to_string(), range.count.to_string()));
    }
    params
}

/// Query parameters for a predicate list
pub fn encode_predicates(predicates: &[Predicate]) -> Vec<(String, String)> {
    predicates
        .iter()
        .map(|predicate| match predicate {
            Predicate::Eq { column, value } if value.is_null() => {
                (column.clone(), "is.null".to_string())
            }
            Predicate::Eq { column, value } => (column.clone(), format!("eq.{}", value.to_text())),
            Predicate::In { column, values } => {
                let list: Vec<String> = values.iter().map(quote_value).collect();
                (column.clone(), format!("in.({})", list.join(",")))
            }
            Predicate::Gte { column, value } => (column.clone(), format!("gte.{}", value.to_text())),
            Predicate::Lte { column, value } => (column.clone(), format!("lte.{}", value.to_text())),
            Predicate::Search { columns, term } => {
                let pattern = quote(&format!("*{}*", term));
                if let [column] = columns.as_slice() {
                    return (column.clone(), format!("ilike.{}", pattern));
                }
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|column| format!("{}.ilike.{}", column, pattern))
                    .collect();
                ("or".to_string(), format!("({})", clauses.join(",")))
            }
        })
        .collect()
}

fn quote_value(value: &FieldValue) -> String {
    quote(&value.to_text())
}

/// Double-quote a value so reserved characters (`,.:()`) survive
fn quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Total from a `Content-Range` header (`0-19/57`, `*/0`)
pub fn parse_content_range(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Map an error response to a store error
pub fn map_error(status: StatusCode, body: &str, table: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| body.to_string());

    match parsed.code.as_deref() {
        Some("42703") | Some("PGRST204") => StoreError::MissingColumn {
            table: table.to_string(),
            column: missing_column_name(&message).unwrap_or_else(|| message.clone()),
        },
        Some("23505") => StoreError::UniqueViolation {
            table: table.to_string(),
            column: parsed
                .details
                .as_deref()
                .and_then(conflicting_column)
                .unwrap_or_else(|| "unknown".to_string()),
        },
        Some("42P01") | Some("PGRST205") => StoreError::UnknownTable(table.to_string()),
        _ => match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
            s if s.is_server_error() => StoreError::Connection(format!("{}: {}", s, message)),
            _ => StoreError::Malformed(message),
        },
    }
}

fn missing_column_name(message: &str) -> Option<String> {
    static COLUMN_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COLUMN_REGEX.get_or_init(|| {
        Regex::new(r#"column (?:\w+\.)?"?(\w+)"? does not exist|find the '(\w+)' column"#).unwrap()
    });
    let captures = regex.captures(message)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

fn conflicting_column(details: &str) -> Option<String> {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = KEY_REGEX.get_or_init(|| Regex::new(r"Key \((\w+)\)").unwrap());
    regex
        .captures(details)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::SortSpec;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_encode_select() {
        let collector = Uuid::nil();
        let query = SelectQuery::from("pickup_requests")
            .eq("collector_id", collector)
            .in_list("status", ["requested", "scheduled"])
            .gte("scheduled_date", "2026-01-01")
            .search(&["area", "notes"], "oak")
            .order(SortSpec::desc("scheduled_date"))
            .range(40, 20)
            .count_exact();

        let params = encode_select(&query);
        assert_eq!(param(&params, "select"), vec!["*"]);
        assert_eq!(
            param(&params, "collector_id"),
            vec!["eq.00000000-0000-0000-0000-000000000000"]
        );
        assert_eq!(param(&params, "status"), vec![r#"in.("requested","scheduled")"#]);
        assert_eq!(param(&params, "scheduled_date"), vec!["gte.2026-01-01"]);
        assert_eq!(
            param(&params, "or"),
            vec![r#"(area.ilike."*oak*",notes.ilike."*oak*")"#]
        );
        assert_eq!(param(&params, "order"), vec!["scheduled_date.desc,id.asc"]);
        assert_eq!(param(&params, "offset"), vec!["40"]);
        assert_eq!(param(&params, "limit"), vec!["20"]);
    }

    #[test]
    fn test_paged_order_is_total() {
        let params = encode_select(&SelectQuery::from("users").order(SortSpec::asc("id")));
        assert_eq!(param(&params, "order"), vec!["id.asc"]);

        let params = encode_select(&SelectQuery::from("users").range(0, 10));
        assert_eq!(param(&params, "order"), vec!["id.asc"]);

        let params = encode_select(&SelectQuery::from("users"));
        assert!(param(&params, "order").is_empty());
    }

    #[test]
    fn test_single_column_search() {
        let params = encode_predicates(&[Predicate::search(&["reference_number"], "DEMO-REF")]);
        assert_eq!(
            params,
            vec![(
                "reference_number".to_string(),
                r#"ilike."*DEMO-REF*""#.to_string()
            )]
        );
    }

    #[test]
    fn test_null_equality_and_quoting() {
        let params = encode_predicates(&[
            Predicate::eq("user_id", FieldValue::Null),
            Predicate::in_list("area", ["East, \"Legon\""]),
        ]);
        assert_eq!(params[0].1, "is.null");
        assert_eq!(params[1].1, r#"in.("East, \"Legon\"")"#);
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range("0-19/57"), Some(57));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-19/*"), None);
    }

    #[test]
    fn test_missing_column_mapping() {
        let err = map_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"42703","message":"column payments.reference_number does not exist"}"#,
            "payments",
        );
        assert_eq!(err.missing_column(), Some("reference_number"));

        let err = map_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"PGRST204","message":"Could not find the 'metadata' column of 'payments' in the schema cache"}"#,
            "payments",
        );
        assert_eq!(err.missing_column(), Some("metadata"));
    }

    #[test]
    fn test_unique_and_auth_mapping() {
        let err = map_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key","details":"Key (reference_number)=(PAY-1) already exists."}"#,
            "payments",
        );
        assert_eq!(
            err,
            StoreError::UniqueViolation {
                table: "payments".to_string(),
                column: "reference_number".to_string()
            }
        );

        let err = map_error(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#, "users");
        assert_eq!(err, StoreError::Unauthorized("JWT expired".to_string()));

        let err = map_error(StatusCode::BAD_GATEWAY, "upstream down", "users");
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
