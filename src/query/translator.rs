//! Query translator
//!
//! Turns a typed filter, a page request and a sort into a [`SelectQuery`],
//! runs it against the store and maps the rows back into entities together
//! with the pagination envelope. Read-only.

use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::filter::{EntityFilter, Predicate};
use crate::core::query::{PageLimits, PageRequest, PaginatedResponse, PaginationMeta, SortSpec};
use crate::core::store::{DataStore, SelectQuery, SelectResult};
use crate::query::schema::{SchemaGate, SchemaGeneration};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Translates typed filters into store selects
///
/// Cheap to clone; every clone shares the store and the schema gate.
#[derive(Clone)]
pub struct QueryTranslator {
    store: Arc<dyn DataStore>,
    schema: Arc<SchemaGate>,
    limits: PageLimits,
}

impl QueryTranslator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            schema: Arc::new(SchemaGate::default()),
            limits: PageLimits::default(),
        }
    }

    pub fn with_schema(mut self, schema: Arc<SchemaGate>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn schema(&self) -> &Arc<SchemaGate> {
        &self.schema
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    /// Fetch one page of entities matching a filter
    ///
    /// An empty filter applies no constraints. Without a sort the entity's
    /// default order is used.
    pub async fn fetch_page<F: EntityFilter>(
        &self,
        filter: &F,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<F::Entity>, QueryError> {
        self.fetch_page_with::<F::Entity>(filter.predicates(), filter.search_term(), page, sort)
            .await
    }

    /// Fetch one page from raw predicates and an optional search term
    pub async fn fetch_page_with<T: Entity>(
        &self,
        predicates: Vec<Predicate>,
        search: Option<&str>,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<T>, QueryError> {
        let page = page.clamped(&self.limits);
        let query = base_query::<T>(predicates, search)
            .order(sort.unwrap_or_else(T::default_sort))
            .range(page.offset(), page.limit)
            .count_exact();

        let result = self.run::<T>(query, "fetch").await?;
        let total = result
            .total
            .unwrap_or_else(|| page.offset() + result.rows.len());
        let data = decode_rows::<T>(result.rows)?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(page.page, page.limit, total),
        })
    }

    /// Fetch every entity matching a filter, without pagination
    pub async fn fetch_all<F: EntityFilter>(
        &self,
        filter: &F,
        sort: Option<SortSpec>,
    ) -> Result<Vec<F::Entity>, QueryError> {
        self.fetch_where::<F::Entity>(filter.predicates(), filter.search_term(), sort)
            .await
    }

    /// Fetch every entity matching raw predicates
    pub async fn fetch_where<T: Entity>(
        &self,
        predicates: Vec<Predicate>,
        search: Option<&str>,
        sort: Option<SortSpec>,
    ) -> Result<Vec<T>, QueryError> {
        let query = base_query::<T>(predicates, search).order(sort.unwrap_or_else(T::default_sort));
        let result = self.run::<T>(query, "fetch").await?;
        decode_rows::<T>(result.rows)
    }

    /// Batch fetch by primary key; an empty id list issues no query
    pub async fn fetch_by_ids<T: Entity>(&self, ids: &[Uuid]) -> Result<Vec<T>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = SelectQuery::from(T::table()).in_list("id", ids.iter().copied());
        let result = self.run::<T>(query, "fetch").await?;
        decode_rows::<T>(result.rows)
    }

    /// Get a single entity by id
    pub async fn get<T: Entity>(&self, id: Uuid) -> Result<Option<T>, QueryError> {
        let query = SelectQuery::from(T::table()).eq("id", id).range(0, 1);
        let result = self.run::<T>(query, "get").await?;
        match result.rows.into_iter().next() {
            Some(row) => T::from_row(row)
                .map(Some)
                .map_err(|e| QueryError::decode(T::table(), e)),
            None => Ok(None),
        }
    }

    /// Number of entities matching a filter
    pub async fn count<F: EntityFilter>(&self, filter: &F) -> Result<usize, QueryError> {
        self.count_where::<F::Entity>(filter.predicates(), filter.search_term())
            .await
    }

    pub async fn count_where<T: Entity>(
        &self,
        predicates: Vec<Predicate>,
        search: Option<&str>,
    ) -> Result<usize, QueryError> {
        let query = base_query::<T>(predicates, search)
            .columns(&["id"])
            .range(0, 0)
            .count_exact();
        let result = self.run::<T>(query, "count").await?;
        Ok(result.total.unwrap_or(result.rows.len()))
    }

    /// Distinct non-null uuids found in one column of the matching rows,
    /// in first-seen order
    pub async fn distinct_ids<T: Entity>(
        &self,
        column: &str,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Uuid>, QueryError> {
        let query = SelectQuery::from(T::table())
            .columns(&[column])
            .filters(predicates);
        let result = self.run::<T>(query, "fetch").await?;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for row in &result.rows {
            let Some(id) = row.get(column).and_then(Value::as_str) else {
                continue;
            };
            let id = Uuid::parse_str(id).map_err(|e| QueryError::decode(T::table(), e))?;
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Run a select, applying the schema gate and its single legacy retry
    async fn run<T: Entity>(
        &self,
        query: SelectQuery,
        operation: &'static str,
    ) -> Result<SelectResult, QueryError> {
        let query = self.schema.prepare::<T>(query);
        tracing::debug!(
            table = T::table(),
            operation,
            predicates = query.predicates.len(),
            order = ?query.order,
            "select"
        );

        match self.store.select(&query).await {
            Ok(result) => {
                if self.schema.effective::<T>() == SchemaGeneration::Auto
                    && self.schema.is_sensitive::<T>(&query)
                {
                    self.schema.learn::<T>(SchemaGeneration::Current);
                }
                Ok(result)
            }
            Err(err) => {
                let Some(retry) = self.schema.fallback::<T>(&query, &err) else {
                    return Err(QueryError::store(T::table(), operation, err));
                };
                match self.store.select(&retry).await {
                    Ok(result) => {
                        self.schema.learn::<T>(SchemaGeneration::Legacy);
                        Ok(result)
                    }
                    Err(err) => Err(QueryError::store(T::table(), operation, err)),
                }
            }
        }
    }
}

/// Table, predicates and the search disjunction
fn base_query<T: Entity>(predicates: Vec<Predicate>, search: Option<&str>) -> SelectQuery {
    let query = SelectQuery::from(T::table()).filters(predicates);
    match search.map(str::trim).filter(|term| !term.is_empty()) {
        Some(term) if !T::search_columns().is_empty() => query.search(T::search_columns(), term),
        _ => query,
    }
}

fn decode_rows<T: Entity>(rows: Vec<Value>) -> Result<Vec<T>, QueryError> {
    rows.into_iter()
        .map(T::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| QueryError::decode(T::table(), e))
}
