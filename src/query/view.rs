//! Live paginated views
//!
//! A [`QueryView`] owns the page, page size, sort, filter and base filter
//! of one list and re-runs its [`PageSource`] whenever any of them change.
//!
//! ```text
//! Idle ──► Loading ──► Success
//!             ▲    └──► Error
//!             └── any parameter change / refresh
//! ```
//!
//! Each load takes a generation number. A response is applied only if no
//! newer load has started, so a slow page 2 can never overwrite page 3.
//! A failed load keeps the previous rows and records the error message.

use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::events::EventBus;
use crate::core::filter::EntityFilter;
use crate::core::query::{PageLimits, PageRequest, PaginatedResponse, PaginationMeta, SortSpec};
use crate::models::{Payment, PickupRequest, Subscription, User};
use crate::query::aggregation::{CustomerDetails, CustomerDetailsComposer, CustomerFilter};
use crate::query::translator::QueryTranslator;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Something a view can page through
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;
    type Filter: Clone + Default + Send + Sync + 'static;

    /// Tables whose changes make the current page stale
    fn tables(&self) -> Vec<&'static str>;

    /// Fetch one page; `base` is the caller's fixed scope, `filter` the
    /// user-adjustable part
    async fn fetch(
        &self,
        base: &Self::Filter,
        filter: &Self::Filter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<Self::Item>, QueryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot published to view subscribers
#[derive(Debug, Clone)]
pub struct ViewState<T> {
    pub status: ViewStatus,
    /// Rows of the last successful load
    pub data: Vec<T>,
    pub pagination: Option<PaginationMeta>,
    /// Message of the last failed load, cleared on success
    pub error: Option<String>,
    pub page: usize,
    pub limit: usize,
    pub sort: Option<SortSpec>,
    /// Generation of the newest load started
    pub generation: u64,
}

impl<T> ViewState<T> {
    fn idle(page: PageRequest, sort: Option<SortSpec>) -> Self {
        Self {
            status: ViewStatus::Idle,
            data: Vec::new(),
            pagination: None,
            error: None,
            page: page.page,
            limit: page.limit,
            sort,
            generation: 0,
        }
    }
}

struct ViewParams<F> {
    page: PageRequest,
    sort: Option<SortSpec>,
    filter: F,
    base: F,
}

pub struct QueryView<S: PageSource> {
    source: Arc<S>,
    limits: PageLimits,
    params: Mutex<ViewParams<S::Filter>>,
    generation: AtomicU64,
    state: watch::Sender<ViewState<S::Item>>,
}

impl<S: PageSource> QueryView<S> {
    pub fn new(source: S, limits: PageLimits) -> Self {
        let page = PageRequest::new(1, limits.default_page_size).clamped(&limits);
        let (state, _) = watch::channel(ViewState::idle(page, None));
        Self {
            source: Arc::new(source),
            limits,
            params: Mutex::new(ViewParams {
                page,
                sort: None,
                filter: S::Filter::default(),
                base: S::Filter::default(),
            }),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Set the fixed scope before the first load
    pub fn with_base_filter(self, base: S::Filter) -> Self {
        self.update(|p| p.base = base);
        self
    }

    /// Current state snapshot
    pub fn state(&self) -> ViewState<S::Item> {
        self.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<ViewState<S::Item>> {
        self.state.subscribe()
    }

    pub async fn set_page(&self, page: usize) -> bool {
        self.update(|p| p.page.page = page);
        self.load().await
    }

    /// Change page size; returns to page 1
    pub async fn set_limit(&self, limit: usize) -> bool {
        self.update(|p| p.page = PageRequest::new(1, limit));
        self.load().await
    }

    /// Change sort; returns to page 1
    pub async fn set_sort(&self, sort: Option<SortSpec>) -> bool {
        self.update(|p| {
            p.sort = sort;
            p.page.page = 1;
        });
        self.load().await
    }

    /// Replace the user filter; returns to page 1
    pub async fn set_filter(&self, filter: S::Filter) -> bool {
        self.update(|p| {
            p.filter = filter;
            p.page.page = 1;
        });
        self.load().await
    }

    /// Replace the fixed scope; returns to page 1
    pub async fn set_base_filter(&self, base: S::Filter) -> bool {
        self.update(|p| {
            p.base = base;
            p.page.page = 1;
        });
        self.load().await
    }

    /// Re-run the current query
    ///
    /// Returns true when this load's outcome was applied, false when a
    /// newer load superseded it.
    pub async fn refresh(&self) -> bool {
        self.load().await
    }

    /// Refresh whenever the bus reports a change to one of the source's tables
    ///
    /// The task ends when the view is dropped or the bus closes.
    pub fn follow(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let view = Arc::downgrade(self);
        let tables = self.source.tables();
        let mut events = bus.subscribe();

        tokio::spawn(async move {
            loop {
                let relevant = match events.recv().await {
                    Ok(envelope) => tables.iter().any(|t| *t == envelope.event.table()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "view fell behind the event bus, refreshing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !relevant {
                    continue;
                }
                let Some(view) = view.upgrade() else {
                    break;
                };
                view.refresh().await;
            }
        })
    }

    fn update(&self, f: impl FnOnce(&mut ViewParams<S::Filter>)) {
        match self.params.lock() {
            Ok(mut params) => f(&mut params),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn snapshot(&self) -> (S::Filter, S::Filter, PageRequest, Option<SortSpec>) {
        let read = |p: &ViewParams<S::Filter>| {
            (
                p.base.clone(),
                p.filter.clone(),
                p.page.clamped(&self.limits),
                p.sort.clone(),
            )
        };
        match self.params.lock() {
            Ok(params) => read(&params),
            Err(poisoned) => read(&poisoned.into_inner()),
        }
    }

    async fn load(&self) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (base, filter, page, sort) = self.snapshot();

        self.state.send_if_modified(|state| {
            if generation <= state.generation {
                return false;
            }
            state.status = ViewStatus::Loading;
            state.generation = generation;
            state.page = page.page;
            state.limit = page.limit;
            state.sort = sort.clone();
            true
        });

        let result = self.source.fetch(&base, &filter, page, sort).await;

        self.state.send_if_modified(|state| {
            if state.generation != generation {
                tracing::debug!(
                    generation,
                    latest = state.generation,
                    "discarding stale page response"
                );
                return false;
            }
            match result {
                Ok(response) => {
                    state.status = ViewStatus::Success;
                    state.data = response.data;
                    state.pagination = Some(response.pagination);
                    state.error = None;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "view load failed, keeping last data");
                    state.status = ViewStatus::Error;
                    state.error = Some(err.to_string());
                }
            }
            true
        })
    }
}

/// Pages through one entity type
pub struct EntityPageSource<F: EntityFilter> {
    translator: QueryTranslator,
    _filter: PhantomData<fn() -> F>,
}

impl<F: EntityFilter> EntityPageSource<F> {
    pub fn new(translator: QueryTranslator) -> Self {
        Self {
            translator,
            _filter: PhantomData,
        }
    }
}

#[async_trait]
impl<F: EntityFilter> PageSource for EntityPageSource<F> {
    type Item = F::Entity;
    type Filter = F;

    fn tables(&self) -> Vec<&'static str> {
        vec![F::Entity::table()]
    }

    async fn fetch(
        &self,
        base: &F,
        filter: &F,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<F::Entity>, QueryError> {
        let mut predicates = base.predicates();
        predicates.extend(filter.predicates());
        let search = filter.search_term().or_else(|| base.search_term());
        self.translator
            .fetch_page_with::<F::Entity>(predicates, search, page, sort)
            .await
    }
}

/// Pages through a collector's customers
pub struct CollectorCustomersSource {
    composer: CustomerDetailsComposer,
    collector_id: Uuid,
}

impl CollectorCustomersSource {
    pub fn new(composer: CustomerDetailsComposer, collector_id: Uuid) -> Self {
        Self {
            composer,
            collector_id,
        }
    }
}

#[async_trait]
impl PageSource for CollectorCustomersSource {
    type Item = CustomerDetails;
    type Filter = CustomerFilter;

    fn tables(&self) -> Vec<&'static str> {
        vec![
            User::table(),
            PickupRequest::table(),
            Payment::table(),
            Subscription::table(),
        ]
    }

    async fn fetch(
        &self,
        base: &CustomerFilter,
        filter: &CustomerFilter,
        page: PageRequest,
        sort: Option<SortSpec>,
    ) -> Result<PaginatedResponse<CustomerDetails>, QueryError> {
        let merged = CustomerFilter {
            is_active: base.is_active.or(filter.is_active),
            area: base.area.clone().or_else(|| filter.area.clone()),
            search: filter.search.clone().or_else(|| base.search.clone()),
        };
        self.composer
            .customers_for_collector(self.collector_id, &merged, page, sort)
            .await
    }
}
