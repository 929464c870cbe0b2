//! Read side: filter translation, aggregation and live views

pub mod aggregation;
pub mod schema;
pub mod translator;
pub mod view;

pub use aggregation::{
    CustomerDetails, CustomerDetailsComposer, CustomerFilter, join_customer_details,
};
pub use schema::{SchemaGate, SchemaGeneration};
pub use translator::QueryTranslator;
pub use view::{
    CollectorCustomersSource, EntityPageSource, PageSource, QueryView, ViewState, ViewStatus,
};
