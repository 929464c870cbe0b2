//! Macro-generated test suite for the `DataStore` contract.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//!
//! use store_harness::*;
//! use wastewise::storage::InMemoryStore;
//!
//! data_store_tests!(InMemoryStore::new());
//! ```
//!
//! # Generated Tests
//!
//! - `test_insert_and_select_by_id`
//! - `test_filters_order_range_and_count`
//! - `test_search_is_case_insensitive`
//! - `test_set_membership`
//! - `test_update_patches_only_given_fields`
//! - `test_update_unknown_row`
//! - `test_delete_and_delete_where`
//! - `test_update_where`
//! - `test_unknown_table_reads_empty`
//! - `test_concurrent_inserts`

/// Generate a `DataStore` conformance test suite.
///
/// `$factory` is re-evaluated for each test and must produce an empty store
/// implementing `DataStore + Clone + 'static`.
#[macro_export]
macro_rules! data_store_tests {
    ($factory:expr) => {
        mod data_store_contract_tests {
            use super::*;
            use serde_json::{Value, json};
            use uuid::Uuid;
            use wastewise::core::{DataStore, Predicate, SelectQuery, SortSpec, StoreError};

            const TABLE: &str = "bins";

            fn bin(area: &str, litres: i64, day: u32) -> Value {
                json!({
                    "id": Uuid::new_v4(),
                    "area": area,
                    "litres": litres,
                    "collected_on": format!("2026-03-{:02}", day),
                    "full": litres > 100,
                })
            }

            async fn seeded<S: DataStore>(store: &S) -> Vec<Value> {
                let rows = vec![
                    bin("Osu", 120, 3),
                    bin("Labone", 240, 1),
                    bin("Osu East", 60, 2),
                    bin("Airport", 90, 5),
                ];
                for row in &rows {
                    store.insert(TABLE, row.clone()).await.unwrap();
                }
                rows
            }

            #[tokio::test]
            async fn test_insert_and_select_by_id() {
                let store = $factory;
                let rows = seeded(&store).await;
                let id = rows[1]["id"].as_str().unwrap().to_string();

                let result = store
                    .select(&SelectQuery::from(TABLE).eq("id", id.as_str()))
                    .await
                    .unwrap();
                assert_eq!(result.rows.len(), 1);
                assert_eq!(result.rows[0]["area"], "Labone");
                assert_eq!(result.total, None, "no count unless asked");
            }

            #[tokio::test]
            async fn test_filters_order_range_and_count() {
                let store = $factory;
                seeded(&store).await;

                let result = store
                    .select(
                        &SelectQuery::from(TABLE)
                            .gte("litres", 60i64)
                            .lte("litres", 200i64)
                            .order(SortSpec::asc("litres"))
                            .range(1, 2)
                            .count_exact(),
                    )
                    .await
                    .unwrap();

                let litres: Vec<i64> = result
                    .rows
                    .iter()
                    .map(|r| r["litres"].as_i64().unwrap())
                    .collect();
                assert_eq!(litres, vec![90, 120]);
                assert_eq!(result.total, Some(3), "total ignores the range");
            }

            #[tokio::test]
            async fn test_search_is_case_insensitive() {
                let store = $factory;
                seeded(&store).await;

                let result = store
                    .select(&SelectQuery::from(TABLE).search(&["area"], "osu").count_exact())
                    .await
                    .unwrap();
                assert_eq!(result.total, Some(2));
            }

            #[tokio::test]
            async fn test_set_membership() {
                let store = $factory;
                seeded(&store).await;

                let result = store
                    .select(
                        &SelectQuery::from(TABLE)
                            .in_list("area", ["Osu", "Airport", "Nowhere"])
                            .order(SortSpec::desc("collected_on")),
                    )
                    .await
                    .unwrap();
                let areas: Vec<&str> = result
                    .rows
                    .iter()
                    .map(|r| r["area"].as_str().unwrap())
                    .collect();
                assert_eq!(areas, vec!["Airport", "Osu"]);
            }

            #[tokio::test]
            async fn test_update_patches_only_given_fields() {
                let store = $factory;
                let rows = seeded(&store).await;
                let id: Uuid = serde_json::from_value(rows[0]["id"].clone()).unwrap();

                let updated = store
                    .update(TABLE, &id, json!({ "litres": 10 }))
                    .await
                    .unwrap();
                assert_eq!(updated["litres"], 10);
                assert_eq!(updated["area"], "Osu");
            }

            #[tokio::test]
            async fn test_update_unknown_row() {
                let store = $factory;
                seeded(&store).await;
                let id = Uuid::new_v4();

                let err = store
                    .update(TABLE, &id, json!({ "litres": 1 }))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::RowNotFound { .. }));
            }

            #[tokio::test]
            async fn test_delete_and_delete_where() {
                let store = $factory;
                let rows = seeded(&store).await;
                let id: Uuid = serde_json::from_value(rows[0]["id"].clone()).unwrap();

                store.delete(TABLE, &id).await.unwrap();
                let removed = store
                    .delete_where(TABLE, &[Predicate::lte("litres", 90i64)])
                    .await
                    .unwrap();
                assert_eq!(removed, 2);

                let left = store
                    .select(&SelectQuery::from(TABLE).count_exact())
                    .await
                    .unwrap();
                assert_eq!(left.total, Some(1));
                assert_eq!(left.rows[0]["area"], "Labone");
            }

            #[tokio::test]
            async fn test_update_where() {
                let store = $factory;
                seeded(&store).await;

                let changed = store
                    .update_where(TABLE, &[Predicate::eq("full", true)], json!({ "full": false }))
                    .await
                    .unwrap();
                assert_eq!(changed, 2);

                let full = store
                    .select(&SelectQuery::from(TABLE).eq("full", true).count_exact())
                    .await
                    .unwrap();
                assert_eq!(full.total, Some(0));
            }

            #[tokio::test]
            async fn test_unknown_table_reads_empty() {
                let store = $factory;
                let result = store
                    .select(&SelectQuery::from("nothing_here").count_exact())
                    .await
                    .unwrap();
                assert!(result.rows.is_empty());
                assert_eq!(result.total, Some(0));
            }

            #[tokio::test]
            async fn test_concurrent_inserts() {
                let store = $factory;
                let mut handles = Vec::new();
                for i in 0..16 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        store.insert(TABLE, bin("Spintex", i, 1)).await.unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }

                let result = store
                    .select(&SelectQuery::from(TABLE).eq("area", "Spintex").count_exact())
                    .await
                    .unwrap();
                assert_eq!(result.total, Some(16));
            }
        }
    };
}
