//! Tests for the query service against an in-memory store.
//!
//! Run with: cargo test --test query_service_test

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::FakeStore;
use traffic_db::entity::MeasurementKind;
use traffic_db::error::AppError;
use traffic_db::influx::{FluxRecord, FluxTable};
use traffic_db::query::{QueryScope, QueryService, SeriesRequest};
use traffic_db::routes::or_empty;
use traffic_db::services::cache::QueryCache;

fn service(store: Arc<FakeStore>) -> QueryService<FakeStore> {
    QueryService::new(
        store,
        common::reference(),
        QueryScope {
            bucket: "fhgr-cp2-bucket".to_string(),
            measurement: "detector_measurement".to_string(),
        },
        QueryCache::new(Duration::from_secs(60)),
        "-10m".to_string(),
    )
}

fn table(rows: &[&[(&str, &str)]]) -> FluxTable {
    FluxTable {
        id: 0,
        records: rows
            .iter()
            .map(|row| FluxRecord {
                table: 0,
                values: row
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<HashMap<_, _>>(),
            })
            .collect(),
    }
}

#[test]
fn regions_start_with_all() {
    let options = service(Arc::new(FakeStore::default())).regions();

    let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, ["all", "BE", "ZH"]);
    assert_eq!(options[0].label, "All Cantons");
    assert_eq!(options[1].label, "BE");
}

#[tokio::test]
async fn stations_with_errors_zero_fills() {
    let store = Arc::new(FakeStore::returning(vec![table(&[&[
        ("stationId", "CH:0003"),
        ("_value", "4"),
    ]])]));

    let stations = service(store.clone())
        .stations_with_errors(None, None)
        .await
        .unwrap();

    let counts: Vec<(&str, i64)> = stations
        .iter()
        .map(|s| (s.station.id.as_str(), s.number_of_errors))
        .collect();
    assert_eq!(counts, [("CH:0002", 0), ("CH:0003", 4)]);

    let issued = store.issued();
    assert_eq!(issued.len(), 1);
    assert!(issued[0].contains("range(start: -10m)"));
    assert!(!issued[0].contains("r[\"canton\"]"));
}

#[tokio::test]
async fn stations_of_one_region() {
    let store = Arc::new(FakeStore::default());

    let stations = service(store.clone())
        .stations_with_errors(Some("ZH"), Some("-4h"))
        .await
        .unwrap();

    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].station.id, "CH:0003");
    assert!(store.issued()[0].contains("r[\"canton\"] == \"ZH\""));
}

#[tokio::test]
async fn unknown_region_short_circuits() {
    let store = Arc::new(FakeStore::default());

    let stations = service(store.clone())
        .stations_with_errors(Some("XX"), None)
        .await
        .unwrap();

    assert!(stations.is_empty());
    assert!(store.issued().is_empty());
}

#[tokio::test]
async fn invalid_time_range_is_rejected_before_querying() {
    let store = Arc::new(FakeStore::default());

    let err = service(store.clone())
        .region_error_totals(None, Some("-1h) |> yield()"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(store.issued().is_empty());
}

#[tokio::test]
async fn region_totals_zero_fill() {
    let store = Arc::new(FakeStore::returning(vec![table(&[&[
        ("canton", "BE"),
        ("_value", "9"),
    ]])]));

    let totals = service(store).region_error_totals(None, None).await.unwrap();

    let totals: Vec<(&str, i64)> = totals
        .iter()
        .map(|t| (t.canton.as_str(), t.number_of_errors))
        .collect();
    assert_eq!(totals, [("BE", 9), ("ZH", 0)]);
}

#[tokio::test]
async fn region_bins_require_a_region() {
    let store = Arc::new(FakeStore::default());
    let service = service(store.clone());

    assert!(service.region_error_bins(None, None, None).await.unwrap().is_empty());
    assert!(service.region_error_bins(Some(""), None, None).await.unwrap().is_empty());
    assert!(store.issued().is_empty());
}

#[tokio::test]
async fn region_bins_derive_bin_size_from_range() {
    let store = Arc::new(FakeStore::returning(vec![table(&[
        &[("_time", "2024-03-01T10:10:00Z"), ("canton", "BE"), ("_value", "2")],
        &[("_time", "2024-03-01T10:20:00Z"), ("canton", "BE"), ("_value", "5")],
    ])]));

    let series = service(store.clone())
        .region_error_bins(Some("all"), Some("-1h"), None)
        .await
        .unwrap();

    assert_eq!(series.len(), 1);
    assert_eq!(series[0].name, "BE");
    assert_eq!(series[0].measurements.len(), 2);

    let issued = store.issued();
    assert!(issued[0].contains("window(every: 10m)"));
    assert!(!issued[0].contains("r[\"canton\"] =="));
}

#[tokio::test]
async fn region_bins_blank_time_uses_default_range_preset() {
    let store = Arc::new(FakeStore::default());
    let service = QueryService::new(
        store.clone(),
        common::reference(),
        QueryScope {
            bucket: "fhgr-cp2-bucket".to_string(),
            measurement: "detector_measurement".to_string(),
        },
        QueryCache::new(Duration::from_secs(60)),
        "-1h".to_string(),
    );

    service
        .region_error_bins(Some("BE"), Some(" "), None)
        .await
        .unwrap();

    let issued = store.issued();
    assert!(issued[0].contains("range(start: -1h)"));
    assert!(issued[0].contains("window(every: 10m)"));
}

#[tokio::test]
async fn region_bins_reject_bad_bin_size() {
    let err = service(Arc::new(FakeStore::default()))
        .region_error_bins(Some("BE"), None, Some("-5m"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn mean_values_group_by_station_within_region() {
    let store = Arc::new(FakeStore::returning(vec![table(&[&[
        ("stationId", "CH:0002"),
        ("_value", "88.5"),
    ]])]));

    let means = service(store.clone())
        .mean_values(Some("BE"), None, MeasurementKind::TrafficSpeed)
        .await
        .unwrap();

    assert_eq!(means.len(), 1);
    assert_eq!(means[0].key, "CH:0002");
    assert_eq!(means[0].mean, Some(88.5));
    assert!(store.issued()[0].contains("group(columns: [\"stationId\"])"));
}

#[tokio::test]
async fn mean_values_group_by_region_otherwise() {
    let store = Arc::new(FakeStore::default());

    let means = service(store.clone())
        .mean_values(None, None, MeasurementKind::TrafficFlow)
        .await
        .unwrap();

    let keys: Vec<&str> = means.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, ["BE", "ZH"]);
    assert!(means.iter().all(|m| m.mean.is_none()));
    assert!(store.issued()[0].contains("r[\"kind\"] == \"trafficFlow\""));
}

#[tokio::test]
async fn detector_series_in_request_order() {
    let store = Arc::new(FakeStore::default());
    let requests = vec![
        SeriesRequest {
            id: "CH:0003.01".to_string(),
            index: 1,
        },
        SeriesRequest {
            id: "CH:0002.01".to_string(),
            index: 2,
        },
    ];

    let series = service(store.clone())
        .detector_series(&requests, Some("-1h"))
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].id, "CH:0003.01");
    assert_eq!(series[0].name, None);
    assert_eq!(series[1].id, "CH:0002.01");
    assert_eq!(series[1].index, 2);
    assert_eq!(series[1].name.as_deref(), Some("Wankdorf Richtung Zuerich"));
    assert_eq!(store.issued().len(), 2);
}

#[tokio::test]
async fn identical_queries_hit_the_cache() {
    let store = Arc::new(FakeStore::default());
    let service = service(store.clone());

    service.region_error_totals(None, Some("-1h")).await.unwrap();
    service.region_error_totals(None, Some("-1h")).await.unwrap();
    service.region_error_totals(None, Some("-4h")).await.unwrap();

    assert_eq!(store.issued().len(), 2);
}

#[tokio::test]
async fn store_failures_become_empty_lists_at_the_edge() {
    let store = Arc::new(FakeStore {
        fail_queries: true,
        ..FakeStore::default()
    });
    let service = service(store);

    let result = service.stations_with_errors(None, None).await;
    assert!(matches!(result, Err(AppError::Store(_))));
    assert!(or_empty("stations", service.stations_with_errors(None, None).await)
        .unwrap()
        .is_empty());

    let rejected = or_empty("stations", service.stations_with_errors(None, Some("soon")).await);
    assert!(matches!(rejected, Err(AppError::BadRequest(_))));
}
