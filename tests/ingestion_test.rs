//! Tests for the ingestion cycle and its single-flight scheduler.
//!
//! Run with: cargo test --test ingestion_test

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

use common::{FakeFeed, FakeStore, FeedReply};
use traffic_db::datex::msr::parse_measurement_report;
use traffic_db::influx::{FieldValue, FluxTable};
use traffic_db::services::cache::QueryCache;
use traffic_db::sync::worker::{
    fetch_stations, measurement_points, read_station_snapshot, write_station_snapshot,
};
use traffic_db::sync::{IngestionCycle, IngestionScheduler, TickOutcome};

const MEASUREMENT: &str = "detector_measurement";

fn cycle(feed: FakeFeed, store: Arc<FakeStore>) -> IngestionCycle<FakeFeed, FakeStore> {
    IngestionCycle::new(
        Arc::new(feed),
        store,
        common::reference(),
        MEASUREMENT.to_string(),
    )
}

#[test]
fn one_point_per_channel_reading() {
    let reference = common::reference();
    let measurements = parse_measurement_report(common::MSR_SAMPLE, &reference.catalog).unwrap();
    let written_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 1, 0).unwrap();

    let points = measurement_points(MEASUREMENT, &measurements, written_at);

    assert_eq!(points.len(), 6);
    assert!(points.iter().all(|p| p.timestamp == written_at));
    assert!(points.iter().all(|p| p.measurement == MEASUREMENT));

    let speed = &points[1];
    assert_eq!(speed.tags["id"], "CH:0002.01");
    assert_eq!(speed.tags["index"], "2");
    assert_eq!(speed.tags["hasError"], "False");
    assert_eq!(speed.tags["canton"], "BE");
    assert_eq!(speed.tags["stationId"], "CH:0002");
    assert_eq!(speed.tags["kind"], "trafficSpeed");
    assert_eq!(speed.fields["value"], FieldValue::Float(87.5));
    assert_eq!(speed.fields["numberOfInputValuesUsed"], FieldValue::Integer(12));
    assert_eq!(speed.fields["errorReason"], FieldValue::String("none".to_string()));

    let error = &points[2];
    assert_eq!(error.tags["hasError"], "True");
    assert_eq!(error.tags["kind"], "none");
    assert_eq!(error.fields["value"], FieldValue::Float(0.0));
    assert_eq!(error.fields["numberOfInputValuesUsed"], FieldValue::Integer(0));
    assert_eq!(
        error.fields["errorReason"],
        FieldValue::String("detector offline".to_string())
    );

    // Detector without a known region
    assert_eq!(points[4].tags["canton"], "none");
}

#[test]
fn speed_without_input_count_stores_zero_inputs() {
    let xml = br#"<d2LogicalModel xmlns="http://datex2.eu/schema/2/2_0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
        <siteMeasurements>
            <measurementSiteReference id="CH:0002.01"/>
            <measurementTimeDefault>2024-03-01T10:00:00+01:00</measurementTimeDefault>
            <measuredValue index="2">
                <measuredValue>
                    <basicData xsi:type="TrafficSpeed">
                        <averageVehicleSpeed>
                            <speed>64</speed>
                        </averageVehicleSpeed>
                    </basicData>
                </measuredValue>
            </measuredValue>
        </siteMeasurements>
    </d2LogicalModel>"#;
    let reference = common::reference();
    let measurements = parse_measurement_report(xml, &reference.catalog).unwrap();
    let written_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 1, 0).unwrap();

    let points = measurement_points(MEASUREMENT, &measurements, written_at);

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tags["kind"], "trafficSpeed");
    assert_eq!(points[0].fields["value"], FieldValue::Float(64.0));
    assert_eq!(points[0].fields["numberOfInputValuesUsed"], FieldValue::Integer(0));
}

#[test]
fn points_encode_as_line_protocol() {
    let reference = common::reference();
    let measurements = parse_measurement_report(common::MSR_SAMPLE, &reference.catalog).unwrap();
    let written_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 1, 0).unwrap();

    let points = measurement_points(MEASUREMENT, &measurements, written_at);
    let line = points[2].to_line_protocol().unwrap();

    assert_eq!(
        line,
        "detector_measurement,canton=BE,hasError=True,id=CH:0002.02,index=1,kind=none,\
         stationId=CH:0002 errorReason=\"detector offline\",numberOfInputValuesUsed=0i,value=0 \
         1709283660000000000"
    );
}

#[tokio::test]
async fn tick_writes_one_batch() {
    let store = Arc::new(FakeStore::default());
    let cycle = cycle(FakeFeed::new(FeedReply::Document(common::MSR_SAMPLE.to_vec())), store.clone());

    let outcome = cycle.run_once().await;

    assert_eq!(outcome, TickOutcome::Written { points: 6 });
    let writes = store.written();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 6);
}

#[tokio::test]
async fn skipped_fetch_writes_nothing() {
    let store = Arc::new(FakeStore::default());
    let cycle = cycle(FakeFeed::new(FeedReply::Skip), store.clone());

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, TickOutcome::Skipped { .. }));
    assert!(store.written().is_empty());
}

#[tokio::test]
async fn failed_fetch_writes_nothing() {
    let store = Arc::new(FakeStore::default());
    let cycle = cycle(FakeFeed::new(FeedReply::Fail), store.clone());

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, TickOutcome::Failed { error } if error.contains("503")));
    assert!(store.written().is_empty());
}

#[tokio::test]
async fn unparseable_report_writes_nothing() {
    let store = Arc::new(FakeStore::default());
    let cycle = cycle(
        FakeFeed::new(FeedReply::Document(b"<html>maintenance</html>".to_vec())),
        store.clone(),
    );

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, TickOutcome::Failed { .. }));
    assert!(store.written().is_empty());
}

#[tokio::test]
async fn failed_write_is_reported() {
    let store = Arc::new(FakeStore {
        fail_writes: true,
        ..FakeStore::default()
    });
    let cycle = cycle(FakeFeed::new(FeedReply::Document(common::MSR_SAMPLE.to_vec())), store);

    let outcome = cycle.run_once().await;

    assert!(matches!(outcome, TickOutcome::Failed { error } if error.contains("401")));
}

#[tokio::test]
async fn successful_write_invalidates_query_cache() {
    let cache = QueryCache::new(Duration::from_secs(60));
    cache
        .insert("flux:rows:stale".to_string(), Arc::new(vec![FluxTable::default()]))
        .await;
    assert!(cache.get("flux:rows:stale").await.is_some());

    let store = Arc::new(FakeStore::default());
    let cycle = cycle(FakeFeed::new(FeedReply::Document(common::MSR_SAMPLE.to_vec())), store)
        .with_cache(cache.clone());
    cycle.run_once().await;

    assert!(cache.get("flux:rows:stale").await.is_none());
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let store = Arc::new(FakeStore::default());
    let feed = FakeFeed::new(FeedReply::Document(common::MSR_SAMPLE.to_vec()))
        .with_delay(Duration::from_millis(100));
    let scheduler = IngestionScheduler::new(cycle(feed, store.clone()), Duration::from_secs(3600));

    // The first tick holds the slot while the slow fetch is pending
    let (first, second) = tokio::join!(scheduler.tick(), scheduler.tick());

    assert_eq!(first, Some(TickOutcome::Written { points: 6 }));
    assert_eq!(second, None);
    assert_eq!(store.written().len(), 1);
    assert!(!scheduler.tick_in_progress());

    // The slot is free again afterwards
    assert!(scheduler.tick().await.is_some());
}

#[tokio::test]
async fn status_reports_last_tick() {
    let store = Arc::new(FakeStore::default());
    let scheduler = IngestionScheduler::new(
        cycle(FakeFeed::new(FeedReply::Skip), store),
        Duration::from_secs(60),
    );

    let status = scheduler.status();
    assert!(!status.running);
    assert!(status.last_tick.is_none());
    assert_eq!(status.interval_seconds, 60);

    scheduler.tick().await;

    let status = scheduler.status();
    let last = status.last_tick.unwrap();
    assert!(matches!(last.outcome, TickOutcome::Skipped { .. }));
}

#[tokio::test]
async fn start_ticks_immediately_and_stop_ends_the_loop() {
    let store = Arc::new(FakeStore::default());
    let scheduler = Arc::new(IngestionScheduler::new(
        cycle(
            FakeFeed::new(FeedReply::Document(common::MSR_SAMPLE.to_vec())),
            store.clone(),
        ),
        Duration::from_secs(3600),
    ));

    scheduler.start();
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop().await;

    assert!(!scheduler.is_running());
    assert_eq!(store.written().len(), 1);
    assert!(scheduler.status().last_tick.is_some());
}

#[tokio::test]
async fn site_table_is_parsed_and_enriched() {
    let feed = FakeFeed::new(FeedReply::Skip);
    let stations = assert_ok!(fetch_stations(&feed, &common::catalog()).await).unwrap();

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].name, "Bern Wankdorf");
    assert_eq!(stations[1].canton, "ZH");
}

#[tokio::test]
async fn skipped_site_table_yields_none() {
    let feed = FakeFeed::new(FeedReply::Skip).with_site_table(FeedReply::Skip);
    let stations = assert_ok!(fetch_stations(&feed, &common::catalog()).await);
    assert!(stations.is_none());

    let failing = FakeFeed::new(FeedReply::Skip).with_site_table(FeedReply::Fail);
    assert_err!(fetch_stations(&failing, &common::catalog()).await);
}

#[test]
fn station_snapshot_survives_a_restart() {
    let reference = common::reference();
    let path = std::env::temp_dir().join(format!("traffic-db-snapshot-{}.json", std::process::id()));

    assert_ok!(write_station_snapshot(&path, &reference.stations));
    let loaded = assert_ok!(read_station_snapshot(&path));
    std::fs::remove_file(&path).ok();

    let loaded = loaded.unwrap();
    assert_eq!(loaded.len(), reference.stations.len());
    for (loaded, original) in loaded.iter().zip(&reference.stations) {
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.name, original.name);
        assert_eq!(loaded.canton, original.canton);
        assert_eq!(loaded.detectors.len(), original.detectors.len());
        let (lon, original_lon) = (loaded.longitude.unwrap(), original.longitude.unwrap());
        assert!((lon - original_lon).abs() < 1e-9);
    }
}

#[test]
fn missing_snapshot_reads_as_none() {
    let path = std::env::temp_dir().join("traffic-db-snapshot-does-not-exist.json");
    assert_eq!(assert_ok!(read_station_snapshot(&path)), None);
}
