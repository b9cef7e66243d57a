use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use weewx_config::RealtimeConfig;
use weex_archive::IntervalAggregator;
use weex_core::{
    unit_systems, ArchiveRecord, ArchiveStore, DaySummary, ObservationValue, Timestamp,
    WeatherPacket, WindroseRow,
};
use weex_realtime::{
    event_queue, ChannelSink, Engine, EngineEvent, EngineState, Enrichment, MemoryArchiveStore,
    RealtimeError, Snapshot, StatsUpdate,
};

// 2024-10-04T00:00:00Z
const DAY: Timestamp = 86_400 * 20_000;

fn config() -> RealtimeConfig {
    RealtimeConfig {
        poll_timeout_ms: 20,
        ..Default::default()
    }
}

fn packet(ts: Timestamp) -> WeatherPacket {
    WeatherPacket::new(ts, Some(unit_systems::METRIC))
}

fn record(ts: Timestamp, fields: &[(&str, f64)]) -> ArchiveRecord {
    let aggregates: HashMap<String, ObservationValue> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), ObservationValue::Float(*v)))
        .collect();
    ArchiveRecord {
        date_time: ts,
        interval: 300,
        us_units: unit_systems::METRIC,
        extremes: Default::default(),
        aggregates,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Snapshot>) -> Vec<Snapshot> {
    let mut out = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        out.push(snapshot);
    }
    out
}

/// Queue `events`, run an engine over them until the trailing shutdown and
/// return every snapshot it emitted
async fn run_engine(
    config: RealtimeConfig,
    store: Arc<dyn ArchiveStore>,
    events: Vec<EngineEvent>,
) -> Vec<Snapshot> {
    let (tx, rx) = event_queue(config.backlog);
    for event in events {
        tx.push(event);
    }
    tx.shutdown();

    let (sink, mut snapshots) = ChannelSink::new();
    let handle = Engine::new(config, store, Box::new(sink))
        .unwrap()
        .spawn(rx);
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("engine did not finish")
        .expect("engine failed");
    drain(&mut snapshots)
}

struct OfflineStore;

#[async_trait::async_trait]
impl ArchiveStore for OfflineStore {
    async fn day_summary(&self, _ts: Timestamp) -> anyhow::Result<DaySummary> {
        anyhow::bail!("archive offline")
    }

    async fn windrose_rows(
        &self,
        _start: Timestamp,
        _end: Timestamp,
        _sector_width: f64,
    ) -> anyhow::Result<Vec<WindroseRow>> {
        anyhow::bail!("archive offline")
    }

    async fn nearest_record(
        &self,
        _target: Timestamp,
        _grace: i64,
    ) -> anyhow::Result<Option<ArchiveRecord>> {
        anyhow::bail!("archive offline")
    }

    async fn latest_record(&self) -> anyhow::Result<Option<ArchiveRecord>> {
        anyhow::bail!("archive offline")
    }
}

#[tokio::test]
async fn test_backlog_keeps_only_newest_samples() {
    let events = (0..100)
        .map(|i| EngineEvent::Sample(packet(DAY + i).with("outTemp", Some(i as f64))))
        .collect();
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;

    let times: Vec<_> = snapshots.iter().map(|s| s.date_time).collect();
    assert_eq!(times, (95..100).map(|i| DAY + i).collect::<Vec<_>>());
    let last = snapshots.last().unwrap();
    assert_eq!(last.extremes["outTemp"].stats.low, Some(95.0));
    assert_eq!(last.extremes["outTemp"].stats.count, 5);
}

#[tokio::test]
async fn test_boundary_resets_accumulators_but_not_windows() {
    let wind = |ts, speed, gust| {
        packet(ts)
            .with("windSpeed", Some(speed))
            .with("windGust", Some(gust))
            .with("windDir", Some(90.0))
    };
    let events = vec![
        EngineEvent::Sample(wind(DAY + 1000, 5.0, 9.0)),
        EngineEvent::Sample(wind(DAY + 1010, 3.0, 4.0)),
        EngineEvent::PeriodBoundary {
            timestamp: DAY + 1020,
        },
        EngineEvent::Sample(wind(DAY + 1030, 2.0, 3.0)),
    ];
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;
    assert_eq!(snapshots.len(), 3);

    let before = &snapshots[1];
    assert_eq!(before.extremes["windSpeed"].stats.high, Some(5.0));
    assert_eq!(before.wind.high_today, Some(5.0));

    let after = &snapshots[2];
    assert_eq!(after.extremes["windSpeed"].stats.high, Some(2.0));
    assert_eq!(after.extremes["windSpeed"].stats.count, 1);
    assert_eq!(after.wind.high_today, Some(2.0));
    // the ten minute gust still remembers the pre-boundary samples
    assert_eq!(after.wind.gust, 9.0);
    assert_eq!(after.wind.gust_time, Some(DAY + 1000));
    assert!((after.wind.average - 10.0 / 3.0).abs() < 1e-9);
    assert_eq!(after.windrose, vec![0.0; 16]);
}

/// Never answers, like an archive stuck on a lock
struct HangingStore;

#[async_trait::async_trait]
impl ArchiveStore for HangingStore {
    async fn day_summary(&self, _ts: Timestamp) -> anyhow::Result<DaySummary> {
        std::future::pending::<anyhow::Result<DaySummary>>().await
    }

    async fn windrose_rows(
        &self,
        _start: Timestamp,
        _end: Timestamp,
        _sector_width: f64,
    ) -> anyhow::Result<Vec<WindroseRow>> {
        std::future::pending::<anyhow::Result<Vec<WindroseRow>>>().await
    }

    async fn nearest_record(
        &self,
        _target: Timestamp,
        _grace: i64,
    ) -> anyhow::Result<Option<ArchiveRecord>> {
        std::future::pending::<anyhow::Result<Option<ArchiveRecord>>>().await
    }

    async fn latest_record(&self) -> anyhow::Result<Option<ArchiveRecord>> {
        std::future::pending::<anyhow::Result<Option<ArchiveRecord>>>().await
    }
}

#[tokio::test]
async fn test_gust_falls_back_to_wind_speed() {
    let wind = |ts, speed| {
        packet(ts)
            .with("windSpeed", Some(speed))
            .with("windDir", Some(90.0))
    };
    let events = vec![
        EngineEvent::Sample(wind(DAY + 10, 12.0)),
        EngineEvent::Sample(wind(DAY + 20, 4.0)),
    ];
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;
    assert_eq!(snapshots.len(), 2);

    let wind = &snapshots[1].wind;
    assert_eq!(wind.gust, 12.0);
    assert_eq!(wind.gust_time, Some(DAY + 10));
    assert_eq!(wind.average, 8.0);
}

#[tokio::test]
async fn test_loop_high_survives_archive_boundary() {
    let store = Arc::new(MemoryArchiveStore::new());
    let mut aggregator = IntervalAggregator::new(300, unit_systems::METRIC).unwrap();
    let sample = |ts, temp| {
        packet(ts)
            .with("outTemp", Some(temp))
            .with("windSpeed", Some(3.0))
            .with("windDir", Some(90.0))
    };

    let mut events = Vec::new();
    for (ts, temp) in [(DAY + 100, 20.0), (DAY + 200, 30.0), (DAY + 250, 20.0)] {
        let p = sample(ts, temp);
        assert!(aggregator.add_packet(&p).unwrap().is_none());
        events.push(EngineEvent::Sample(p));
    }
    let next = sample(DAY + 310, 21.0);
    let record = aggregator.add_packet(&next).unwrap().unwrap();
    assert_eq!(record.date_time, DAY + 300);
    let boundary = record.date_time + 1;
    store.insert(record).await;
    events.push(EngineEvent::PeriodBoundary {
        timestamp: boundary,
    });
    events.push(EngineEvent::Sample(next));

    let snapshots = run_engine(config(), store, events).await;
    assert_eq!(snapshots.len(), 4);

    let before = &snapshots[2].extremes["outTemp"].stats;
    assert_eq!(before.high, Some(30.0));
    assert_eq!(before.high_time, Some(DAY + 200));

    let after = &snapshots[3];
    let out_temp = &after.extremes["outTemp"].stats;
    assert_eq!(out_temp.high, Some(30.0));
    assert_eq!(out_temp.high_time, Some(DAY + 200));
    assert_eq!(out_temp.low, Some(20.0));
    assert_eq!(out_temp.low_time, Some(DAY + 100));
    assert_eq!(after.wind.high_today, Some(3.0));
    assert_eq!(after.wind.high_today_time, Some(DAY + 100));
    // the record just archived is already part of the windrose
    assert_eq!(after.windrose[4], 3.0);
}

#[tokio::test]
async fn test_baseline_merges_into_day_extremes() {
    let store = Arc::new(MemoryArchiveStore::new());
    store.insert(record(DAY - 3290, &[("outTemp", 18.5)])).await;
    store.insert(record(DAY + 300, &[("outTemp", 25.0)])).await;

    let events = vec![
        EngineEvent::PeriodBoundary {
            timestamp: DAY + 300,
        },
        EngineEvent::Sample(packet(DAY + 310).with("outTemp", Some(20.0))),
    ];
    let snapshots = run_engine(config(), store, events).await;
    assert_eq!(snapshots.len(), 1);

    let out_temp = &snapshots[0].extremes["outTemp"];
    assert_eq!(out_temp.stats.high, Some(25.0));
    assert_eq!(out_temp.stats.high_time, Some(DAY + 300));
    assert_eq!(out_temp.stats.low, Some(20.0));
    assert_eq!(out_temp.stats.low_time, Some(DAY + 310));
    assert_eq!(out_temp.average, 22.5);

    assert_eq!(snapshots[0].trends["outTemp"], Some(1.5));
    assert_eq!(snapshots[0].trends["barometer"], None);
}

#[tokio::test]
async fn test_windrose_refreshed_at_boundary() {
    let store = Arc::new(MemoryArchiveStore::new());
    store
        .insert(record(DAY + 600, &[("windSpeed", 4.0), ("windDir", 90.0)]))
        .await;
    store
        .insert(record(DAY + 900, &[("windSpeed", 2.0), ("windDir", 358.0)]))
        .await;

    let events = vec![
        EngineEvent::PeriodBoundary {
            timestamp: DAY + 1200,
        },
        EngineEvent::Sample(packet(DAY + 1210).with("outTemp", Some(10.0))),
    ];
    let snapshots = run_engine(config(), store, events).await;

    let rose = &snapshots[0].windrose;
    assert_eq!(rose.len(), 16);
    assert_eq!(rose[0], 2.0);
    assert_eq!(rose[4], 4.0);
    assert_eq!(rose.iter().sum::<f64>(), 6.0);
}

#[tokio::test]
async fn test_stats_updates_merge() {
    let events = vec![
        EngineEvent::Stats(StatsUpdate {
            all_time_min_barometer: Some(980.0),
            ..Default::default()
        }),
        EngineEvent::Stats(StatsUpdate {
            all_time_max_barometer: Some(1040.0),
            sensor_contact_lost: Some(false),
            ..Default::default()
        }),
        EngineEvent::Sample(packet(DAY + 10).with("barometer", Some(1012.0))),
    ];
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;

    let stats = &snapshots[0].stats;
    assert_eq!(stats.all_time_min_barometer, Some(980.0));
    assert_eq!(stats.all_time_max_barometer, Some(1040.0));
    assert_eq!(stats.sensor_contact_lost, Some(false));
}

#[tokio::test]
async fn test_unit_mismatch_sample_is_skipped() {
    let events = vec![
        EngineEvent::Sample(packet(DAY + 10).with("outTemp", Some(20.0))),
        EngineEvent::Sample(
            WeatherPacket::new(DAY + 20, Some(unit_systems::US)).with("outTemp", Some(68.0)),
        ),
        EngineEvent::Sample(packet(DAY + 30).with("outTemp", Some(21.0))),
    ];
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;

    assert_eq!(snapshots.len(), 2);
    let last = &snapshots[1];
    assert_eq!(last.date_time, DAY + 30);
    assert_eq!(last.us_units, Some(unit_systems::METRIC));
    assert_eq!(last.extremes["outTemp"].stats.high, Some(21.0));
    assert_eq!(last.current.value("outTemp"), Some(21.0));
}

#[tokio::test]
async fn test_partial_packets_fill_from_cache() {
    let store = Arc::new(MemoryArchiveStore::new());
    store
        .insert(record(DAY, &[("outTemp", 15.0), ("barometer", 1009.0)]))
        .await;

    let events = vec![
        EngineEvent::Sample(packet(DAY + 10).with("barometer", Some(1010.0))),
        EngineEvent::Sample(packet(DAY + 20).with("windSpeed", Some(3.0))),
    ];
    let snapshots = run_engine(config(), store, events).await;

    let last = &snapshots[1];
    assert_eq!(last.current.value("outTemp"), Some(15.0));
    assert_eq!(last.current.value("barometer"), Some(1010.0));
    assert_eq!(last.current.value("windSpeed"), Some(3.0));
    assert!(last.current.values.contains_key("UV"));
    assert_eq!(last.current.value("UV"), None);
}

#[tokio::test]
async fn test_calm_wind_keeps_last_bearing() {
    let events = vec![
        EngineEvent::Sample(
            packet(DAY + 10)
                .with("windSpeed", Some(4.0))
                .with("windDir", Some(270.0)),
        ),
        EngineEvent::Sample(
            packet(DAY + 20)
                .with("windSpeed", Some(0.0))
                .with("windDir", None),
        ),
    ];
    let snapshots = run_engine(config(), Arc::new(MemoryArchiveStore::new()), events).await;

    let wind = &snapshots[1].wind;
    assert_eq!(wind.bearing, 270.0);
    assert_eq!(wind.latest, Some(0.0));
    assert!((wind.average_bearing - 270.0).abs() < 1e-9);
    assert_eq!(wind.dominant_compass, Some("W"));
    assert_eq!(wind.bearing_at_high, Some(270.0));
}

#[tokio::test]
async fn test_throttle_limits_snapshots() {
    let config = RealtimeConfig {
        min_interval: 3600,
        ..config()
    };
    let events = (0..3)
        .map(|i| EngineEvent::Sample(packet(DAY + i).with("outTemp", Some(1.0))))
        .collect();
    let snapshots = run_engine(config, Arc::new(MemoryArchiveStore::new()), events).await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].date_time, DAY);
}

#[tokio::test]
async fn test_offline_store_degrades_gracefully() {
    let events = vec![
        EngineEvent::Sample(packet(DAY + 10).with("outTemp", Some(10.0))),
        EngineEvent::PeriodBoundary {
            timestamp: DAY + 20,
        },
        EngineEvent::Sample(packet(DAY + 30).with("outTemp", Some(12.0))),
    ];
    let snapshots = run_engine(config(), Arc::new(OfflineStore), events).await;
    assert_eq!(snapshots.len(), 2);

    let last = &snapshots[1];
    assert_eq!(last.windrose, vec![0.0; 16]);
    assert_eq!(last.trends["outTemp"], None);
    // no new baseline, so the loop accumulators were not reset
    assert_eq!(last.extremes["outTemp"].stats.low, Some(10.0));
    assert_eq!(last.extremes["outTemp"].stats.high, Some(12.0));
}

#[tokio::test]
async fn test_forecast_enrichment_is_attached() {
    let (enrich_tx, enrich_rx) = mpsc::channel(4);
    enrich_tx
        .send(Enrichment::Forecast("Sunny, light winds".to_string()))
        .await
        .unwrap();

    let (tx, rx) = event_queue(5);
    tx.sample(packet(DAY + 10).with("outTemp", Some(10.0)));
    tx.shutdown();

    let (sink, mut snapshots) = ChannelSink::new();
    let handle = Engine::new(config(), Arc::new(MemoryArchiveStore::new()), Box::new(sink))
        .unwrap()
        .with_enrichment(enrich_rx)
        .spawn(rx);
    handle.join().await.unwrap();

    let snapshots = drain(&mut snapshots);
    assert_eq!(snapshots[0].forecast.as_deref(), Some("Sunny, light winds"));
}

#[tokio::test]
async fn test_queue_closed_is_fatal() {
    let (tx, rx) = event_queue(5);
    let (sink, _snapshots) = ChannelSink::new();
    let handle = Engine::new(config(), Arc::new(MemoryArchiveStore::new()), Box::new(sink))
        .unwrap()
        .spawn(rx);
    let mut state = handle.subscribe();

    drop(tx);
    let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap();
    assert!(matches!(result, Err(RealtimeError::QueueClosed)));
    assert_eq!(*state.borrow_and_update(), EngineState::Stopped);
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let (tx, rx) = event_queue(5);
    let (sink, mut snapshots) = ChannelSink::new();
    let handle = Engine::new(config(), Arc::new(MemoryArchiveStore::new()), Box::new(sink))
        .unwrap()
        .spawn(rx);
    let mut state = handle.subscribe();

    tx.sample(packet(DAY + 10).with("outTemp", Some(10.0)));
    let first = tokio::time::timeout(Duration::from_secs(5), snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.date_time, DAY + 10);
    assert_eq!(*state.borrow_and_update(), EngineState::Running);

    handle.shutdown(&tx, Duration::from_secs(5)).await.unwrap();
    assert_eq!(*state.borrow_and_update(), EngineState::Stopped);
}

#[tokio::test]
async fn test_shutdown_aborts_stuck_engine() {
    let (tx, rx) = event_queue(5);
    let (sink, _snapshots) = ChannelSink::new();
    let handle = Engine::new(config(), Arc::new(HangingStore), Box::new(sink))
        .unwrap()
        .spawn(rx);
    let mut state = handle.subscribe();

    tokio::time::timeout(
        Duration::from_secs(5),
        handle.shutdown(&tx, Duration::from_millis(100)),
    )
    .await
    .expect("shutdown did not honour its grace period")
    .unwrap();

    // the task never got past startup, so it never reached Stopped
    assert_eq!(*state.borrow_and_update(), EngineState::Running);
    let closed = tokio::time::timeout(Duration::from_secs(5), state.changed())
        .await
        .expect("aborted task kept its state channel open");
    assert!(closed.is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = RealtimeConfig {
        windrose_points: 0,
        ..config()
    };
    let (sink, _snapshots) = ChannelSink::new();
    let result = Engine::new(config, Arc::new(MemoryArchiveStore::new()), Box::new(sink));
    assert!(matches!(result, Err(RealtimeError::Config(_))));
}
