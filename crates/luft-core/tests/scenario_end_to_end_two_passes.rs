//! Scenario: two passes over the same sensor.
//!
//! # Invariants under test
//!
//! 1. The first pass creates `sensor-42`, announces it once, declares `P1`
//!    and `P2`, stores `P1 = "10"` and leaves `P2` declared without a value.
//! 2. The second pass updates both values through notify and does not
//!    announce the device again.

use std::sync::Arc;

use luft_core::testkit::{RecordingSink, ScriptedFetcher, SinkEvent};
use luft_core::{DeviceRegistry, Poller};
use luft_md::RawRecord;
use serde_json::json;

fn record(p1: Option<&str>, p2: Option<&str>) -> RawRecord {
    RawRecord::new(json!({
        "sensor": {
            "id": 42,
            "sensor_type": { "name": "SDS011", "manufacturer": "Nova Fitness" }
        },
        "sensordatavalues": [
            { "value_type": "P1", "value": p1 },
            { "value_type": "P2", "value": p2 }
        ]
    }))
}

#[tokio::test]
async fn first_pass_creates_second_pass_updates() {
    let fetcher = ScriptedFetcher::new([
        Ok(vec![record(Some("10"), None)]),
        Ok(vec![record(Some("11"), Some("5"))]),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let mut poller = Poller::new(Box::new(fetcher), sink.clone(), DeviceRegistry::default());

    // Pass 1
    let r1 = poller.run_pass().await.unwrap();
    assert_eq!(r1.devices_created, 1);
    assert_eq!(r1.properties_declared, 2);
    assert_eq!(r1.values_published, 1);
    assert_eq!(r1.values_missing, 1);

    let dev = poller.registry().lookup(42).expect("device created");
    assert_eq!(dev.id, "sensor-42");
    assert_eq!(dev.display_name(), "Nova Fitness SDS011");
    assert_eq!(dev.value_of("P1"), Some("10"));
    assert!(dev.property("P2").is_some());
    assert_eq!(dev.value_of("P2"), None);

    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::DeviceAnnounced {
                device_id: "sensor-42".into(),
                name: "Nova Fitness SDS011".into()
            },
            SinkEvent::PropertyDeclared {
                device_id: "sensor-42".into(),
                name: "P1".into()
            },
            SinkEvent::ValuePublished {
                device_id: "sensor-42".into(),
                name: "P1".into(),
                value: "10".into()
            },
            SinkEvent::PropertyDeclared {
                device_id: "sensor-42".into(),
                name: "P2".into()
            },
        ]
    );

    // Pass 2
    sink.clear();
    let r2 = poller.run_pass().await.unwrap();
    assert_eq!(r2.devices_created, 0);
    assert_eq!(r2.properties_declared, 0);
    assert_eq!(r2.values_published, 2);

    let dev = poller.registry().lookup(42).unwrap();
    assert_eq!(dev.value_of("P1"), Some("11"));
    assert_eq!(dev.value_of("P2"), Some("5"));

    assert!(sink.announced().is_empty(), "no second device-added effect");
    assert_eq!(
        sink.published(),
        vec![
            ("sensor-42".to_string(), "P1".to_string(), "11".to_string()),
            ("sensor-42".to_string(), "P2".to_string(), "5".to_string()),
        ]
    );
    assert_eq!(poller.registry().len(), 1);
}

#[tokio::test]
async fn renamed_sensor_keeps_identity_and_name() {
    let renamed = RawRecord::new(json!({
        "sensor": { "id": 42, "sensor_type": { "name": "SDS021" } },
        "sensordatavalues": [ { "value_type": "P1", "value": "3" } ]
    }));
    let fetcher = ScriptedFetcher::new([Ok(vec![record(Some("1"), None)]), Ok(vec![renamed])]);
    let sink = Arc::new(RecordingSink::default());
    let mut poller = Poller::new(Box::new(fetcher), sink.clone(), DeviceRegistry::default());

    poller.run_pass().await.unwrap();
    poller.run_pass().await.unwrap();

    let dev = poller.registry().lookup(42).unwrap();
    assert_eq!(dev.id, "sensor-42");
    assert_eq!(dev.display_name(), "Nova Fitness SDS011");
    assert_eq!(dev.value_of("P1"), Some("3"));
    assert_eq!(sink.announced(), vec!["sensor-42".to_string()]);
}
