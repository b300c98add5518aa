//! Scenario: incomplete upstream data degrades to the last known value.
//!
//! # Invariants under test
//!
//! 1. A property holding "12.3" keeps it when the next reading is absent,
//!    null or empty, and no value-changed effect is emitted.
//! 2. A property omitted entirely from a later measurement is kept (stale,
//!    not deleted).
//! 3. The property set of a device never shrinks over any sequence of
//!    measurements.
//! 4. `P1 = "10"` followed by `P1 = "20"` in one measurement stores "20".

use std::collections::BTreeSet;

use luft_core::testkit::RecordingSink;
use luft_core::{reconcile, DeviceRegistry, NullSink, PassStamp, PropertyChange};
use luft_md::{MeasuredValue, NormalizedMeasurement, SensorIdentity};

fn m(values: &[(&str, Option<&str>)]) -> NormalizedMeasurement {
    NormalizedMeasurement {
        identity: SensorIdentity::new(9),
        values: values.iter().map(|(n, v)| MeasuredValue::new(*n, *v)).collect(),
    }
}

#[test]
fn absent_reading_keeps_last_value_without_notify() {
    let mut reg = DeviceRegistry::default();
    let (dev, _) = reg.get_or_create(&SensorIdentity::new(9));
    reconcile(dev, &m(&[("P1", Some("12.3"))]), PassStamp::new(1), &NullSink);

    for (seq, missing) in [(2, None), (3, Some(""))] {
        let sink = RecordingSink::default();
        let changes = reconcile(dev, &m(&[("P1", missing)]), PassStamp::new(seq), &sink);

        assert_eq!(dev.value_of("P1"), Some("12.3"));
        assert!(sink.published().is_empty());
        assert_eq!(changes, vec![PropertyChange::ValueMissing { name: "P1".into() }]);
    }
}

#[test]
fn omitted_property_is_stale_not_deleted() {
    let mut reg = DeviceRegistry::default();
    let (dev, _) = reg.get_or_create(&SensorIdentity::new(9));
    reconcile(
        dev,
        &m(&[("P1", Some("1")), ("P2", Some("2"))]),
        PassStamp::new(1),
        &NullSink,
    );
    reconcile(dev, &m(&[("P1", Some("3"))]), PassStamp::new(2), &NullSink);

    assert_eq!(dev.value_of("P2"), Some("2"));
    assert_eq!(dev.stale_properties(2), vec!["P2"]);
    assert!(dev.stale_properties(3).contains(&"P1"));
}

#[test]
fn property_set_is_monotonic() {
    let mut reg = DeviceRegistry::default();
    let (dev, _) = reg.get_or_create(&SensorIdentity::new(9));

    let sequence = [
        m(&[("P1", Some("1"))]),
        m(&[]),
        m(&[("P2", None)]),
        m(&[("humidity", Some("40")), ("P1", None)]),
        m(&[("P2", Some(""))]),
    ];

    let mut previous: BTreeSet<String> = BTreeSet::new();
    for (i, measurement) in sequence.iter().enumerate() {
        reconcile(dev, measurement, PassStamp::new(i as u64 + 1), &NullSink);
        let now: BTreeSet<String> = dev.properties.keys().cloned().collect();
        assert!(previous.is_subset(&now), "property set shrank at step {i}");
        previous = now;
    }
    assert_eq!(dev.property_names(), vec!["P1", "P2", "humidity"]);
}

#[test]
fn later_reading_in_same_measurement_wins() {
    let mut reg = DeviceRegistry::default();
    let (dev, _) = reg.get_or_create(&SensorIdentity::new(9));
    let sink = RecordingSink::default();

    reconcile(
        dev,
        &m(&[("P1", Some("10")), ("P1", Some("20"))]),
        PassStamp::new(1),
        &sink,
    );

    assert_eq!(dev.value_of("P1"), Some("20"));
    assert_eq!(sink.declared().len(), 1);
    assert_eq!(
        sink.published(),
        vec![
            ("sensor-9".to_string(), "P1".to_string(), "10".to_string()),
            ("sensor-9".to_string(), "P1".to_string(), "20".to_string()),
        ]
    );
}
