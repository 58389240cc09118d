use lightminion_core::{
    ChannelAddress, DmxEngine, Disposition, FadeSettings, Light, LightChannel, LightEvent,
    LightValues, ReconcilerConfig, Slot, UniverseId, ValueEncoding,
};

const MINION: &str = "minion-1";

fn engine() -> DmxEngine {
    DmxEngine::new(ReconcilerConfig {
        identity: Some(MINION.to_string()),
        encoding: ValueEncoding::Normalized,
        require_settings: true,
    })
}

fn channel(universe: i64, address: i64) -> LightChannel {
    LightChannel::new(universe, address)
}

/// Settings that start now without a fade
fn immediate() -> Option<FadeSettings> {
    Some(FadeSettings {
        time: Some(0.0),
        fade: None,
    })
}

fn light(channels: Vec<LightChannel>, values: Vec<f64>, settings: Option<FadeSettings>) -> Light {
    Light {
        id: "light".to_string(),
        title: Some("Test light".to_string()),
        minion: Some(MINION.to_string()),
        channels,
        values: Some(LightValues::Indexed(values.into_iter().map(Some).collect())),
        settings,
    }
}

fn frame(engine: &DmxEngine, universe: u16) -> [u8; 512] {
    *engine
        .universes()
        .snapshot(UniverseId::new(universe).unwrap())
        .expect("universe exists")
}

fn slot(universe: u16, address: u16) -> Slot {
    Slot::new(
        UniverseId::new(universe).unwrap(),
        ChannelAddress::new(address).unwrap(),
    )
}

#[test]
fn one_second_fade_reaches_full() {
    let mut engine = engine();
    let now = 1_000.0;
    let l = light(
        vec![channel(1, 5)],
        vec![1.0],
        Some(FadeSettings {
            time: Some(now),
            fade: Some(1.0),
        }),
    );

    let report = engine.apply(LightEvent::Added(l), now).unwrap();
    assert_eq!(report.faded, 1);

    engine.tick(now + 0.5);
    let mid = frame(&engine, 1)[4];
    assert!((126..=128).contains(&mid), "mid-fade value {}", mid);
    assert_eq!(engine.fades().len(), 1);

    let report = engine.tick(now + 1.0);
    assert_eq!(frame(&engine, 1)[4], 255);
    assert_eq!(report.finished, vec![slot(1, 5)]);
    assert!(engine.fades().is_empty());
}

#[test]
fn settings_without_fade_write_immediately() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 10)],
        vec![0.5],
        immediate(),
    );

    engine.apply(LightEvent::Changed(l), 0.0);

    let value = frame(&engine, 1)[9];
    assert!(value == 127 || value == 128);
    assert!(engine.fades().is_empty());
}

#[test]
fn missing_settings_write_when_not_required() {
    let mut engine = DmxEngine::new(ReconcilerConfig {
        identity: None,
        encoding: ValueEncoding::Normalized,
        require_settings: false,
    });
    let l = light(vec![channel(1, 10)], vec![0.5], None);

    engine.apply(LightEvent::Added(l), 0.0);
    assert_eq!(frame(&engine, 1)[9], 128);
    assert!(engine.fades().is_empty());
}

#[test]
fn short_value_list_skips_extra_channel() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 1), channel(1, 2), channel(1, 3)],
        vec![1.0, 0.2],
        immediate(),
    );

    let report = engine.apply(LightEvent::Added(l), 0.0).unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 1);

    let f = frame(&engine, 1);
    assert_eq!(f[0], 255);
    assert_eq!(f[1], 51);
    assert_eq!(f[2], 0);
}

#[test]
fn reconciling_unchanged_document_writes_nothing() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 1)],
        vec![0.4],
        immediate(),
    );

    let first = engine.apply(LightEvent::Added(l.clone()), 0.0).unwrap();
    assert_eq!(first.written, 1);

    // Someone else changes the buffer; an identical document must not undo it
    engine.universes_mut().write(slot(1, 1), 7);
    let second = engine.apply(LightEvent::Changed(l), 0.0).unwrap();
    assert_eq!(second.disposition, Disposition::Unchanged);
    assert_eq!(second.written, 0);
    assert_eq!(frame(&engine, 1)[0], 7);
}

#[test]
fn unchanged_document_keeps_running_fade() {
    let mut engine = engine();
    let settings = Some(FadeSettings {
        time: Some(0.0),
        fade: Some(2.0),
    });
    let l = light(vec![channel(1, 1)], vec![1.0], settings);

    engine.apply(LightEvent::Added(l.clone()), 0.0);
    engine.tick(1.0);
    let before = frame(&engine, 1)[0];

    let report = engine.apply(LightEvent::Changed(l), 1.0).unwrap();
    assert_eq!(report.faded, 0);
    assert_eq!(engine.fades().get(slot(1, 1)).unwrap().start(), 0);

    engine.tick(1.0);
    assert_eq!(frame(&engine, 1)[0], before);
}

#[test]
fn retrigger_seeds_from_live_value() {
    let mut engine = engine();
    let up = light(
        vec![channel(1, 1)],
        vec![1.0],
        Some(FadeSettings {
            time: Some(0.0),
            fade: Some(2.0),
        }),
    );
    engine.apply(LightEvent::Added(up), 0.0);
    engine.tick(1.0);
    let live = frame(&engine, 1)[0];
    assert!((127..=128).contains(&live));

    let down = light(
        vec![channel(1, 1)],
        vec![0.0],
        Some(FadeSettings {
            time: Some(1.0),
            fade: Some(2.0),
        }),
    );
    engine.apply(LightEvent::Changed(down), 1.0);

    let fade = engine.fades().get(slot(1, 1)).unwrap();
    assert_eq!(fade.start(), live);
    assert_eq!(fade.end(), 0);

    // First tick after the replacement continues from the live value
    engine.tick(1.0);
    assert_eq!(frame(&engine, 1)[0], live);
    engine.tick(2.0);
    assert!(frame(&engine, 1)[0] < live);
}

#[test]
fn channel_address_bounds() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 1), channel(1, 512), channel(1, 0), channel(1, 513)],
        vec![1.0, 1.0, 1.0, 1.0],
        immediate(),
    );

    let report = engine.apply(LightEvent::Added(l), 0.0).unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 2);

    let f = frame(&engine, 1);
    assert_eq!(f[0], 255);
    assert_eq!(f[511], 255);
    assert_eq!(f.iter().filter(|&&v| v != 0).count(), 2);
}

#[test]
fn invalid_universe_is_skipped() {
    let mut engine = engine();
    let l = light(
        vec![channel(0, 1), channel(2, 1)],
        vec![1.0, 1.0],
        immediate(),
    );

    let report = engine.apply(LightEvent::Added(l), 0.0).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(engine.universes().len(), 1);
    assert_eq!(frame(&engine, 2)[0], 255);
}

#[test]
fn keyed_values_and_raw_encoding() {
    let mut engine = DmxEngine::new(ReconcilerConfig {
        identity: Some(MINION.to_string()),
        encoding: ValueEncoding::Raw,
        require_settings: true,
    });
    let l: Light = serde_json::from_value(serde_json::json!({
        "_id": "rgb",
        "minion": MINION,
        "channels": [
            { "universe": 3, "address": 1, "type": "red" },
            { "universe": 3, "address": 2, "type": "green" },
            { "universe": 3, "address": 3, "type": "blue" }
        ],
        "values": { "red": 200, "green": 17 },
        "settings": { "time": 0 }
    }))
    .unwrap();

    engine.apply(LightEvent::Added(l), 0.0);
    let f = frame(&engine, 3);
    assert_eq!(&f[..3], &[200, 17, 0]);
}

#[test]
fn pending_fade_waits_for_start_time() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 1)],
        vec![1.0],
        Some(FadeSettings {
            time: Some(10.0),
            fade: Some(1.0),
        }),
    );
    engine.apply(LightEvent::Added(l), 5.0);

    engine.tick(9.0);
    assert_eq!(frame(&engine, 1)[0], 0);
    engine.tick(10.5);
    assert!((127..=128).contains(&frame(&engine, 1)[0]));
}

#[test]
fn empty_settings_block_is_unconfigured() {
    let mut engine = engine();
    let l = light(
        vec![channel(1, 1)],
        vec![1.0],
        Some(FadeSettings::default()),
    );

    let report = engine.apply(LightEvent::Added(l), 0.0).unwrap();
    assert_eq!(report.disposition, Disposition::Unconfigured);
    assert!(engine.universes().is_empty());
}

#[test]
fn malformed_channel_entries_skip_only_that_channel() {
    let documents = [
        // Second channel has no address
        serde_json::json!({
            "_id": "a",
            "minion": MINION,
            "channels": [{ "universe": 1, "address": 1 }, { "universe": 1 }],
            "values": [1.0, 1.0],
            "settings": { "time": 0 }
        }),
        // Second value is not a number
        serde_json::json!({
            "_id": "b",
            "minion": MINION,
            "channels": [{ "universe": 1, "address": 1 }, { "universe": 1, "address": 2 }],
            "values": [1.0, "oops"],
            "settings": { "time": 0 }
        }),
        // Second address is fractional
        serde_json::json!({
            "_id": "c",
            "minion": MINION,
            "channels": [{ "universe": 1, "address": 1 }, { "universe": 1, "address": 2.5 }],
            "values": [1.0, 1.0],
            "settings": { "time": 0 }
        }),
    ];

    for document in documents {
        let mut engine = engine();
        let l: Light = serde_json::from_value(document).unwrap();

        let report = engine.apply(LightEvent::Added(l), 0.0).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);

        let f = frame(&engine, 1);
        assert_eq!(f[0], 255);
        assert_eq!(f[1], 0);
    }
}

#[test]
fn integral_float_address_is_accepted() {
    let mut engine = engine();
    let l: Light = serde_json::from_value(serde_json::json!({
        "_id": "f",
        "minion": MINION,
        "channels": [{ "universe": 2.0, "address": 7.0 }],
        "values": [1.0],
        "settings": { "time": 0 }
    }))
    .unwrap();

    engine.apply(LightEvent::Added(l), 0.0);
    assert_eq!(frame(&engine, 2)[6], 255);
}
