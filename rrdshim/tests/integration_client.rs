//! Integration tests for the safe client.
//!
//! These tests drive [`Client`] end to end against the mock library: the
//! argument vectors each builder produces, the owned results copied out of
//! librrd-style buffers, release of every buffer, and config loading.

use rrdshim::config::DAEMON_ENV;
use rrdshim::error::{ConfigError, CreateError};
use rrdshim::mock::{MockLibrary, Operation};
use rrdshim::{
    Client, ClientConfig, ConsolidationFn, Creator, DsType, Exporter, Grapher, Info, InfoValue,
    RrdError, Updater,
};
use tempfile::tempdir;

/// Base timestamp for tests, aligned to every step used below.
const BASE_TIME: i64 = 1_700_000_100;

fn client() -> Client<MockLibrary> {
    Client::new(MockLibrary::new())
}

#[test]
fn test_create_renders_arguments() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("net.rrd");
    let client = client();

    let mut creator = Creator::new(&path, BASE_TIME, 60);
    creator
        .ds("in", DsType::Counter, 120, Some(0.0), None)
        .ds("out", DsType::Counter, 120, Some(0.0), None)
        .rra(ConsolidationFn::Average, 0.5, 1, 1440)
        .rra(ConsolidationFn::Max, 0.5, 60, 720);
    client.create(&creator).unwrap();

    let calls = client.library().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, Operation::Create);
    assert_eq!(calls[0].args[0], path.to_string_lossy());
    assert_eq!(
        calls[0].args[1..],
        [
            "60",
            "1700000100",
            "DS:in:COUNTER:120:0:U",
            "DS:out:COUNTER:120:0:U",
            "RRA:AVERAGE:0.5:1:1440",
            "RRA:MAX:0.5:60:720",
        ]
    );
}

#[test]
fn test_create_existing_file_is_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("net.rrd");
    std::fs::write(&path, b"RRD").unwrap();

    let client = client();
    let err = client.create(&Creator::new(&path, 0, 60)).unwrap_err();
    assert!(matches!(err, RrdError::Create(CreateError::FileExists { .. })));
    assert!(err.to_string().contains("already exists"));
    assert!(client.library().calls().is_empty());
}

#[test]
fn test_create_library_failure() {
    let dir = tempdir().unwrap();
    let client = client();
    client
        .library()
        .fail(Operation::Create, "you must define at least one Data Source");

    let err = client
        .create(&Creator::new(dir.path().join("empty.rrd"), 0, 60))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "librrd error: create: you must define at least one Data Source"
    );
}

#[test]
fn test_update_sends_queue_once() {
    let client = client();
    let mut updater = Updater::new("net.rrd");
    updater
        .cache(Some(BASE_TIME + 60), &[10.0, 20.0])
        .cache(Some(BASE_TIME + 120), &[f64::NAN, 25.0]);
    client.update(&mut updater).unwrap();
    assert!(updater.pending().is_empty());

    client.update_now("net.rrd", &[1.0, 2.0]).unwrap();

    let calls = client.library().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].args,
        ["net.rrd", "", "1700000160:10:20", "1700000220:U:25"]
    );
    assert_eq!(calls[1].args, ["net.rrd", "", "N:1:2"]);
}

#[test]
fn test_fetch_copies_rows() {
    let client = client();
    client.library().set_fetch_output(
        BASE_TIME,
        BASE_TIME + 180,
        60,
        &["in", "out"],
        &[1.0, 2.0, 3.0, 4.0, f64::NAN, 6.0],
    );

    let result = client
        .fetch("net.rrd", ConsolidationFn::Average, BASE_TIME, BASE_TIME + 180, 60)
        .unwrap();
    assert_eq!(result.ds_names, ["in", "out"]);
    assert_eq!(result.row_count, 3);
    assert_eq!(result.step, 60);
    assert_eq!(result.value_at(1, 1), Some(4.0));
    assert!(result.value_at(0, 2).unwrap().is_nan());

    let stamps: Vec<i64> = result.rows().map(|(ts, _)| ts).collect();
    assert_eq!(stamps, [BASE_TIME + 60, BASE_TIME + 120, BASE_TIME + 180]);

    assert_eq!(client.library().outstanding_allocations(), 0);

    let calls = client.library().calls();
    assert_eq!(
        calls[0].args,
        ["net.rrd", "AVERAGE", "1700000100", "1700000280", "60"]
    );
}

#[test]
fn test_info_data_sources() {
    let client = client();
    client.library().set_info(Info::from_entries([
        ("filename", InfoValue::Str("net.rrd".to_string())),
        ("step", InfoValue::Count(60)),
        ("last_update", InfoValue::Count(1_700_000_220)),
        ("ds[out].index", InfoValue::Count(1)),
        ("ds[out].type", InfoValue::Str("COUNTER".to_string())),
        ("ds[in].index", InfoValue::Count(0)),
        ("ds[in].type", InfoValue::Str("COUNTER".to_string())),
        ("rra[0].cf", InfoValue::Str("AVERAGE".to_string())),
        ("rra[1].cf", InfoValue::Str("MAX".to_string())),
    ]));

    let info = client.info("net.rrd").unwrap();
    assert_eq!(info.step(), Some(60));
    assert_eq!(info.last_update(), Some(1_700_000_220));
    assert_eq!(
        info.data_sources(),
        [("in".to_string(), 0), ("out".to_string(), 1)]
    );
    assert_eq!(info.rra_count(), 2);
    assert_eq!(client.library().outstanding_allocations(), 0);
}

#[test]
fn test_info_failure() {
    let client = client();
    client
        .library()
        .fail(Operation::Info, "opening 'gone.rrd': No such file or directory");
    let err = client.info("gone.rrd").unwrap_err();
    assert!(matches!(err, RrdError::Library(_)));
    assert_eq!(client.library().outstanding_allocations(), 0);
}

#[test]
fn test_graph_returns_image_and_print() {
    let client = client();
    client.library().set_graph(Info::from_entries([
        ("image_width", InfoValue::Count(497)),
        ("image_height", InfoValue::Count(157)),
        ("graph_start", InfoValue::Count(1_700_000_100)),
        ("graph_end", InfoValue::Count(1_700_003_700)),
        ("value_max", InfoValue::Value(42.0)),
        ("print[0]", InfoValue::Str("42.00".to_string())),
        ("image", InfoValue::Blob(b"\x89PNG\r\n".to_vec())),
    ]));

    let mut grapher = Grapher::new();
    grapher
        .def("in", std::path::Path::new("net.rrd"), "in", ConsolidationFn::Average)
        .vdef("peak", "in,MAXIMUM")
        .print("peak", "%.2lf")
        .line(1.0, "in", "00ff00", "inbound");

    let graph = client.graph(&grapher, BASE_TIME, BASE_TIME + 3600).unwrap();
    assert_eq!(graph.image_width, Some(497));
    assert_eq!(graph.graph_end, Some(1_700_003_700));
    assert_eq!(graph.print, ["42.00"]);
    assert_eq!(graph.image, b"\x89PNG\r\n");
    assert_eq!(client.library().outstanding_allocations(), 0);

    let calls = client.library().calls();
    assert_eq!(calls[0].operation, Operation::Graph);
    assert_eq!(
        calls[0].args[..6],
        ["graph", "-", "-s", "1700000100", "-e", "1700003700"]
    );
    assert_eq!(calls[0].args.last().unwrap(), "LINE1:in#00ff00:inbound");
}

#[test]
fn test_graph_uses_config_daemon() {
    let config = ClientConfig {
        daemon: Some("unix:/run/rrdcached.sock".to_string()),
        ..Default::default()
    };
    let client = Client::with_config(MockLibrary::new(), config);
    client.graph(&Grapher::new(), 0, 60).unwrap();

    let calls = client.library().calls();
    assert_eq!(
        calls[0].args[6..],
        ["--daemon", "unix:/run/rrdcached.sock"]
    );
    assert_eq!(client.library().outstanding_allocations(), 0);
}

#[test]
fn test_xport_columns() {
    let client = client();
    client.library().set_xport_output(
        BASE_TIME,
        BASE_TIME + 120,
        60,
        &["bits in", "bits out"],
        &[80.0, 160.0, 240.0, 320.0],
    );

    let mut exporter = Exporter::new();
    exporter
        .def("in", std::path::Path::new("net.rrd"), "in", ConsolidationFn::Average)
        .def("out", std::path::Path::new("net.rrd"), "out", ConsolidationFn::Average)
        .cdef("bin", "in,8,*")
        .cdef("bout", "out,8,*")
        .xport("bin", "bits in")
        .xport("bout", "bits out");

    let result = client.xport(&exporter, BASE_TIME, BASE_TIME + 120, 60).unwrap();
    assert_eq!(result.legends, ["bits in", "bits out"]);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.value_at(1, 1), Some(320.0));
    assert_eq!(client.library().outstanding_allocations(), 0);
}

#[test]
fn test_xport_failure_leaves_nothing_allocated() {
    let client = client();
    client
        .library()
        .fail(Operation::Xport, "Can't make an xport without contents");
    let err = client.xport(&Exporter::new(), 0, 60, 10).unwrap_err();
    assert_eq!(
        err.to_string(),
        "librrd error: xport: Can't make an xport without contents"
    );
    assert_eq!(client.library().outstanding_allocations(), 0);
}

#[test]
fn test_config_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rrdshim.json");
    std::fs::write(
        &path,
        r#"{ "daemon": "localhost:42217", "max_rows": 400, "overwrite": true }"#,
    )
    .unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.daemon.as_deref(), Some("localhost:42217"));
    assert_eq!(config.max_rows, Some(400));
    assert!(config.overwrite);
}

#[test]
fn test_config_load_errors() {
    let dir = tempdir().unwrap();

    let missing = ClientConfig::load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, RrdError::Config(ConfigError::Read { .. })));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();
    let bad = ClientConfig::load(&path).unwrap_err();
    assert!(matches!(bad, RrdError::Config(ConfigError::Parse { .. })));

    std::fs::write(&path, r#"{ "max_rows": 0 }"#).unwrap();
    let invalid = ClientConfig::load(&path).unwrap_err();
    assert!(matches!(invalid, RrdError::Config(ConfigError::Invalid { .. })));
}

#[test]
fn test_daemon_env_name() {
    assert_eq!(DAEMON_ENV, "RRDCACHED_ADDRESS");
}
