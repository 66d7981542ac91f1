use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use approx::assert_relative_eq;
use mixbind::sim::{
    SimConfig, SimEngine, CHANNEL_MIX_GROUPING, FADER_GAIN, FADER_MUTE, FADER_OVERALL_GAIN,
    OSCILLATOR_RATE, OSCILLATOR_TYPE,
};
use mixbind::sys::{NativeApi, ResultCode};
use mixbind::{
    AsAnyArc, ChannelFormat, ConnectionType, DspConnection, DspNode, DspType, Engine, EngineConfig,
    Error, MeteringFlags, MixMatrix, ParameterKind, ParameterShape, ParameterValue, Proxy,
    ProxyKind, ReverbProperties, SpeakerMode,
};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn setup_with(config: SimConfig) -> (Arc<SimEngine>, Engine) {
    init_tracing();
    let sim = Arc::new(SimEngine::new(config));
    let engine = Engine::with_sim(sim.clone(), EngineConfig::default()).unwrap();
    (sim, engine)
}

fn setup() -> (Arc<SimEngine>, Engine) {
    setup_with(SimConfig::default())
}

/// Connect `input -> output` and wait until the engine has applied it.
fn connect(
    engine: &Engine,
    output: &DspNode,
    input: &DspNode,
    kind: ConnectionType,
) -> Arc<DspConnection> {
    let connection = output.add_input(input, kind).unwrap();
    engine.poll_ready(|| connection.input()).unwrap();
    connection
}

fn native_code<T: std::fmt::Debug>(result: mixbind::Result<T>) -> ResultCode {
    result.unwrap_err().code().expect("expected a native error")
}

// --- identity and eviction ---

#[test]
fn one_proxy_per_handle() {
    let (_sim, engine) = setup();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    let again = engine.resolve::<DspNode>(osc.handle()).unwrap().unwrap();
    assert!(Arc::ptr_eq(&osc, &again));
    assert!(Arc::ptr_eq(&engine.master_dsp().unwrap(), &engine.master_dsp().unwrap()));

    // nodes reached through topology queries are the same objects too
    let master = engine.master_dsp().unwrap();
    let connection = connect(&engine, &master, &osc, ConnectionType::Standard);
    let (input, via_index) = master.input(0).unwrap();
    assert!(Arc::ptr_eq(&input.unwrap(), &osc));
    assert!(Arc::ptr_eq(&via_index.unwrap(), &connection));
}

#[test]
fn null_handle_resolves_to_none() {
    let (_sim, engine) = setup();
    assert!(engine.resolve::<DspNode>(mixbind::NativeHandle::NULL).unwrap().is_none());
    assert!(engine.resolve_dyn(mixbind::NativeHandle::NULL).unwrap().is_none());
}

#[test]
fn disposal_evicts_from_the_registry() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let handle = fader.handle();
    assert!(engine.registry().contains(handle));

    fader.dispose().unwrap();
    assert!(fader.is_disposed());
    assert!(fader.handle().is_null());
    assert!(!engine.registry().contains(handle));
}

#[test]
fn resolving_after_dispose_builds_a_fresh_proxy() {
    let (_sim, engine) = setup();
    // the master's native object outlives its proxy
    let master = engine.master_dsp().unwrap();
    let handle = master.handle();
    master.dispose().unwrap();

    let fresh = engine.resolve::<DspNode>(handle).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&master, &fresh));
    assert!(!fresh.is_disposed());
    assert_eq!(fresh.handle(), handle);
    assert_eq!(fresh.dsp_type().unwrap(), DspType::Mixer);
    assert!(Arc::ptr_eq(&fresh, &engine.master_dsp().unwrap()));
}

#[test]
fn equality_and_hashing_survive_disposal() {
    let (_sim, engine) = setup();
    let a = engine.create_dsp(DspType::Fader).unwrap();
    let b = engine.create_dsp(DspType::Fader).unwrap();

    let mut set = HashSet::new();
    set.insert(a.clone());
    a.dispose().unwrap();
    b.dispose().unwrap();

    assert_ne!(*a, *b);
    assert_eq!(*a, *a);
    assert!(set.contains(&a));
    assert!(!set.contains(&b));
}

#[test]
fn dispose_listeners_see_the_released_handle() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let handle = fader.handle();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    fader.on_dispose(move |h| sink.lock().push(h));
    fader.dispose().unwrap();
    assert_eq!(*seen.lock(), vec![handle]);

    // late subscribers run at once with NULL
    let sink = seen.clone();
    fader.on_dispose(move |h| sink.lock().push(h));
    assert_eq!(seen.lock()[1], mixbind::NativeHandle::NULL);
}

#[test]
fn resolving_the_wrong_kind_is_an_error() {
    let (_sim, engine) = setup();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    let err = engine.resolve::<DspConnection>(osc.handle()).unwrap_err();
    assert_eq!(
        err,
        Error::KindMismatch {
            handle: osc.handle(),
            cached: ProxyKind::Dsp,
            requested: ProxyKind::DspConnection,
        }
    );
}

#[test]
fn resolve_dyn_builds_the_native_kind() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();
    let handle = connection.handle();

    // drop the cached proxy so the factory has to build it
    assert!(engine.registry().evict(handle));
    let proxy = engine.resolve_dyn(handle).unwrap().unwrap();
    assert_eq!(proxy.kind(), ProxyKind::DspConnection);
    assert_eq!(proxy.handle(), handle);

    // cached hits return what is already there
    let node = engine.resolve_dyn(osc.handle()).unwrap().unwrap();
    assert_eq!(node.kind(), ProxyKind::Dsp);
    let typed = node.as_any_arc().downcast::<DspNode>().unwrap();
    assert!(Arc::ptr_eq(&typed, &osc));
}

#[test]
fn registering_a_mapped_handle_is_refused() {
    let (_sim, engine) = setup();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let err = engine.registry().register(osc.handle(), osc.clone()).unwrap_err();
    assert_eq!(err, Error::AlreadyRegistered(osc.handle()));
}

#[test]
fn concurrent_resolves_agree_on_one_proxy() {
    let (_sim, engine) = setup();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let handle = osc.handle();
    engine.registry().evict(handle);

    let barrier = Barrier::new(8);
    let resolved: Vec<Arc<DspNode>> = std::thread::scope(|s| {
        let threads: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    engine.resolve::<DspNode>(handle).unwrap().unwrap()
                })
            })
            .collect();
        threads.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert!(resolved.iter().all(|p| Arc::ptr_eq(p, &resolved[0])));
    assert_eq!(engine.registry().len(), 2); // master + osc
}

#[test]
fn recycled_handle_returns_the_stale_proxy() {
    let (sim, engine) = setup_with(SimConfig::default().with_recycle_handles(true));
    let first = engine.create_dsp(DspType::Fader).unwrap();

    // released behind the binding's back: the proxy never learns about it
    sim.dsp_release(first.handle()).unwrap();
    let second = engine.create_dsp(DspType::Oscillator).unwrap();

    assert_eq!(second.handle(), first.handle());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.dsp_type().unwrap(), DspType::Oscillator);
}

// --- lifecycle ---

#[test]
fn dispose_is_idempotent() {
    let (sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let handle = fader.handle();

    fader.dispose().unwrap();
    fader.dispose().unwrap();
    assert_eq!(sim.release_count(handle), 1);
    assert_eq!(fader.parameter_count().unwrap_err(), Error::Disposed);
}

#[test]
fn concurrent_dispose_releases_once() {
    let (sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let handle = fader.handle();

    let barrier = Barrier::new(4);
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                barrier.wait();
                fader.dispose().unwrap();
            });
        }
    });
    assert_eq!(sim.release_count(handle), 1);
}

#[test]
fn failed_release_keeps_the_proxy_live() {
    let (sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let handle = fader.handle();

    sim.dsp_release(handle).unwrap();
    assert_eq!(native_code(fader.dispose()), ResultCode::InvalidHandle);
    assert!(!fader.is_disposed());
    assert_eq!(fader.handle(), handle);
}

#[test]
fn proxies_outlive_a_closed_engine_safely() {
    let (sim, engine) = setup();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let handle = osc.handle();

    engine.close().unwrap();
    assert!(osc.is_disposed());
    assert_eq!(sim.release_count(handle), 1);
    assert_eq!(osc.num_inputs().unwrap_err(), Error::EngineClosed);
    osc.dispose().unwrap();
}

// --- parameters ---

#[test]
fn parameter_descriptors_decode() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    assert_eq!(fader.parameter_count().unwrap(), 3);

    let gain = fader.parameter_info(FADER_GAIN).unwrap();
    assert_eq!(gain.name, "Gain");
    assert_eq!(gain.label, "dB");
    assert!(!gain.description.is_empty());
    assert_eq!(gain.shape, ParameterShape::Float { min: -80.0, max: 10.0, default: 0.0 });

    assert_eq!(fader.parameter_info(FADER_MUTE).unwrap().kind(), ParameterKind::Bool);
    assert_eq!(fader.parameter_info(FADER_OVERALL_GAIN).unwrap().kind(), ParameterKind::Data);
    assert_eq!(fader.parameter_info(3).unwrap_err(), Error::ParameterIndex { index: 3, count: 3 });
}

#[test]
fn writes_are_clamped_before_they_reach_the_engine() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    assert_relative_eq!(fader.set_float_parameter(FADER_GAIN, 25.0).unwrap(), 10.0);
    assert_relative_eq!(fader.float_parameter(FADER_GAIN).unwrap(), 10.0);
    assert_relative_eq!(fader.set_float_parameter(FADER_GAIN, -200.0).unwrap(), -80.0);

    assert_eq!(osc.set_int_parameter(OSCILLATOR_TYPE, 9).unwrap(), 5);
    assert_eq!(osc.int_parameter(OSCILLATOR_TYPE).unwrap(), 5);
    assert_relative_eq!(osc.set_float_parameter(OSCILLATOR_RATE, 440.0).unwrap(), 440.0);
}

#[test]
fn listeners_hear_the_clamped_value_after_success() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();

    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = heard.clone();
    let id = fader.on_parameter_changed(move |change| sink.lock().push(change.clone()));

    fader.set_float_parameter(FADER_GAIN, 99.0).unwrap();
    // rejected writes stay silent
    assert!(fader.set_data_parameter(FADER_OVERALL_GAIN, &[0; 8]).is_err());

    {
        let heard = heard.lock();
        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0].index, FADER_GAIN);
        assert_eq!(heard[0].value, ParameterValue::Float(10.0));
    }

    assert!(fader.remove_parameter_listener(id));
    fader.set_bool_parameter(FADER_MUTE, true).unwrap();
    assert_eq!(heard.lock().len(), 1);
}

#[test]
fn clamped_writes_read_back_at_the_boundaries() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    // gain is declared over [-80, 10]
    let gains = [
        (-80.0, -80.0),
        (10.0, 10.0),
        (0.0, 0.0),
        (10.0001, 10.0),
        (-80.0001, -80.0),
        (f32::MAX, 10.0),
        (f32::MIN, -80.0),
        (f32::INFINITY, 10.0),
        (f32::NEG_INFINITY, -80.0),
        (f32::NAN, -80.0),
    ];
    for (written, expected) in gains {
        let stored = fader.set_float_parameter(FADER_GAIN, written).unwrap();
        assert_eq!(stored, expected, "set {written}");
        assert_eq!(fader.float_parameter(FADER_GAIN).unwrap(), expected, "get after {written}");
    }

    // waveform is declared over [0, 5]
    let waveforms = [(0, 0), (5, 5), (-1, 0), (6, 5), (i32::MIN, 0), (i32::MAX, 5)];
    for (written, expected) in waveforms {
        let stored = osc.set_int_parameter(OSCILLATOR_TYPE, written).unwrap();
        assert_eq!(stored, expected, "set {written}");
        assert_eq!(osc.int_parameter(OSCILLATOR_TYPE).unwrap(), expected, "get after {written}");
    }

    let rates = [(0.0, 0.0), (22000.0, 22000.0), (f32::INFINITY, 22000.0), (-1.0, 0.0)];
    for (written, expected) in rates {
        osc.set_float_parameter(OSCILLATOR_RATE, written).unwrap();
        assert_eq!(osc.float_parameter(OSCILLATOR_RATE).unwrap(), expected, "rate {written}");
    }
}

#[test]
fn parameter_kinds_are_checked() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();

    assert_eq!(
        fader.int_parameter(FADER_GAIN).unwrap_err(),
        Error::ParameterKind {
            index: FADER_GAIN,
            declared: ParameterKind::Float,
            requested: ParameterKind::Int,
        }
    );
    assert!(matches!(
        fader.set_parameter(FADER_MUTE, ParameterValue::Float(1.0)),
        Err(Error::ParameterKind { .. })
    ));

    let overall = fader.data_parameter(FADER_OVERALL_GAIN).unwrap();
    assert_eq!(overall.len(), 8);
}

// --- connections ---

#[test]
fn add_input_becomes_visible_after_a_tick() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();
    assert_eq!(master.num_inputs().unwrap(), 1);
    assert_eq!(osc.num_outputs().unwrap(), 1);
    assert!(connection.input().unwrap_err().is_not_ready());

    let input = engine.poll_ready(|| connection.input()).unwrap().unwrap();
    assert!(Arc::ptr_eq(&input, &osc));
    assert!(Arc::ptr_eq(&connection.output().unwrap().unwrap(), &master));
    assert_eq!(connection.connection_type().unwrap(), ConnectionType::Standard);
    assert_relative_eq!(connection.mix().unwrap(), 1.0);

    let (out_node, out_connection) = osc.output(0).unwrap();
    assert!(Arc::ptr_eq(&out_node.unwrap(), &master));
    assert!(Arc::ptr_eq(&out_connection.unwrap(), &connection));
}

#[test]
fn disconnect_leaves_the_connection_dangling() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = connect(&engine, &master, &osc, ConnectionType::Standard);

    master.disconnect_from(&osc, None).unwrap();
    assert_eq!(master.num_inputs().unwrap(), 0);
    assert_eq!(osc.num_outputs().unwrap(), 0);
    assert!(connection.input().unwrap().is_none());
    assert!(connection.output().unwrap().is_none());

    // nothing left to remove
    master.disconnect_from(&osc, None).unwrap();
}

#[test]
fn connection_positions_follow_add_and_disconnect() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();

    let first = engine.poll_ready(|| master.input_connection(0)).unwrap().unwrap();
    assert_eq!(first.handle(), connection.handle());
    assert!(Arc::ptr_eq(&first, &connection));
    let outgoing = osc.output_connection(0).unwrap().unwrap();
    assert!(Arc::ptr_eq(&outgoing, &connection));

    master.disconnect_from(&osc, Some(&connection)).unwrap();
    assert_eq!(native_code(master.input_connection(0)), ResultCode::InvalidParam);
    assert_eq!(native_code(osc.output_connection(0)), ResultCode::InvalidParam);

    // the slot is taken by the next edge, never by the old one
    let replacement = connect(&engine, &master, &osc, ConnectionType::Standard);
    let now = master.input_connection(0).unwrap().unwrap();
    assert!(Arc::ptr_eq(&now, &replacement));
    assert_ne!(*now, *connection);
    assert!(osc.output_connection(0).unwrap().is_some_and(|c| *c != *connection));
}

#[test]
fn disconnect_a_single_edge() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let dry = connect(&engine, &master, &osc, ConnectionType::Standard);
    let wet = connect(&engine, &master, &osc, ConnectionType::Send);

    // either endpoint can name the pair
    osc.disconnect_from(&master, Some(&dry)).unwrap();
    let remaining = master.input_connections().unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(Arc::ptr_eq(&remaining[0], &wet));
}

#[test]
fn disconnect_all_by_direction() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    connect(&engine, &master, &fader, ConnectionType::Standard);
    connect(&engine, &fader, &osc, ConnectionType::Standard);

    fader.disconnect_all(true, false).unwrap();
    assert_eq!(fader.num_inputs().unwrap(), 0);
    assert_eq!(fader.num_outputs().unwrap(), 1);

    fader.disconnect_all(false, true).unwrap();
    assert_eq!(master.num_inputs().unwrap(), 0);
}

#[test]
fn inputs_keep_insertion_order() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let nodes: Vec<_> = (0..4).map(|_| engine.create_dsp(DspType::Oscillator).unwrap()).collect();
    for node in &nodes {
        connect(&engine, &master, node, ConnectionType::Standard);
    }
    for (i, node) in nodes.iter().enumerate() {
        assert!(Arc::ptr_eq(&master.input(i).unwrap().0.unwrap(), node));
    }
    assert_eq!(native_code(master.input(4)), ResultCode::InvalidParam);
}

#[test]
fn cycles_are_rejected() {
    let (_sim, engine) = setup();
    let a = engine.create_dsp(DspType::Fader).unwrap();
    let b = engine.create_dsp(DspType::Fader).unwrap();
    connect(&engine, &a, &b, ConnectionType::Standard);

    assert_eq!(native_code(b.add_input(&a, ConnectionType::Send)), ResultCode::DspConnection);
    assert_eq!(native_code(a.add_input(&a, ConnectionType::Standard)), ResultCode::DspConnection);
}

#[test]
fn mix_is_clamped() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = connect(&engine, &master, &osc, ConnectionType::Standard);

    assert_relative_eq!(connection.set_mix(1.5).unwrap(), 1.0);
    assert_relative_eq!(connection.set_mix(-0.5).unwrap(), 0.0);
    connection.set_mix(0.25).unwrap();
    assert_relative_eq!(connection.mix().unwrap(), 0.25);
}

#[test]
fn mismatched_matrix_is_rejected_and_old_one_kept() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = connect(&engine, &master, &osc, ConnectionType::Standard);

    // stereo master fed by a mono oscillator: 2 x 1
    assert_eq!(connection.mix_matrix().unwrap(), MixMatrix::identity(2, 1));

    connection.set_mix_matrix(Some(&[0.5, 0.25]), 2, 1, 0).unwrap();
    let err = connection.set_mix_matrix(Some(&[1.0; 4]), 2, 2, 2);
    assert_eq!(native_code(err), ResultCode::InvalidParam);
    assert_eq!(connection.mix_matrix().unwrap().data, vec![0.5, 0.25]);

    // a short buffer never reaches the engine
    assert_eq!(
        connection.set_mix_matrix(Some(&[1.0]), 2, 1, 0).unwrap_err(),
        Error::MatrixBuffer { len: 1, needed: 2 }
    );

    connection.set_mix_matrix(None, 0, 0, 0).unwrap();
    assert_eq!(connection.mix_matrix().unwrap(), MixMatrix::identity(2, 1));
}

#[test]
fn impossible_hops_are_refused_without_panicking() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let connection = connect(&engine, &master, &fader, ConnectionType::Standard);

    let huge = Error::MatrixStride { cols: 2, hop: usize::MAX };
    assert_eq!(connection.set_mix_matrix(Some(&[1.0; 4]), 2, 2, usize::MAX).unwrap_err(), huge);
    let mut buf = [0.0f32; 4];
    assert_eq!(connection.mix_matrix_into(&mut buf, usize::MAX).unwrap_err(), huge);

    // rows closer together than their width would overlap
    assert_eq!(
        connection.set_mix_matrix(Some(&[1.0; 4]), 2, 2, 1).unwrap_err(),
        Error::MatrixStride { cols: 2, hop: 1 }
    );
    assert_eq!(connection.mix_matrix().unwrap(), MixMatrix::identity(2, 2));
}

#[test]
fn matrix_rows_honour_the_hop() {
    let (_sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let connection = connect(&engine, &master, &fader, ConnectionType::Standard);

    // 2 x 2, rows three apart
    let strided = [0.1, 0.2, 9.0, 0.3, 0.4];
    connection.set_mix_matrix(Some(&strided), 2, 2, 3).unwrap();
    assert_eq!(connection.mix_matrix().unwrap().data, vec![0.1, 0.2, 0.3, 0.4]);

    let mut out = [-1.0f32; 6];
    assert_eq!(connection.mix_matrix_into(&mut out, 4).unwrap(), (2, 2));
    assert_eq!(out, [0.1, 0.2, -1.0, -1.0, 0.3, 0.4]);
}

// --- execution semantics ---

#[test]
fn connection_types_decide_who_runs() {
    let (sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let standard = engine.create_dsp(DspType::Oscillator).unwrap();
    let sidechain = engine.create_dsp(DspType::Oscillator).unwrap();
    let send = engine.create_dsp(DspType::Oscillator).unwrap();
    let send_sidechain = engine.create_dsp(DspType::Oscillator).unwrap();

    connect(&engine, &master, &standard, ConnectionType::Standard);
    connect(&engine, &master, &sidechain, ConnectionType::SideChain);
    connect(&engine, &master, &send, ConnectionType::Send);
    connect(&engine, &master, &send_sidechain, ConnectionType::SendSideChain);

    let runs = |n: &Arc<DspNode>| sim.execution_count(n.handle()).unwrap();
    let nodes = [&standard, &sidechain, &send, &send_sidechain];
    let counts: Vec<u64> = nodes.into_iter().map(&runs).collect();
    for _ in 0..3 {
        engine.update().unwrap();
    }

    assert_eq!(runs(&standard) - counts[0], 3);
    assert_eq!(runs(&sidechain) - counts[1], 3);
    assert_eq!(runs(&send), counts[2]);
    assert_eq!(runs(&send_sidechain), counts[3]);
    assert!(send.idle().unwrap());
    assert!(!standard.idle().unwrap());
}

#[test]
fn sidechain_signal_stays_out_of_the_audible_mix() {
    let (sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    connect(&engine, &master, &osc, ConnectionType::SideChain);
    engine.update().unwrap();

    assert_eq!(sim.output_peak(master.handle()), Some(0.0));
    assert!(sim.sidechain_peak(master.handle()).unwrap() > 0.0);
}

#[test]
fn send_carries_what_something_else_pulled() {
    let (sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let bus = engine.create_dsp(DspType::Mixer).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    connect(&engine, &master, &bus, ConnectionType::Standard);
    connect(&engine, &bus, &osc, ConnectionType::Send);
    engine.update().unwrap();
    assert_eq!(sim.output_peak(bus.handle()), Some(0.0));

    // once the oscillator is pulled elsewhere the send carries signal
    connect(&engine, &master, &osc, ConnectionType::Standard);
    engine.update().unwrap();
    engine.update().unwrap();
    assert!(sim.output_peak(bus.handle()).unwrap() > 0.0);
}

#[test]
fn fader_scales_and_mutes() {
    let (sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    osc.set_int_parameter(OSCILLATOR_TYPE, 1).unwrap(); // square, full scale
    connect(&engine, &master, &fader, ConnectionType::Standard);
    connect(&engine, &fader, &osc, ConnectionType::Standard);

    fader.set_float_parameter(FADER_GAIN, -6.0).unwrap();
    engine.update().unwrap();
    assert_relative_eq!(sim.output_peak(fader.handle()).unwrap(), 0.501_187, epsilon = 1e-4);

    fader.set_bool_parameter(FADER_MUTE, true).unwrap();
    engine.update().unwrap();
    assert_eq!(sim.output_peak(master.handle()), Some(0.0));
}

#[test]
fn inactive_nodes_do_not_pull_inputs() {
    let (sim, engine) = setup();
    let master = engine.master_dsp().unwrap();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    connect(&engine, &master, &fader, ConnectionType::Standard);
    connect(&engine, &fader, &osc, ConnectionType::Standard);

    fader.set_active(false).unwrap();
    assert!(!fader.active().unwrap());
    let runs = sim.execution_count(osc.handle()).unwrap();
    engine.update().unwrap();
    assert_eq!(sim.execution_count(osc.handle()).unwrap(), runs);

    fader.set_active(true).unwrap();
    fader.set_bypass(true).unwrap();
    assert!(fader.bypass().unwrap());
    fader.set_bool_parameter(FADER_MUTE, true).unwrap();
    engine.update().unwrap();
    // bypassed: the mute never applies
    assert!(sim.output_peak(fader.handle()).unwrap() > 0.0);
}

// --- format, metering, reverb ---

#[test]
fn output_format_is_a_pure_query() {
    let (_sim, engine) = setup();
    let mix = engine.create_dsp(DspType::ChannelMix).unwrap();
    let stereo = ChannelFormat::stereo();
    assert_eq!(mix.output_channel_format(&stereo).unwrap(), stereo);

    mix.set_int_parameter(CHANNEL_MIX_GROUPING, 5).unwrap();
    let out = mix.output_channel_format(&stereo).unwrap();
    assert_eq!(out.speaker_mode, SpeakerMode::FivePointOne);
    assert_eq!(out.channels, 6);
    assert_eq!(mix.channel_format().unwrap().channels, 6);

    let fader = engine.create_dsp(DspType::Fader).unwrap();
    let before = fader.channel_format().unwrap();
    fader.output_channel_format(&ChannelFormat::for_mode(SpeakerMode::Quad)).unwrap();
    assert_eq!(fader.channel_format().unwrap(), before);
}

#[test]
fn channel_format_is_validated() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();

    fader.set_channel_format(&ChannelFormat::raw(3)).unwrap();
    assert_eq!(fader.channel_format().unwrap().channels, 3);

    let lying = ChannelFormat { channels: 3, ..ChannelFormat::stereo() };
    assert_eq!(native_code(fader.set_channel_format(&lying)), ResultCode::InvalidSpeaker);
    let empty = fader.set_channel_format(&ChannelFormat::raw(0));
    assert_eq!(native_code(empty), ResultCode::InvalidParam);
}

#[test]
fn metering_flags_are_set_together() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();
    assert_eq!(fader.metering().unwrap(), MeteringFlags::default());

    fader.set_metering(MeteringFlags { input: true, output: true }).unwrap();
    fader.set_input_metering_enabled(false).unwrap();
    assert_eq!(fader.metering().unwrap(), MeteringFlags { input: false, output: true });
}

#[test]
fn metering_updates_from_many_threads_are_not_lost() {
    let (_sim, engine) = setup();
    let fader = engine.create_dsp(DspType::Fader).unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..100 {
                fader.set_input_metering_enabled(true).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..100 {
                fader.set_output_metering_enabled(true).unwrap();
            }
        });
    });
    assert_eq!(fader.metering().unwrap(), MeteringFlags { input: true, output: true });
}

#[test]
fn reverb_instances_round_trip() {
    let (_sim, engine) = setup();
    engine.set_reverb_properties(1, &ReverbProperties::HALLWAY).unwrap();
    assert_eq!(engine.reverb_properties(1).unwrap(), ReverbProperties::HALLWAY);
    assert_eq!(native_code(engine.reverb_properties(4)), ResultCode::ReverbInstance);
    assert_eq!(engine.speaker_mode().unwrap(), SpeakerMode::Stereo);
}

// --- locking and polling ---

#[test]
fn dsp_lock_nests_and_releases() {
    let (sim, engine) = setup();
    {
        let _outer = engine.lock_dsp().unwrap();
        let _inner = engine.lock_dsp().unwrap();
        assert!(sim.is_dsp_locked());

        // graph edits take the lock internally and nest inside ours
        let osc = engine.create_dsp(DspType::Oscillator).unwrap();
        engine.master_dsp().unwrap().add_input(&osc, ConnectionType::Standard).unwrap();
        assert!(sim.is_dsp_locked());
    }
    assert!(!sim.is_dsp_locked());
}

#[test]
fn mixing_waits_for_the_dsp_lock() {
    init_tracing();
    let sim = Arc::new(SimEngine::new(SimConfig::default()));
    let config = EngineConfig::default().with_not_ready_polling(3, Duration::from_millis(1));
    let engine = Engine::with_sim(sim.clone(), config).unwrap();
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();

    let lock = engine.lock_dsp().unwrap();
    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();
    let tick = sim.tick();
    let err = engine.poll_ready(|| connection.input()).unwrap_err();
    assert!(err.is_not_ready());
    assert_eq!(sim.tick(), tick);

    drop(lock);
    assert!(engine.poll_ready(|| connection.input()).unwrap().is_some());
}

#[test]
fn background_mixer_establishes_connections() {
    let (sim, engine) = setup();
    let _mixer = sim.spawn_mixer(Duration::from_millis(1));
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();

    let input = engine.poll_ready(|| connection.input()).unwrap();
    assert!(Arc::ptr_eq(&input.unwrap(), &osc));
}

#[test]
fn immediate_connections_need_no_polling() {
    let (_sim, engine) = setup_with(SimConfig::default().with_deferred_connections(false));
    let master = engine.master_dsp().unwrap();
    let osc = engine.create_dsp(DspType::Oscillator).unwrap();
    let connection = master.add_input(&osc, ConnectionType::Standard).unwrap();
    assert!(connection.input().unwrap().is_some());
}

#[test]
fn proxies_from_another_engine_are_refused() {
    let (_sim, engine) = setup();
    let (_other_sim, other) = setup();
    let master = engine.master_dsp().unwrap();
    let stranger = other.create_dsp(DspType::Oscillator).unwrap();

    let err = master.add_input(&stranger, ConnectionType::Standard).unwrap_err();
    assert_eq!(err, Error::ForeignEngine { op: "DSP::addInput" });
    // refused before any native call, so there is no native code to report
    assert_eq!(err.code(), None);
    assert_eq!(master.num_inputs().unwrap(), 0);
}

