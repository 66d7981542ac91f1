//! Build a small routing graph on the in-process engine and walk it.
//!
//! Run with: cargo run --example graph_walk

use std::sync::Arc;
use std::time::Duration;

use mixbind::sim::{SimConfig, SimEngine, FADER_GAIN, OSCILLATOR_RATE};
use mixbind::{ConnectionType, DspNode, DspType, Engine, EngineConfig};

fn walk(node: &Arc<DspNode>, depth: usize) -> mixbind::Result<()> {
    println!("{}{:?} {}", "  ".repeat(depth), node.dsp_type()?, node.handle());
    for i in 0..node.num_inputs()? {
        let (input, connection) = node.input(i)?;
        if let (Some(input), Some(connection)) = (input, connection) {
            println!(
                "{}<- {:?} mix {:.2}",
                "  ".repeat(depth + 1),
                connection.connection_type()?,
                connection.mix()?
            );
            walk(&input, depth + 2)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let sim = Arc::new(SimEngine::new(SimConfig::default()));
    let _mixer = sim.spawn_mixer(Duration::from_millis(2));
    let engine = Engine::with_sim(sim.clone(), EngineConfig::default())?;

    let master = engine.master_dsp()?;
    let fader = engine.create_dsp(DspType::Fader)?;
    let low = engine.create_dsp(DspType::Oscillator)?;
    let high = engine.create_dsp(DspType::Oscillator)?;
    high.set_float_parameter(OSCILLATOR_RATE, 880.0)?;
    fader.set_float_parameter(FADER_GAIN, -12.0)?;

    // edits made under one lock land in the same mix block
    let connections = {
        let _lock = engine.lock_dsp()?;
        vec![
            master.add_input(&fader, ConnectionType::Standard)?,
            fader.add_input(&low, ConnectionType::Standard)?,
            fader.add_input(&high, ConnectionType::Standard)?,
        ]
    };
    for connection in &connections {
        engine.poll_ready(|| connection.input())?;
    }
    connections[2].set_mix(0.5)?;

    walk(&master, 0)?;

    std::thread::sleep(Duration::from_millis(20));
    println!("master peak: {:?}", sim.output_peak(master.handle()));

    engine.close()?;
    Ok(())
}
