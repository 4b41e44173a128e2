//! A toy simulation loop driving an insitu session.
//!
//! Each step publishes a 4x4 uniform mesh with a `temperature` field. A
//! host-built pipeline reports the field's range, and an IO pipeline
//! writes the channel to `mini_sim_out/` every step.
//!
//! ```text
//! INSITU_LOG=debug cargo run -p insitu --example mini_sim
//! ```

use insitu::prelude::*;
use insitu::types::NumericArray;

const NX: usize = 4;
const NY: usize = 4;

/// Logs min/max of `temperature` on the `grid` channel.
struct FieldRange;

impl Pipeline for FieldRange {
    fn name(&self) -> &str {
        "field_range"
    }

    fn execute(&mut self, ctx: &mut PipelineContext<'_>, timestep: i64, _time: f64) -> bool {
        let Some(values) = ctx
            .registry()
            .get_producer("grid")
            .and_then(|p| p.payload().get_path("fields/temperature/values"))
            .and_then(Node::as_numeric_array)
            .map(NumericArray::to_f64_vec)
        else {
            return false;
        };
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        println!("step {timestep:>3}: temperature in [{lo:.3}, {hi:.3}]");
        true
    }
}

fn step_envelope(timestep: i64, time: f64, temperature: &[f64]) -> Node {
    let mut node = Node::object();
    node.set_path("catalyst/state/timestep", timestep);
    node.set_path("catalyst/state/time", time);
    let grid = "catalyst/channels/grid";
    node.set_path(&format!("{grid}/type"), "mesh");
    node.set_path(&format!("{grid}/data/coordsets/coords/type"), "uniform");
    node.set_path(&format!("{grid}/data/coordsets/coords/dims/i"), NX as i64);
    node.set_path(&format!("{grid}/data/coordsets/coords/dims/j"), NY as i64);
    node.set_path(&format!("{grid}/data/topologies/mesh/type"), "uniform");
    node.set_path(&format!("{grid}/data/topologies/mesh/coordset"), "coords");
    let field = format!("{grid}/data/fields/temperature");
    node.set_path(&format!("{field}/association"), "vertex");
    node.set_path(&format!("{field}/topology"), "mesh");
    node.set_path(&format!("{field}/values"), temperature.to_vec());
    node
}

/// One explicit diffusion step with fixed boundaries.
fn diffuse(t: &[f64]) -> Vec<f64> {
    let mut next = t.to_vec();
    for j in 1..NY - 1 {
        for i in 1..NX - 1 {
            let k = j * NX + i;
            next[k] = t[k] + 0.2 * (t[k - 1] + t[k + 1] + t[k - NX] + t[k + NX] - 4.0 * t[k]);
        }
    }
    next
}

fn main() {
    let config = EngineConfig::default();
    insitu::logging::init(config.rank);

    let session = Session::with_config(config);
    let init = Node::from_json_str(
        r#"{"catalyst": {"pipelines": {
            "snapshots": {"type": "io", "filename": "mini_sim_out/grid_%04d.json", "channel": "grid"}
        }}}"#,
    )
    .expect("static initialize envelope is valid JSON");
    assert_eq!(session.initialize(&init), Status::Ok);
    assert_eq!(session.register_pipeline(PipelineKind::custom(FieldRange)), Status::Ok);

    let mut temperature = vec![0.0; NX * NY];
    temperature[NX + 1] = 100.0;
    for timestep in 0..5 {
        let time = timestep as f64 * 0.1;
        let mut node = step_envelope(timestep, time, &temperature);
        let status = session.execute(&mut node);
        if !status.is_ok() {
            eprintln!("step {timestep} reported {status}");
        }
        temperature = diffuse(&temperature);
    }

    let status = session.finalize(&Node::Null);
    println!("finalize: {status}");
}
