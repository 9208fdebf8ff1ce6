/**
 * Rig control layer
 *
 * The bridge facade that wires config, link session, ingest worker and
 * dispatcher together, plus the sweep sequencer that plays timed command
 * lists through it.
 */

pub mod bridge;
pub mod sweep;

pub use bridge::RigBridge;
pub use sweep::{sine_sweep, Sequencer, SweepOutcome, SweepState, SweepStep};
