pub mod config;
pub mod error;
pub mod ffi;
pub mod link;
pub mod rig;
pub mod sample_buffer;
pub mod sink;
pub mod wire;

#[cfg(feature = "python")]
pub mod python;

pub use config::{BridgeConfig, ConfigError};
pub use error::LinkError;
pub use link::dispatch::{CommandDispatcher, SendOutcome};
pub use link::ingest::{AckRelay, IngestWorker, WorkerState};
pub use link::{LinkIo, LinkSession, ReadOutcome};
pub use rig::bridge::RigBridge;
pub use rig::sweep::{sine_sweep, Sequencer, SweepOutcome, SweepState, SweepStep};
pub use sample_buffer::SampleBuffer;
pub use sink::{CsvSink, SampleSink, SinkError};
pub use wire::{
    addresses, decode_ack, decode_line, decode_telemetry, encode,
    Acknowledgement, Command, Decoded, DeviceAddress, ForceSample, ImuSample,
    InvalidCommand, MotorDirection, SequencedFrame, TelemetryFrame,
};
