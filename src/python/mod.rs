use pyo3::prelude::*;
use pyo3::exceptions::{PyIOError, PyValueError};

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::config::BridgeConfig;
use crate::link::dispatch::SendOutcome;
use crate::rig::bridge::RigBridge;
use crate::rig::sweep::{sine_sweep, Sequencer, SweepOutcome};
use crate::wire::{self, Command, MotorDirection, SequencedFrame, TelemetryFrame};

fn parse_direction(name: &str) -> Option<MotorDirection>{
    match name{
        "cw" => Some(MotorDirection::Cw),
        "ccw" => Some(MotorDirection::Ccw),
        "stop" => Some(MotorDirection::Stop),
        _ => None,
    }
}

fn frame_tuple(frame: SequencedFrame) -> (u64, String, Vec<f64>){
    match frame.frame{
        TelemetryFrame::Imu(imu) =>(
            frame.seq,
            "imu".to_string(),
            vec![imu.accel_x, imu.accel_y, imu.accel_z, imu.gyro_x, imu.gyro_y, imu.gyro_z],
        ),
        TelemetryFrame::Force(force) =>(
            frame.seq,
            "force".to_string(),
            vec![force.newtons],
        ),
    }
}

#[pyclass]
pub struct PyRigBridge{
    inner: Option<RigBridge>,
    frames: Option<Receiver<SequencedFrame>>,
    sequencer: Arc<Sequencer>,
}

impl PyRigBridge{
    fn bridge(&self) -> PyResult<&RigBridge>{
        self.inner.as_ref().ok_or_else(|| PyIOError::new_err("bridge closed"))
    }

    fn send_checked(&self, command: &Command, expect_ack: bool) -> PyResult<Option<u64>>{
        let outcome = self.bridge()?
            .send(command, expect_ack)
            .map_err(|e| PyIOError::new_err(e.to_string()))?;
        match outcome{
            SendOutcome::Acked(ack) if !ack.ok =>{
                Err(PyValueError::new_err("board rejected the command"))
            }
            SendOutcome::Acked(ack) => Ok(ack.timing_ms),
            _ => Ok(None),
        }
    }
}

#[pymethods]
impl PyRigBridge{
    #[new]
    fn new(port: &str, baud: u32) -> PyResult<Self>{
        let mut config = BridgeConfig::default();
        config.port = port.to_string();
        if baud > 0{
            config.baud = baud;
        }

        let inner = RigBridge::open(&config)
            .map_err(|e| PyIOError::new_err(e.to_string()))?;
        let frames = inner.subscribe();

        Ok(PyRigBridge{
            inner: Some(inner),
            frames: Some(frames),
            sequencer: Arc::new(Sequencer::new()),
        })
    }

    fn wave(
        &self,
        addresses: Vec<u8>,
        step_ms: u32,
        amplitudes: Vec<u8>,
        wait_ack: bool,
    ) -> PyResult<Option<u64>>{
        let addresses = wire::addresses(&addresses)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let command = Command::wave(&addresses, step_ms, &amplitudes)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.send_checked(&command, wait_ack)
    }

    fn drive(&self, addresses: Vec<u8>, amplitude: u8) -> PyResult<()>{
        let addresses = wire::addresses(&addresses)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let command = Command::constant_drive(&addresses, amplitude)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.send_checked(&command, false)?;
        Ok(())
    }

    fn motor(&self, direction: &str) -> PyResult<()>{
        let dir = parse_direction(direction)
            .ok_or_else(|| PyValueError::new_err("direction must be cw, ccw or stop"))?;
        self.send_checked(&Command::motor_move(dir), false)?;
        Ok(())
    }

    fn turn(&self, direction: &str, angle_deg: u16) -> PyResult<()>{
        let dir = parse_direction(direction)
            .ok_or_else(|| PyValueError::new_err("direction must be cw or ccw"))?;
        let command = Command::motor_turn(dir, angle_deg)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        self.send_checked(&command, false)?;
        Ok(())
    }

    fn set_speed(&self, value: u8) -> PyResult<()>{
        self.send_checked(&Command::set_speed(value), false)?;
        Ok(())
    }

    fn tare(&self, wait_ack: bool) -> PyResult<Option<u64>>{
        self.send_checked(&Command::tare(), wait_ack)
    }

    //run a sine sweep on the caller's thread; the gil is released so
    //cancel_sweep() can be called from another python thread
    fn sweep(
        &self,
        py: Python<'_>,
        addresses: Vec<u8>,
        start_hz: u32,
        end_hz: u32,
        step_hz: u32,
        peak: u8,
        dwell_ms: u64,
    ) -> PyResult<bool>{
        let addresses = wire::addresses(&addresses)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let steps = sine_sweep(
            &addresses,
            start_hz,
            end_hz,
            step_hz,
            peak,
            Duration::from_millis(dwell_ms),
        ).map_err(|e| PyValueError::new_err(e.to_string()))?;

        let dispatcher = self.bridge()?.dispatcher();
        let sequencer = Arc::clone(&self.sequencer);

        let outcome = py.allow_threads(move ||{
            sequencer.run(&dispatcher, &steps, &|index, command|{
                log::debug!("sweep step {} ({})", index, command.name());
            })
        }).map_err(|e| PyIOError::new_err(e.to_string()))?;

        Ok(outcome == SweepOutcome::Completed)
    }

    fn cancel_sweep(&self){
        self.sequencer.cancel();
    }

    fn poll_frame(&self) -> Option<(u64, String, Vec<f64>)>{
        let frames = self.frames.as_ref()?;
        frames.try_recv().ok().map(frame_tuple)
    }

    fn snapshot(&self) -> PyResult<Vec<(u64, String, Vec<f64>)>>{
        Ok(self.bridge()?.snapshot().into_iter().map(frame_tuple).collect())
    }

    fn fault(&self) -> PyResult<Option<String>>{
        Ok(self.bridge()?.fault())
    }

    fn close(&mut self){
        self.sequencer.cancel();
        self.frames = None;
        if let Some(bridge) = self.inner.take(){
            bridge.shutdown();
        }
    }
}

#[pymodule]
fn wrist_sync(_py: Python, m: &PyModule) -> PyResult<()>{
    m.add_class::<PyRigBridge>()?;
    Ok(())
}
