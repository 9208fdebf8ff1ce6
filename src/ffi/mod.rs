use std::ffi::CStr;
use std::ptr;
use std::time::Duration;

use libc::{c_char, size_t};

use crossbeam_channel::Receiver;

use crate::config::BridgeConfig;
use crate::link::dispatch::SendOutcome;
use crate::rig::bridge::RigBridge;
use crate::wire::{self, Command, MotorDirection, SequencedFrame, TelemetryFrame};

pub const WSYNC_FRAME_IMU: i32 = 0;
pub const WSYNC_FRAME_FORCE: i32 = 1;

pub const WSYNC_DIR_CW: i32 = 0;
pub const WSYNC_DIR_CCW: i32 = 1;
pub const WSYNC_DIR_STOP: i32 = 2;

//opaque handle handed across the C boundary
pub struct WsyncBridge{
    inner: RigBridge,
    frames: Receiver<SequencedFrame>,
}

//decoded sample in a C friendly layout; force frames fill values[0]
#[repr(C)]
pub struct WsyncFrame{
    pub kind: i32,
    pub seq: u64,
    pub values: [f64; 6],
}

fn direction_from(raw: i32) -> Option<MotorDirection>{
    match raw{
        WSYNC_DIR_CW => Some(MotorDirection::Cw),
        WSYNC_DIR_CCW => Some(MotorDirection::Ccw),
        WSYNC_DIR_STOP => Some(MotorDirection::Stop),
        _ => None,
    }
}

fn flatten(frame: SequencedFrame) -> WsyncFrame{
    match frame.frame{
        TelemetryFrame::Imu(imu) => WsyncFrame{
            kind: WSYNC_FRAME_IMU,
            seq: frame.seq,
            values: [imu.accel_x, imu.accel_y, imu.accel_z, imu.gyro_x, imu.gyro_y, imu.gyro_z],
        },
        TelemetryFrame::Force(force) => WsyncFrame{
            kind: WSYNC_FRAME_FORCE,
            seq: frame.seq,
            values: [force.newtons, 0.0, 0.0, 0.0, 0.0, 0.0],
        },
    }
}

//0 on success, -1 on a dead link
fn send_plain(bridge: &WsyncBridge, command: &Command) -> i32{
    match bridge.inner.send(command, false){
        Ok(_) => 0,
        Err(_) => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_open(port: *const c_char, baud: u32) -> *mut WsyncBridge{
    if port.is_null(){
        return ptr::null_mut();
    }

    unsafe{
        let port_str = match CStr::from_ptr(port).to_str(){
            Ok(s) => s,
            Err(_) => return ptr::null_mut(),
        };

        let mut config = BridgeConfig::default();
        config.port = port_str.to_string();
        if baud > 0{
            config.baud = baud;
        }

        match RigBridge::open(&config){
            Ok(inner) =>{
                let frames = inner.subscribe();
                Box::into_raw(Box::new(WsyncBridge{ inner, frames }))
            }
            Err(_) => ptr::null_mut(),
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_free(bridge: *mut WsyncBridge){
    if !bridge.is_null(){
        unsafe{
            let bridge = Box::from_raw(bridge);
            bridge.inner.shutdown();
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_motor_move(bridge: *mut WsyncBridge, direction: i32) -> i32{
    if bridge.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        match direction_from(direction){
            Some(dir) => send_plain(bridge, &Command::motor_move(dir)),
            None => -2,
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_motor_turn(
    bridge: *mut WsyncBridge,
    direction: i32,
    angle_deg: u16,
) -> i32{
    if bridge.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        let dir = match direction_from(direction){
            Some(dir) => dir,
            None => return -2,
        };
        match Command::motor_turn(dir, angle_deg){
            Ok(command) => send_plain(bridge, &command),
            Err(_) => -2,
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_set_speed(bridge: *mut WsyncBridge, value: u8) -> i32{
    if bridge.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        send_plain(bridge, &Command::set_speed(value))
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_tare(bridge: *mut WsyncBridge) -> i32{
    if bridge.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        send_plain(bridge, &Command::tare())
    }
}

#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_drive(
    bridge: *mut WsyncBridge,
    addrs: *const u8,
    addr_count: size_t,
    amplitude: u8,
) -> i32{
    if bridge.is_null() || addrs.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        let addrs = std::slice::from_raw_parts(addrs, addr_count);

        let addresses = match wire::addresses(addrs){
            Ok(addresses) => addresses,
            Err(_) => return -2,
        };
        match Command::constant_drive(&addresses, amplitude){
            Ok(command) => send_plain(bridge, &command),
            Err(_) => -2,
        }
    }
}

//returns the firmware DONE timing in ms (0 when acked without timing, or
//when no ack was requested), -1 on NoAck, -2 on bad args, -3 on link
//failure. a negative ack_wait_ms sends without waiting.
#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_wave(
    bridge: *mut WsyncBridge,
    addrs: *const u8,
    addr_count: size_t,
    step_ms: u32,
    amps: *const u8,
    amp_count: size_t,
    ack_wait_ms: i64,
) -> i64{
    if bridge.is_null() || addrs.is_null() || amps.is_null(){
        return -2;
    }

    unsafe{
        let bridge = &*bridge;
        let addrs = std::slice::from_raw_parts(addrs, addr_count);
        let amps = std::slice::from_raw_parts(amps, amp_count);

        let addresses = match wire::addresses(addrs){
            Ok(addresses) => addresses,
            Err(_) => return -2,
        };
        let command = match Command::wave(&addresses, step_ms, amps){
            Ok(command) => command,
            Err(_) => return -2,
        };

        let outcome = if ack_wait_ms >= 0{
            bridge.inner.dispatcher().send(
                &command,
                true,
                Duration::from_millis(ack_wait_ms as u64),
            )
        }else{
            bridge.inner.send(&command, false)
        };

        match outcome{
            Ok(SendOutcome::Acked(ack)) => ack.timing_ms.map(|ms| ms as i64).unwrap_or(0),
            Ok(SendOutcome::Sent) => 0,
            Ok(SendOutcome::NoAck) => -1,
            Err(_) => -3,
        }
    }
}

//1 when a frame was copied out, 0 when none is pending, -1 on bad args
#[no_mangle]
pub unsafe extern "C" fn wsync_bridge_poll_frame(
    bridge: *mut WsyncBridge,
    out: *mut WsyncFrame,
) -> i32{
    if bridge.is_null() || out.is_null(){
        return -1;
    }

    unsafe{
        let bridge = &*bridge;
        match bridge.frames.try_recv(){
            Ok(frame) =>{
                *out = flatten(frame);
                1
            }
            Err(_) => 0,
        }
    }
}
