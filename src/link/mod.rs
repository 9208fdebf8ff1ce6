pub mod dispatch;
pub mod ingest;

use std::io::{Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use serialport::SerialPort;

use crate::error::LinkError;

//one read_line outcome: timeouts are routine and let the caller re-check
//its stop flag, closed is terminal for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome{
    Line(String),
    TimedOut,
    Closed,
}

//seam between the session and everything that talks through it; the ingest
//worker, the dispatcher and the test mock all share this surface
pub trait LinkIo: Send + Sync{
    fn write_line(&self, line: &[u8]) -> Result<(), LinkError>;
    fn read_line(&self) -> ReadOutcome;
    fn close(&self);
    fn is_open(&self) -> bool;
}

struct LineReader{
    port: Box<dyn SerialPort>,
    carry: Vec<u8>,
}

//exclusive owner of the serial handle. the port is cloned once so the
//reader and writer sides have independent handles (usb-cdc is full duplex);
//close() drops both, and taking the reader lock means it can never race an
//in-flight read.
pub struct LinkSession{
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
    open: AtomicBool,
    read_timeout: Duration,
}

impl LinkSession{
    pub fn open(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, LinkError>{
        let port = serialport::new(port_name, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|source| LinkError::Connect{ port: port_name.to_string(), source })?;

        let writer = port.try_clone()
            .map_err(|source| LinkError::Connect{ port: port_name.to_string(), source })?;

        Ok(LinkSession{
            reader: Mutex::new(Some(LineReader{ port, carry: Vec::with_capacity(512) })),
            writer: Mutex::new(Some(writer)),
            open: AtomicBool::new(true),
            read_timeout,
        })
    }

    pub fn read_timeout(&self) -> Duration{
        self.read_timeout
    }

    //pull the next complete line out of the carry buffer, if any
    fn take_line(carry: &mut Vec<u8>) -> Option<String>{
        let pos = carry.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = carry.drain(..=pos).collect();
        line.pop(); //newline
        if line.last() == Some(&b'\r'){
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl LinkIo for LinkSession{
    fn write_line(&self, line: &[u8]) -> Result<(), LinkError>{
        if !self.open.load(Ordering::SeqCst){
            return Err(LinkError::Closed);
        }

        let mut guard = self.writer.lock().unwrap();
        let port = match guard.as_mut(){
            Some(port) => port,
            None => return Err(LinkError::Closed),
        };

        port.write_all(line).map_err(LinkError::Write)?;
        port.flush().map_err(LinkError::Write)?;
        Ok(())
    }

    fn read_line(&self) -> ReadOutcome{
        if !self.open.load(Ordering::SeqCst){
            return ReadOutcome::Closed;
        }

        let mut guard = self.reader.lock().unwrap();
        let reader = match guard.as_mut(){
            Some(reader) => reader,
            None => return ReadOutcome::Closed,
        };

        if let Some(line) = Self::take_line(&mut reader.carry){
            return ReadOutcome::Line(line);
        }

        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; 256];

        loop{
            match reader.port.read(&mut buf){
                Ok(0) =>{
                    //a zero read means the device vanished
                    self.open.store(false, Ordering::SeqCst);
                    return ReadOutcome::Closed;
                }
                Ok(n) =>{
                    reader.carry.extend_from_slice(&buf[..n]);
                    if let Some(line) = Self::take_line(&mut reader.carry){
                        return ReadOutcome::Line(line);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) =>{
                    log::warn!("serial read failed: {}", e);
                    self.open.store(false, Ordering::SeqCst);
                    return ReadOutcome::Closed;
                }
            }

            if Instant::now() >= deadline{
                return ReadOutcome::TimedOut;
            }
        }
    }

    //idempotent: both halves of the port are dropped on the first call
    fn close(&self){
        self.open.store(false, Ordering::SeqCst);
        *self.writer.lock().unwrap() = None;
        *self.reader.lock().unwrap() = None;
    }

    fn is_open(&self) -> bool{
        self.open.load(Ordering::SeqCst)
    }
}
