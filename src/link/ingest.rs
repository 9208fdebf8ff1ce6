use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::LinkError;
use crate::wire::{self, Acknowledgement, Decoded, SequencedFrame};
use super::{LinkIo, ReadOutcome};

//lifecycle of the read loop thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState{
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState{
    fn from_u8(val: u8) -> Self{
        match val{
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

//single-slot handoff for a dispatcher waiting on the next ack line.
//telemetry keeps flowing to on_frame while a waiter is armed, so nothing
//is dropped while a command is in flight.
pub struct AckRelay{
    slot: Mutex<Option<Sender<Acknowledgement>>>,
}

impl AckRelay{
    pub fn new() -> Self{
        AckRelay{ slot: Mutex::new(None) }
    }

    //arm a fresh waiter, replacing any stale one
    pub fn arm(&self) -> Receiver<Acknowledgement>{
        let (tx, rx) = bounded(1);
        *self.slot.lock().unwrap() = Some(tx);
        rx
    }

    pub fn disarm(&self){
        *self.slot.lock().unwrap() = None;
    }

    //hand an ack to the armed waiter, if any
    pub fn offer(&self, ack: Acknowledgement) -> bool{
        let mut slot = self.slot.lock().unwrap();
        match slot.take(){
            Some(tx) => tx.send(ack).is_ok(),
            None => false,
        }
    }
}

impl Default for AckRelay{
    fn default() -> Self{
        Self::new()
    }
}

pub type FrameCallback = Box<dyn Fn(SequencedFrame) + Send>;
pub type ErrorCallback = Box<dyn FnOnce(LinkError) + Send>;

//owns the blocking read loop on its own thread. each decoded telemetry
//frame is tagged with a monotonic arrival sequence (from 0 per session)
//before on_frame runs; decode misses are swallowed, link failures fire
//on_error once and stop the loop.
pub struct IngestWorker{
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl IngestWorker{
    pub fn start(
        link: Arc<dyn LinkIo>,
        relay: Arc<AckRelay>,
        on_frame: FrameCallback,
        on_error: ErrorCallback,
    ) -> Self{
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(AtomicU8::new(WorkerState::Running as u8));

        let loop_running = Arc::clone(&running);
        let loop_state = Arc::clone(&state);

        let handle = thread::spawn(move ||{
            let mut seq: u64 = 0;
            let mut on_error = Some(on_error);

            while loop_running.load(Ordering::SeqCst){
                match link.read_line(){
                    ReadOutcome::Line(line) => match wire::decode_line(&line){
                        Decoded::Ack(ack) =>{
                            if !relay.offer(ack){
                                log::debug!("unclaimed ack: {}", line);
                            }
                        }
                        Decoded::Telemetry(frame) =>{
                            let tagged = SequencedFrame{ seq, frame };
                            seq += 1;
                            on_frame(tagged);
                        }
                        Decoded::Unmatched =>{
                            log::debug!("ignoring line: {}", line);
                        }
                    },
                    ReadOutcome::TimedOut => {} //loop again, re-check the stop flag
                    ReadOutcome::Closed =>{
                        if let Some(callback) = on_error.take(){
                            callback(LinkError::Closed);
                        }
                        break;
                    }
                }
            }

            loop_state.store(WorkerState::Stopped as u8, Ordering::SeqCst);
        });

        IngestWorker{
            running,
            state,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> WorkerState{
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    //signal the loop and join it; unblocks within one read timeout.
    //calling stop on an already stopped worker is a no-op.
    pub fn stop(&mut self){
        let handle = match self.handle.take(){
            Some(handle) => handle,
            None => return,
        };

        if self.state() == WorkerState::Running{
            self.state.store(WorkerState::Stopping as u8, Ordering::SeqCst);
        }
        self.running.store(false, Ordering::SeqCst);
        let _ = handle.join();
        self.state.store(WorkerState::Stopped as u8, Ordering::SeqCst);
    }
}

impl Drop for IngestWorker{
    fn drop(&mut self){
        self.stop();
    }
}
