/**
 * Rig Bridge
 *
 * Ties one serial session, its ingest worker and the command path together:
 * 1. Opens the configured port
 * 2. Streams decoded telemetry into a shared bounded window
 * 3. Fans frames out to subscriber channels without blocking the read loop
 * 4. Serializes commands (with optional DONE acks) over the same link
 */

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::BridgeConfig;
use crate::error::LinkError;
use crate::link::dispatch::{CommandDispatcher, SendOutcome};
use crate::link::ingest::{AckRelay, IngestWorker, WorkerState};
use crate::link::{LinkIo, LinkSession};
use crate::sample_buffer::SampleBuffer;
use crate::wire::{Command, SequencedFrame};

pub struct RigBridge {
    session: Arc<LinkSession>,
    dispatcher: Arc<CommandDispatcher>,
    worker: IngestWorker,
    buffer: Arc<SampleBuffer<SequencedFrame>>,
    taps: Arc<Mutex<Vec<Sender<SequencedFrame>>>>,
    fault: Arc<Mutex<Option<LinkError>>>,
    ack_timeout: Duration,
    tap_capacity: usize,
}

impl RigBridge {
    /// Open the configured port and start the ingest worker.
    pub fn open(config: &BridgeConfig) -> Result<Self, LinkError> {
        let session = Arc::new(LinkSession::open(
            &config.port,
            config.baud,
            config.read_timeout(),
        )?);
        let link: Arc<dyn LinkIo> = Arc::clone(&session) as Arc<dyn LinkIo>;

        let relay = Arc::new(AckRelay::new());
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&link), Arc::clone(&relay)));
        let buffer = Arc::new(SampleBuffer::new(config.buffer_capacity));
        let taps: Arc<Mutex<Vec<Sender<SequencedFrame>>>> = Arc::new(Mutex::new(Vec::new()));
        let fault: Arc<Mutex<Option<LinkError>>> = Arc::new(Mutex::new(None));

        let frame_buffer = Arc::clone(&buffer);
        let frame_taps = Arc::clone(&taps);
        let on_frame = Box::new(move |frame: SequencedFrame| {
            frame_buffer.push(frame);
            let mut taps = frame_taps.lock().unwrap();
            taps.retain(|tap| match tap.try_send(frame) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    // lagging subscribers lose frames; the read loop never stalls
                    log::trace!("subscriber lagging, frame {} dropped", frame.seq);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
        });

        let fault_slot = Arc::clone(&fault);
        let on_error = Box::new(move |err: LinkError| {
            log::warn!("link down: {}", err);
            *fault_slot.lock().unwrap() = Some(err);
        });

        let worker = IngestWorker::start(link, relay, on_frame, on_error);

        Ok(Self {
            session,
            dispatcher,
            worker,
            buffer,
            taps,
            fault,
            ack_timeout: config.ack_timeout(),
            tap_capacity: config.buffer_capacity,
        })
    }

    /// Send a command; waits up to the configured ack timeout for a DONE
    /// line when `expect_ack` is set.
    pub fn send(&self, command: &Command, expect_ack: bool) -> Result<SendOutcome, LinkError> {
        self.dispatcher.send(command, expect_ack, self.ack_timeout)
    }

    /// Shared command path, e.g. for a Sequencer on its own thread.
    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Register a bounded subscriber channel. A subscriber that stops
    /// draining loses frames rather than stalling ingest.
    pub fn subscribe(&self) -> Receiver<SequencedFrame> {
        let (tx, rx) = bounded(self.tap_capacity);
        self.taps.lock().unwrap().push(tx);
        rx
    }

    /// Recent frames in arrival order.
    pub fn snapshot(&self) -> Vec<SequencedFrame> {
        self.buffer.snapshot()
    }

    pub fn latest(&self) -> Option<SequencedFrame> {
        self.buffer.latest()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// The link failure that stopped the worker, if one occurred.
    /// The bridge never reconnects on its own.
    pub fn fault(&self) -> Option<String> {
        self.fault.lock().unwrap().as_ref().map(|err| err.to_string())
    }

    /// Tear down in the required order: signal the worker, join it, then
    /// close the port.
    pub fn shutdown(mut self) {
        self.worker.stop();
        self.session.close();
    }
}
