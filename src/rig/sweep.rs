use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::LinkError;
use crate::link::dispatch::CommandDispatcher;
use crate::wire::{Command, DeviceAddress, InvalidCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SweepState{
    Idle = 0,
    Running = 1,
    Cancelling = 2,
}

impl SweepState{
    fn from_u8(val: u8) -> Self{
        match val{
            1 => SweepState::Running,
            2 => SweepState::Cancelling,
            _ => SweepState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome{
    Completed,
    Cancelled,
}

//one playback segment: a command plus how long to hold it before advancing
#[derive(Debug, Clone)]
pub struct SweepStep{
    pub command: Command,
    pub duration: Duration,
}

//drives a fixed, time-ordered command list through the shared dispatcher.
//cancellation is observed at each step boundary, so it takes effect within
//one step's duration in the worst case.
pub struct Sequencer{
    state: AtomicU8,
    cancel: AtomicBool,
}

impl Sequencer{
    pub fn new() -> Self{
        Sequencer{
            state: AtomicU8::new(SweepState::Idle as u8),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SweepState{
        SweepState::from_u8(self.state.load(Ordering::SeqCst))
    }

    //idempotent; a sequencer that is not running just stays idle
    pub fn cancel(&self){
        self.cancel.store(true, Ordering::SeqCst);
        let _ = self.state.compare_exchange(
            SweepState::Running as u8,
            SweepState::Cancelling as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    //issue each step in order on the caller's thread, emitting on_step
    //after the command is on the wire and pausing for the step duration
    pub fn run(
        &self,
        dispatcher: &CommandDispatcher,
        steps: &[SweepStep],
        on_step: &dyn Fn(usize, &Command),
    ) -> Result<SweepOutcome, LinkError>{
        self.cancel.store(false, Ordering::SeqCst);
        self.state.store(SweepState::Running as u8, Ordering::SeqCst);

        let mut outcome = SweepOutcome::Completed;
        for (index, step) in steps.iter().enumerate(){
            if self.cancel.load(Ordering::SeqCst){
                outcome = SweepOutcome::Cancelled;
                break;
            }

            if let Err(err) = dispatcher.send(&step.command, false, Duration::ZERO){
                self.state.store(SweepState::Idle as u8, Ordering::SeqCst);
                return Err(err);
            }
            on_step(index, &step.command);
            thread::sleep(step.duration);
        }

        self.state.store(SweepState::Idle as u8, Ordering::SeqCst);
        Ok(outcome)
    }

    //same, but on a worker thread so the caller stays responsive
    pub fn start_background(
        self: Arc<Self>,
        dispatcher: Arc<CommandDispatcher>,
        steps: Vec<SweepStep>,
        on_step: Box<dyn Fn(usize, &Command) + Send>,
    ) -> JoinHandle<Result<SweepOutcome, LinkError>>{
        thread::spawn(move ||{
            self.run(&dispatcher, &steps, on_step.as_ref())
        })
    }
}

impl Default for Sequencer{
    fn default() -> Self{
        Self::new()
    }
}

//build the classic frequency sweep: one sine cycle per step, quantized to
//1ms samples, held for dwell while the board loops the pattern
pub fn sine_sweep(
    addresses: &[DeviceAddress],
    start_hz: u32,
    end_hz: u32,
    step_hz: u32,
    peak: u8,
    dwell: Duration,
) -> Result<Vec<SweepStep>, InvalidCommand>{
    if step_hz == 0{
        return Err(InvalidCommand::ZeroStep);
    }

    let mut steps = Vec::new();
    let mut freq = start_hz.max(1);
    while freq <= end_hz{
        let samples = (1000 / freq).max(2) as usize;
        let mut amplitudes = Vec::with_capacity(samples);
        for i in 0..samples{
            let phase = 2.0 * PI * (i as f64) / (samples as f64);
            let level = (phase.sin() * 0.5 + 0.5) * peak as f64;
            amplitudes.push(level.round() as u8);
        }
        steps.push(SweepStep{
            command: Command::wave(addresses, 1, &amplitudes)?,
            duration: dwell,
        });
        freq += step_hz;
    }
    Ok(steps)
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;
    use crate::link::LinkIo;
    use crate::link::ingest::AckRelay;
    use crate::link::testing::MockLink;
    use crate::wire::addresses;

    fn test_dispatcher(mock: &Arc<MockLink>) -> Arc<CommandDispatcher>{
        Arc::new(CommandDispatcher::new(
            Arc::clone(mock) as Arc<dyn LinkIo>,
            Arc::new(AckRelay::new()),
        ))
    }

    #[test]
    fn test_sine_sweep_step_count_and_bounds(){
        let addrs = addresses(&[0x48]).unwrap();
        let steps = sine_sweep(&addrs, 20, 330, 10, 0x46, Duration::from_secs(2)).unwrap();
        //20, 30, ... 330
        assert_eq!(steps.len(), 32);

        for step in &steps{
            let line = String::from_utf8(crate::wire::encode(&step.command)).unwrap();
            assert!(line.starts_with("W 1 48 "), "unexpected line {}", line);
        }
    }

    #[test]
    fn test_sine_sweep_rejects_zero_step(){
        let addrs = addresses(&[0x48]).unwrap();
        assert_eq!(
            sine_sweep(&addrs, 20, 330, 0, 0x46, Duration::ZERO).unwrap_err(),
            InvalidCommand::ZeroStep
        );
    }

    #[test]
    fn test_run_emits_every_step_in_order(){
        let mock = Arc::new(MockLink::new());
        let dispatcher = test_dispatcher(&mock);
        let sequencer = Sequencer::new();

        let steps = vec![
            SweepStep{ command: Command::set_speed(1), duration: Duration::ZERO },
            SweepStep{ command: Command::set_speed(2), duration: Duration::ZERO },
            SweepStep{ command: Command::set_speed(3), duration: Duration::ZERO },
        ];

        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        let outcome = sequencer
            .run(&dispatcher, &steps, &|index, _cmd|{ seen.lock().unwrap().push(index); })
            .unwrap();

        assert_eq!(outcome, SweepOutcome::Completed);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(mock.sent_lines(), vec!["S 1\n", "S 2\n", "S 3\n"]);
        assert_eq!(sequencer.state(), SweepState::Idle);
    }

    #[test]
    fn test_cancel_aborts_remaining_steps(){
        let mock = Arc::new(MockLink::new());
        let dispatcher = test_dispatcher(&mock);
        let sequencer = Arc::new(Sequencer::new());

        let steps: Vec<SweepStep> = (0..20)
            .map(|i| SweepStep{
                command: Command::set_speed(i),
                duration: Duration::from_millis(25),
            })
            .collect();

        let handle = Arc::clone(&sequencer).start_background(
            Arc::clone(&dispatcher),
            steps,
            Box::new(|_, _| {}),
        );

        let begin = Instant::now();
        thread::sleep(Duration::from_millis(60));
        sequencer.cancel();
        sequencer.cancel(); //idempotent

        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome, SweepOutcome::Cancelled);
        //visible within one step duration, give or take scheduling
        assert!(begin.elapsed() < Duration::from_millis(500));
        assert!(mock.sent_lines().len() < 20);
        assert_eq!(sequencer.state(), SweepState::Idle);
    }
}
