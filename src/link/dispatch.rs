use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LinkError;
use crate::wire::{self, Acknowledgement, Command};
use super::LinkIo;
use super::ingest::AckRelay;

//result of one send. a missing ack is routine control flow, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome{
    Sent,
    Acked(Acknowledgement),
    NoAck,
}

//serializes every outbound write over the one link. the board accepts a
//single command in flight, so a second send blocks until the first has
//completed or timed out; sequential calls hit the wire in call order.
pub struct CommandDispatcher{
    link: Arc<dyn LinkIo>,
    relay: Arc<AckRelay>,
    gate: Mutex<()>,
}

impl CommandDispatcher{
    pub fn new(link: Arc<dyn LinkIo>, relay: Arc<AckRelay>) -> Self{
        CommandDispatcher{
            link,
            relay,
            gate: Mutex::new(()),
        }
    }

    //encode and transmit, optionally waiting out ack_timeout for the next
    //ack line seen by the ingest loop. telemetry observed while waiting
    //still reaches its subscribers.
    pub fn send(
        &self,
        command: &Command,
        expect_ack: bool,
        ack_timeout: Duration,
    ) -> Result<SendOutcome, LinkError>{
        let _in_flight = self.gate.lock().unwrap();

        let line = wire::encode(command);
        let waiter = if expect_ack{
            Some(self.relay.arm())
        }else{
            None
        };

        if let Err(err) = self.link.write_line(&line){
            self.relay.disarm();
            return Err(err);
        }

        let waiter = match waiter{
            Some(waiter) => waiter,
            None => return Ok(SendOutcome::Sent),
        };

        match waiter.recv_timeout(ack_timeout){
            Ok(ack) => Ok(SendOutcome::Acked(ack)),
            Err(_) =>{
                self.relay.disarm();
                Ok(SendOutcome::NoAck)
            }
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::thread;
    use crate::link::testing::MockLink;
    use crate::wire::MotorDirection;

    fn dispatcher(mock: &Arc<MockLink>, relay: &Arc<AckRelay>) -> CommandDispatcher{
        CommandDispatcher::new(Arc::clone(mock) as Arc<dyn LinkIo>, Arc::clone(relay))
    }

    #[test]
    fn test_send_writes_exact_line(){
        let mock = Arc::new(MockLink::new());
        let relay = Arc::new(AckRelay::new());
        let dispatcher = dispatcher(&mock, &relay);

        let outcome = dispatcher
            .send(&Command::set_speed(80), false, Duration::ZERO)
            .unwrap();

        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(mock.sent_lines(), vec!["S 80\n".to_string()]);
    }

    #[test]
    fn test_send_returns_ack_from_relay(){
        let mock = Arc::new(MockLink::new());
        let relay = Arc::new(AckRelay::new());
        let dispatcher = Arc::new(dispatcher(&mock, &relay));

        let sender = Arc::clone(&dispatcher);
        let handle = thread::spawn(move ||{
            sender.send(&Command::tare(), true, Duration::from_millis(500))
        });

        //the ingest loop would do this on the next DONE line
        thread::sleep(Duration::from_millis(20));
        assert!(relay.offer(Acknowledgement{ ok: true, timing_ms: Some(42) }));

        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Acked(Acknowledgement{ ok: true, timing_ms: Some(42) }));
    }

    #[test]
    fn test_send_times_out_to_no_ack(){
        let mock = Arc::new(MockLink::new());
        let relay = Arc::new(AckRelay::new());
        let dispatcher = dispatcher(&mock, &relay);

        let outcome = dispatcher
            .send(&Command::tare(), true, Duration::from_millis(30))
            .unwrap();

        assert_eq!(outcome, SendOutcome::NoAck);
        //waiter was disarmed on the way out
        assert!(!relay.offer(Acknowledgement{ ok: true, timing_ms: None }));
    }

    #[test]
    fn test_send_fails_on_closed_link(){
        let mock = Arc::new(MockLink::new());
        let relay = Arc::new(AckRelay::new());
        let dispatcher = dispatcher(&mock, &relay);

        mock.close();
        let err = dispatcher
            .send(&Command::motor_move(MotorDirection::Stop), false, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, LinkError::Closed));
    }

    #[test]
    fn test_concurrent_sends_emit_whole_lines(){
        let mock = Arc::new(MockLink::new());
        let relay = Arc::new(AckRelay::new());
        let dispatcher = Arc::new(dispatcher(&mock, &relay));

        let a = Arc::clone(&dispatcher);
        let b = Arc::clone(&dispatcher);
        let ha = thread::spawn(move || a.send(&Command::set_speed(10), false, Duration::ZERO));
        let hb = thread::spawn(move || b.send(&Command::set_speed(20), false, Duration::ZERO));
        ha.join().unwrap().unwrap();
        hb.join().unwrap().unwrap();

        let mut sent = mock.sent_lines();
        sent.sort();
        assert_eq!(sent, vec!["S 10\n".to_string(), "S 20\n".to_string()]);
    }
}
