pub mod command;
pub use command::{addresses, Command, DeviceAddress, InvalidCommand, MotorDirection};

use once_cell::sync::Lazy;
use regex::Regex;

use command::CommandKind;

//confirmation line from the board, optionally carrying elapsed time.
//firmware "Error:" chatter decodes as a failed ack rather than noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement{
    pub ok: bool,
    pub timing_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample{
    pub accel_x: f64,     //m/s²
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,      //rad/s
    pub gyro_y: f64,
    pub gyro_z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSample{
    pub newtons: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryFrame{
    Imu(ImuSample),
    Force(ForceSample),
}

//telemetry tagged with the arrival order assigned by the ingest loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencedFrame{
    pub seq: u64,
    pub frame: TelemetryFrame,
}

//result of running one inbound line through the decode trial order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded{
    Ack(Acknowledgement),
    Telemetry(TelemetryFrame),
    Unmatched,
}

//build the single newline-terminated ascii line for a command.
//addresses and waveform amplitudes go out as two uppercase hex digits.
pub fn encode(command: &Command) -> Vec<u8>{
    let mut line = String::new();
    match &command.kind{
        CommandKind::Wave{ addresses, step_ms, amplitudes } =>{
            line.push_str(&format!("W {}", addresses.len()));
            for addr in addresses{
                line.push_str(&format!(" {:02X}", addr.get()));
            }
            line.push_str(&format!(" {} {}", amplitudes.len(), step_ms));
            for amp in amplitudes{
                line.push_str(&format!(" {:02X}", amp));
            }
        }
        CommandKind::ConstantDrive{ addresses, amplitude } =>{
            line.push_str(&format!("C {}", addresses.len()));
            for addr in addresses{
                line.push_str(&format!(" {:02X}", addr.get()));
            }
            line.push_str(&format!(" {}", amplitude));
        }
        CommandKind::MotorMove{ direction } =>{
            line.push_str(match direction{
                MotorDirection::Cw => "L",
                MotorDirection::Ccw => "R",
                MotorDirection::Stop => "X",
            });
        }
        CommandKind::MotorTurn{ direction, angle_deg } =>{
            let tag = if *direction == MotorDirection::Cw{ "A" }else{ "B" };
            line.push_str(&format!("{} {}", tag, angle_deg));
        }
        CommandKind::SetSpeed{ value } =>{
            line.push_str(&format!("S {}", value));
        }
        CommandKind::Tare =>{
            line.push_str("TARE");
        }
    }
    line.push('\n');
    line.into_bytes()
}

//"DONE <ms>" with a parseable count, bare "DONE", or a firmware rejection.
//anything else is not an ack; callers may be racing with telemetry lines.
pub fn decode_ack(line: &str) -> Option<Acknowledgement>{
    let line = line.trim();
    if line == "DONE"{
        return Some(Acknowledgement{ ok: true, timing_ms: None });
    }
    if let Some(rest) = line.strip_prefix("DONE "){
        return match rest.trim().parse::<u64>(){
            Ok(ms) => Some(Acknowledgement{ ok: true, timing_ms: Some(ms) }),
            Err(_) => None,
        };
    }
    if line.starts_with("Error:"){
        return Some(Acknowledgement{ ok: false, timing_ms: None });
    }
    None
}

static IMU_LINE: Lazy<Regex> = Lazy::new(||{
    Regex::new(
        r"^Accel X:\s*([-+0-9.eE]+),Accel Y:\s*([-+0-9.eE]+),Accel Z:\s*([-+0-9.eE]+),Gyro X:\s*([-+0-9.eE]+),Gyro Y:\s*([-+0-9.eE]+),Gyro Z:\s*([-+0-9.eE]+)$"
    ).expect("imu line pattern")
});

fn finite(text: &str) -> Option<f64>{
    let value = text.trim().parse::<f64>().ok()?;
    if value.is_finite(){
        return Some(value);
    }
    None
}

//try the imu six-field line, then the labelled force reading (possibly
//embedded after other fields, like the raw/psi prefix some firmware adds),
//then a bare float. a line matching none of these is silently ignorable.
pub fn decode_telemetry(line: &str) -> Option<TelemetryFrame>{
    let line = line.trim();

    if let Some(caps) = IMU_LINE.captures(line){
        let mut vals = [0.0f64; 6];
        for (i, slot) in vals.iter_mut().enumerate(){
            *slot = finite(caps.get(i + 1)?.as_str())?;
        }
        return Some(TelemetryFrame::Imu(ImuSample{
            accel_x: vals[0],
            accel_y: vals[1],
            accel_z: vals[2],
            gyro_x: vals[3],
            gyro_y: vals[4],
            gyro_z: vals[5],
        }));
    }

    if let Some((_, rest)) = line.split_once("Force (N):"){
        return Some(TelemetryFrame::Force(ForceSample{ newtons: finite(rest)? }));
    }

    if let Some(newtons) = finite(line){
        return Some(TelemetryFrame::Force(ForceSample{ newtons }));
    }

    None
}

//fixed trial order: ack pattern first, then each telemetry pattern
pub fn decode_line(line: &str) -> Decoded{
    if let Some(ack) = decode_ack(line){
        return Decoded::Ack(ack);
    }
    if let Some(frame) = decode_telemetry(line){
        return Decoded::Telemetry(frame);
    }
    Decoded::Unmatched
}

#[cfg(test)]
mod tests{
    use super::*;

    fn line(command: &Command) -> String{
        String::from_utf8(encode(command)).unwrap()
    }

    #[test]
    fn test_encode_wave_exact(){
        let addrs = addresses(&[0x48, 0x49]).unwrap();
        let cmd = Command::wave(&addrs, 20, &[0x00, 0xFF, 0xFF, 0x00]).unwrap();
        assert_eq!(line(&cmd), "W 2 48 49 4 20 00 FF FF 00\n");
    }

    #[test]
    fn test_encode_constant_drive(){
        let addrs = addresses(&[0x48]).unwrap();
        let cmd = Command::constant_drive(&addrs, 128).unwrap();
        assert_eq!(line(&cmd), "C 1 48 128\n");
    }

    #[test]
    fn test_encode_motor_commands(){
        assert_eq!(line(&Command::motor_move(MotorDirection::Cw)), "L\n");
        assert_eq!(line(&Command::motor_move(MotorDirection::Ccw)), "R\n");
        assert_eq!(line(&Command::motor_move(MotorDirection::Stop)), "X\n");
        assert_eq!(line(&Command::motor_turn(MotorDirection::Cw, 90).unwrap()), "A 90\n");
        assert_eq!(line(&Command::motor_turn(MotorDirection::Ccw, 45).unwrap()), "B 45\n");
        assert_eq!(line(&Command::set_speed(80)), "S 80\n");
        assert_eq!(line(&Command::tare()), "TARE\n");
    }

    #[test]
    fn test_decode_ack(){
        assert_eq!(
            decode_ack("DONE 42"),
            Some(Acknowledgement{ ok: true, timing_ms: Some(42) })
        );
        assert_eq!(
            decode_ack("DONE"),
            Some(Acknowledgement{ ok: true, timing_ms: None })
        );
        assert_eq!(
            decode_ack("Error: Invalid device indicator"),
            Some(Acknowledgement{ ok: false, timing_ms: None })
        );
        assert_eq!(decode_ack("hello"), None);
        assert_eq!(decode_ack("DONE42"), None);
        assert_eq!(decode_ack("DONE soon"), None);
    }

    #[test]
    fn test_decode_imu_line(){
        let frame = decode_telemetry(
            "Accel X: 1.0,Accel Y: 2.0,Accel Z: 3.0,Gyro X: 0,Gyro Y: 0,Gyro Z: 0"
        ).unwrap();
        assert_eq!(frame, TelemetryFrame::Imu(ImuSample{
            accel_x: 1.0,
            accel_y: 2.0,
            accel_z: 3.0,
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: 0.0,
        }));
    }

    #[test]
    fn test_decode_imu_negative_fields(){
        let frame = decode_telemetry(
            "Accel X: -0.023928,Accel Y: 9.810574,Accel Z: 0.550349,Gyro X: -0.015882,Gyro Y: -0.070860,Gyro Z: -0.037874"
        ).unwrap();
        match frame{
            TelemetryFrame::Imu(imu) =>{
                assert!((imu.accel_y - 9.810574).abs() < 1e-9);
                assert!(imu.gyro_x < 0.0);
            }
            other => panic!("expected imu frame, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_force_variants(){
        assert_eq!(
            decode_telemetry("Force (N): 0.88"),
            Some(TelemetryFrame::Force(ForceSample{ newtons: 0.88 }))
        );
        //embedded after raw/psi fields, the way the arduino prints it
        assert_eq!(
            decode_telemetry("Raw reading: 300   Force (PSI - NB): 45   Force (N): 0.88"),
            Some(TelemetryFrame::Force(ForceSample{ newtons: 0.88 }))
        );
        assert_eq!(
            decode_telemetry("-1.25"),
            Some(TelemetryFrame::Force(ForceSample{ newtons: -1.25 }))
        );
    }

    #[test]
    fn test_decode_rejects_garbage_and_nonfinite(){
        assert_eq!(decode_telemetry("garbage line"), None);
        assert_eq!(decode_telemetry(""), None);
        assert_eq!(decode_telemetry("Force (N): lots"), None);
        assert_eq!(decode_telemetry("Force (N): inf"), None);
        assert_eq!(decode_telemetry("NaN"), None);
        assert_eq!(decode_telemetry("1e999"), None);
        //right shape, unparsable number
        assert_eq!(
            decode_telemetry("Accel X: a,Accel Y: 2,Accel Z: 3,Gyro X: 4,Gyro Y: 5,Gyro Z: 6"),
            None
        );
    }

    #[test]
    fn test_commands_never_decode_as_ack_or_telemetry(){
        let addrs = addresses(&[0x48, 0x49]).unwrap();
        let commands = vec![
            Command::wave(&addrs, 20, &[0x00, 0xFF, 0xFF, 0x00]).unwrap(),
            Command::constant_drive(&addrs, 200).unwrap(),
            Command::motor_move(MotorDirection::Cw),
            Command::motor_move(MotorDirection::Ccw),
            Command::motor_move(MotorDirection::Stop),
            Command::motor_turn(MotorDirection::Cw, 90).unwrap(),
            Command::motor_turn(MotorDirection::Ccw, 360).unwrap(),
            Command::set_speed(80),
            Command::tare(),
        ];
        for command in &commands{
            let text = line(command);
            assert_eq!(decode_ack(&text), None, "{:?} decoded as ack", text);
            assert_eq!(decode_telemetry(&text), None, "{:?} decoded as telemetry", text);
        }
    }

    #[test]
    fn test_decode_line_trial_order(){
        assert_eq!(
            decode_line("DONE 7"),
            Decoded::Ack(Acknowledgement{ ok: true, timing_ms: Some(7) })
        );
        assert_eq!(
            decode_line("0.5"),
            Decoded::Telemetry(TelemetryFrame::Force(ForceSample{ newtons: 0.5 }))
        );
        assert_eq!(decode_line("DA7281 ready"), Decoded::Unmatched);
    }
}
