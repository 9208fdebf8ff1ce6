use thiserror::Error;

//legal device ids on the rig's i2c-style bus
pub const ADDR_MIN: u8 = 0x01;
pub const ADDR_MAX: u8 = 0x7F;

//construction-time rejection; a bad command is never encoded or sent
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidCommand{
    #[error("address set is empty")]
    NoAddresses,
    #[error("address 0x{0:02X} outside 0x01..=0x7F")]
    AddressOutOfRange(u8),
    #[error("address 0x{0:02X} listed twice")]
    DuplicateAddress(u8),
    #[error("waveform has no samples")]
    EmptyWaveform,
    #[error("waveform step must be at least 1ms")]
    ZeroStep,
    #[error("angle {0} outside 0..=360 degrees")]
    AngleOutOfRange(u16),
    #[error("motor turn needs a rotation direction, not stop")]
    TurnWithoutDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress(u8);

impl DeviceAddress{
    pub fn new(raw: u8) -> Result<Self, InvalidCommand>{
        if !(ADDR_MIN..=ADDR_MAX).contains(&raw){
            return Err(InvalidCommand::AddressOutOfRange(raw));
        }
        Ok(DeviceAddress(raw))
    }

    pub fn get(&self) -> u8{
        self.0
    }
}

//convenience for callers holding raw ids (ffi, config)
pub fn addresses(raw: &[u8]) -> Result<Vec<DeviceAddress>, InvalidCommand>{
    raw.iter().map(|&b| DeviceAddress::new(b)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDirection{
    Cw,
    Ccw,
    Stop,
}

//one outbound command; validated on construction, immutable after
#[derive(Debug, Clone, PartialEq)]
pub struct Command{
    pub(crate) kind: CommandKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommandKind{
    Wave{ addresses: Vec<DeviceAddress>, step_ms: u32, amplitudes: Vec<u8> },
    ConstantDrive{ addresses: Vec<DeviceAddress>, amplitude: u8 },
    MotorMove{ direction: MotorDirection },
    MotorTurn{ direction: MotorDirection, angle_deg: u16 },
    SetSpeed{ value: u8 },
    Tare,
}

fn checked_addresses(addresses: &[DeviceAddress]) -> Result<Vec<DeviceAddress>, InvalidCommand>{
    if addresses.is_empty(){
        return Err(InvalidCommand::NoAddresses);
    }
    for (i, addr) in addresses.iter().enumerate(){
        if addresses[..i].contains(addr){
            return Err(InvalidCommand::DuplicateAddress(addr.get()));
        }
    }
    Ok(addresses.to_vec())
}

impl Command{
    //waveform playback on one or more drivers, one amplitude per step
    pub fn wave(addresses: &[DeviceAddress], step_ms: u32, amplitudes: &[u8]) -> Result<Self, InvalidCommand>{
        let addresses = checked_addresses(addresses)?;
        if amplitudes.is_empty(){
            return Err(InvalidCommand::EmptyWaveform);
        }
        if step_ms == 0{
            return Err(InvalidCommand::ZeroStep);
        }
        Ok(Command{ kind: CommandKind::Wave{ addresses, step_ms, amplitudes: amplitudes.to_vec() } })
    }

    //hold the named drivers at a fixed amplitude until told otherwise
    pub fn constant_drive(addresses: &[DeviceAddress], amplitude: u8) -> Result<Self, InvalidCommand>{
        let addresses = checked_addresses(addresses)?;
        Ok(Command{ kind: CommandKind::ConstantDrive{ addresses, amplitude } })
    }

    pub fn motor_move(direction: MotorDirection) -> Self{
        Command{ kind: CommandKind::MotorMove{ direction } }
    }

    pub fn motor_turn(direction: MotorDirection, angle_deg: u16) -> Result<Self, InvalidCommand>{
        if direction == MotorDirection::Stop{
            return Err(InvalidCommand::TurnWithoutDirection);
        }
        if angle_deg > 360{
            return Err(InvalidCommand::AngleOutOfRange(angle_deg));
        }
        Ok(Command{ kind: CommandKind::MotorTurn{ direction, angle_deg } })
    }

    pub fn set_speed(value: u8) -> Self{
        Command{ kind: CommandKind::SetSpeed{ value } }
    }

    pub fn tare() -> Self{
        Command{ kind: CommandKind::Tare }
    }

    //short tag for logs and sample sinks
    pub fn name(&self) -> &'static str{
        match &self.kind{
            CommandKind::Wave{ .. } => "wave",
            CommandKind::ConstantDrive{ .. } => "drive",
            CommandKind::MotorMove{ .. } => "move",
            CommandKind::MotorTurn{ .. } => "turn",
            CommandKind::SetSpeed{ .. } => "speed",
            CommandKind::Tare => "tare",
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_address_range(){
        assert!(DeviceAddress::new(0x48).is_ok());
        assert!(DeviceAddress::new(1).is_ok());
        assert!(DeviceAddress::new(127).is_ok());
        assert_eq!(DeviceAddress::new(0), Err(InvalidCommand::AddressOutOfRange(0)));
        assert_eq!(DeviceAddress::new(128), Err(InvalidCommand::AddressOutOfRange(128)));
    }

    #[test]
    fn test_wave_needs_addresses(){
        let err = Command::wave(&[], 20, &[0x10]).unwrap_err();
        assert_eq!(err, InvalidCommand::NoAddresses);
    }

    #[test]
    fn test_wave_rejects_duplicates(){
        let addrs = addresses(&[0x48, 0x49, 0x48]).unwrap();
        let err = Command::wave(&addrs, 20, &[0x10]).unwrap_err();
        assert_eq!(err, InvalidCommand::DuplicateAddress(0x48));
    }

    #[test]
    fn test_wave_rejects_empty_samples_and_zero_step(){
        let addrs = addresses(&[0x48]).unwrap();
        assert_eq!(Command::wave(&addrs, 20, &[]).unwrap_err(), InvalidCommand::EmptyWaveform);
        assert_eq!(Command::wave(&addrs, 0, &[0x10]).unwrap_err(), InvalidCommand::ZeroStep);
    }

    #[test]
    fn test_turn_validation(){
        assert!(Command::motor_turn(MotorDirection::Cw, 0).is_ok());
        assert!(Command::motor_turn(MotorDirection::Ccw, 360).is_ok());
        assert_eq!(
            Command::motor_turn(MotorDirection::Cw, 361).unwrap_err(),
            InvalidCommand::AngleOutOfRange(361)
        );
        assert_eq!(
            Command::motor_turn(MotorDirection::Stop, 90).unwrap_err(),
            InvalidCommand::TurnWithoutDirection
        );
    }

    #[test]
    fn test_command_names(){
        let addrs = addresses(&[0x48]).unwrap();
        assert_eq!(Command::wave(&addrs, 20, &[1]).unwrap().name(), "wave");
        assert_eq!(Command::tare().name(), "tare");
        assert_eq!(Command::motor_move(MotorDirection::Stop).name(), "move");
    }
}
