use std::fs::File;
use std::path::Path;

use thiserror::Error;

use crate::wire::TelemetryFrame;

#[derive(Debug, Error)]
pub enum SinkError{
    #[error("sample log write failed: {0}")]
    Csv(#[from] csv::Error),
}

//append-only consumer of labelled telemetry records, e.g. rows keyed by
//the sweep frequency that was playing when the sample arrived
pub trait SampleSink{
    fn record(&mut self, label: &str, frame: &TelemetryFrame) -> Result<(), SinkError>;
}

pub struct CsvSink{
    writer: csv::Writer<File>,
}

impl CsvSink{
    pub fn create(path: &Path) -> Result<Self, SinkError>{
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["label", "kind", "v0", "v1", "v2", "v3", "v4", "v5"])?;
        Ok(CsvSink{ writer })
    }

    pub fn flush(&mut self) -> Result<(), SinkError>{
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

impl SampleSink for CsvSink{
    fn record(&mut self, label: &str, frame: &TelemetryFrame) -> Result<(), SinkError>{
        match frame{
            TelemetryFrame::Imu(imu) =>{
                let vals = [
                    imu.accel_x, imu.accel_y, imu.accel_z,
                    imu.gyro_x, imu.gyro_y, imu.gyro_z,
                ].map(|v| v.to_string());
                self.writer.write_record([
                    label, "imu",
                    vals[0].as_str(), vals[1].as_str(), vals[2].as_str(),
                    vals[3].as_str(), vals[4].as_str(), vals[5].as_str(),
                ])?;
            }
            TelemetryFrame::Force(force) =>{
                let newtons = force.newtons.to_string();
                self.writer.write_record([
                    label, "force", newtons.as_str(), "", "", "", "", "",
                ])?;
            }
        }
        Ok(())
    }
}
