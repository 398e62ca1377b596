//! Driver facade: the crate's public entry point.

use std::time::Duration;

use log::{info, warn};

use crate::commands::{
    CMD_FORCE_SCAN, CMD_GET_DEVICE_INFO, CMD_GET_HEALTH, CMD_GET_SAMPLING_RATE, CMD_RESET, CMD_SCAN, CMD_SET_SAMPLING_RATE,
    CMD_STOP, DEVICE_INFO_PAYLOAD_LEN, DeviceInfo, HEALTH_PAYLOAD_LEN, Health, RESP_TYPE_DEVICE_INFO, RESP_TYPE_HEALTH,
    RESP_TYPE_MEASUREMENT, SamplingRate, parse_device_info, parse_health,
};
use crate::config::DriverConfig;
use crate::engine::Engine;
use crate::error::{DriverError, Result};
use crate::node::Node;
use crate::pump::{Pump, PumpCounters};
use crate::transport::{ByteStream, SerialByteStream};

/// DTR level that keeps the scanner motor spinning. The data-model note
/// ("low = motor on") is taken as authoritative over the looser language
/// against `startScan`; `connect` leaves DTR high (motor off) and `startScan`
/// lowers it.
const MOTOR_ON: bool = false;
const MOTOR_OFF: bool = true;

/// The driver, generic over its transport so tests can swap in
/// [`crate::transport::MockByteStream`] for [`SerialByteStream`].
pub struct Driver<S: ByteStream + 'static> {
    engine: Option<Engine<S>>,
    pump: Option<Pump<S>>,
    config: Option<DriverConfig>,
    intensity_mode: bool,
}

impl<S: ByteStream + 'static> Default for Driver<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ByteStream + 'static> Driver<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: None,
            pump: None,
            config: None,
            intensity_mode: false,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.engine.is_some() || self.pump.is_some()
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.pump.is_some()
    }

    /// Adopt an already-open stream as the link. The real [`SerialByteStream`]
    /// entry point is [`Driver::connect`]; this is the seam tests and
    /// alternative transports use directly.
    pub fn connect_with_stream(&mut self, stream: S, config: DriverConfig) -> Result<()> {
        if self.is_connected() {
            return Err(DriverError::AlreadyConnected);
        }
        let mut engine = Engine::new(stream);
        engine.set_dtr(MOTOR_OFF)?;
        self.intensity_mode = config.intensity_mode;
        self.engine = Some(engine);
        self.config = Some(config);
        info!("driver: connected");
        Ok(())
    }

    /// Idempotent: stops the pump first, then closes the link.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(pump) = self.pump.take() {
            self.engine = Some(pump.stop()?);
        }
        if let Some(mut engine) = self.engine.take() {
            engine.close()?;
        }
        self.config = None;
        info!("driver: disconnected");
        Ok(())
    }

    /// Must be called while not scanning.
    pub fn set_intensities(&mut self, on: bool) -> Result<()> {
        if self.is_scanning() {
            return Err(DriverError::InvalidState("cannot change intensity mode while scanning".into()));
        }
        self.intensity_mode = on;
        Ok(())
    }

    pub fn get_device_info(&mut self, timeout: Duration) -> Result<DeviceInfo> {
        let engine = self.command_engine()?;
        engine.send_command(CMD_GET_DEVICE_INFO, None)?;
        let header = engine.wait_response_header(timeout)?;
        if header.msg_type != RESP_TYPE_DEVICE_INFO {
            return Err(DriverError::Protocol(format!(
                "expected device info response (type {RESP_TYPE_DEVICE_INFO:#x}), got {:#x}",
                header.msg_type
            )));
        }
        if header.size as usize != DEVICE_INFO_PAYLOAD_LEN {
            return Err(DriverError::Protocol(format!(
                "expected {DEVICE_INFO_PAYLOAD_LEN}-byte device info payload, got {}",
                header.size
            )));
        }
        let payload = engine.wait_for_bytes(header.size as usize, timeout)?;
        parse_device_info(&payload)
    }

    pub fn get_health(&mut self, timeout: Duration) -> Result<Health> {
        let engine = self.command_engine()?;
        engine.send_command(CMD_GET_HEALTH, None)?;
        let header = engine.wait_response_header(timeout)?;
        if header.msg_type != RESP_TYPE_HEALTH {
            return Err(DriverError::Protocol(format!(
                "expected health response (type {RESP_TYPE_HEALTH:#x}), got {:#x}",
                header.msg_type
            )));
        }
        if header.size as usize != HEALTH_PAYLOAD_LEN {
            return Err(DriverError::Protocol(format!(
                "expected {HEALTH_PAYLOAD_LEN}-byte health payload, got {}",
                header.size
            )));
        }
        let payload = engine.wait_for_bytes(header.size as usize, timeout)?;
        parse_health(&payload)
    }

    pub fn get_sampling_rate(&mut self, timeout: Duration) -> Result<SamplingRate> {
        let engine = self.command_engine()?;
        engine.send_command(CMD_GET_SAMPLING_RATE, None)?;
        let header = engine.wait_response_header(timeout)?;
        let payload = engine.wait_for_bytes(header.size as usize, timeout)?;
        let byte = *payload.first().ok_or_else(|| DriverError::Protocol("empty sampling rate payload".into()))?;
        Ok(SamplingRate(byte))
    }

    pub fn set_sampling_rate(&mut self, rate: SamplingRate, timeout: Duration) -> Result<()> {
        let engine = self.command_engine()?;
        engine.send_command(CMD_SET_SAMPLING_RATE, Some(&[rate.0]))?;
        engine.wait_response_header(timeout)?;
        Ok(())
    }

    /// Write-only; allowed even while scanning (the one exception to the
    /// "stop first" exclusive-access rule, since it never reads a reply).
    pub fn reset(&mut self, _timeout: Duration) -> Result<()> {
        let frame = crate::frame::encode_command(CMD_RESET, None);
        if let Some(pump) = &self.pump {
            pump.send_raw(frame);
            return Ok(());
        }
        let engine = self.engine.as_mut().ok_or(DriverError::NotConnected)?;
        engine.stream_mut().write_all(&frame)
    }

    pub fn start_scan(&mut self, force: bool, timeout: Duration) -> Result<()> {
        if self.is_scanning() {
            return Err(DriverError::InvalidState("already scanning".into()));
        }
        let mut engine = self.engine.take().ok_or(DriverError::NotConnected)?;
        let cmd = if force { CMD_FORCE_SCAN } else { CMD_SCAN };
        if let Err(e) = engine.send_command(cmd, None) {
            self.engine = Some(engine);
            return Err(e);
        }
        let header = match engine.wait_response_header(timeout) {
            Ok(h) => h,
            Err(e) => {
                self.engine = Some(engine);
                return Err(e);
            }
        };
        if header.msg_type != RESP_TYPE_MEASUREMENT {
            self.engine = Some(engine);
            return Err(DriverError::Protocol(format!(
                "expected measurement stream response (type {RESP_TYPE_MEASUREMENT:#x}), got {:#x}",
                header.msg_type
            )));
        }
        if let Err(e) = engine.set_dtr(MOTOR_ON) {
            self.engine = Some(engine);
            return Err(e);
        }
        self.pump = Some(Pump::start(engine, self.intensity_mode));
        info!("driver: scan started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let Some(pump) = self.pump.take() else {
            return Ok(());
        };
        let mut engine = pump.stop()?;
        engine.send_command(CMD_STOP, None)?;
        engine.set_dtr(MOTOR_OFF)?;
        self.engine = Some(engine);
        info!("driver: scan stopped");
        Ok(())
    }

    /// Waits up to `timeout` for a complete rotation and returns it.
    pub fn grab_scan_data(&self, timeout: Duration) -> Result<Vec<Node>> {
        let pump = self.pump.as_ref().ok_or(DriverError::NotScanning)?;
        pump.grab_scan(timeout)
    }

    /// Running parser/pump diagnostics, if a scan is active.
    #[must_use]
    pub fn pump_counters(&self) -> Option<PumpCounters> {
        self.pump.as_ref().map(Pump::counters)
    }

    fn command_engine(&mut self) -> Result<&mut Engine<S>> {
        if self.is_scanning() {
            return Err(DriverError::InvalidState(
                "command transactions require stopping the scan first".into(),
            ));
        }
        self.engine.as_mut().ok_or(DriverError::NotConnected)
    }
}

impl Driver<SerialByteStream> {
    /// Open a real serial link and connect.
    pub fn connect(config: DriverConfig) -> Result<Self> {
        let stream = SerialByteStream::open(&config.port, config.baud_rate, config.timeout())?;
        let mut driver = Self::new();
        driver.connect_with_stream(stream, config)?;
        Ok(driver)
    }
}

/// Rotate `nodes` so the smallest-angle sample leads, falling back to a
/// stable sort if the rotated sequence still isn't monotone modulo 360°
/// (the input is expected to be near-monotonic already).
#[must_use]
pub fn ascend_scan_data(mut nodes: Vec<Node>) -> Vec<Node> {
    if nodes.len() < 2 {
        return nodes;
    }
    let min_idx = nodes
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.angle_raw().cmp(&b.1.angle_raw()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    nodes.rotate_left(min_idx);

    let monotone = nodes.windows(2).all(|w| w[0].angle_raw() <= w[1].angle_raw());
    if !monotone {
        warn!("ascend_scan_data: rotation left a non-monotone sequence, falling back to stable sort");
        nodes.sort_by_key(Node::angle_raw);
    }
    nodes
}
