//! DYNAMIXEL bus implementation.
//!
//! `DynamixelBus` drives Protocol 2.0 actuators through a serial adapter.
//! Control-table addresses come from `[registers]`; the driver assumes no
//! model-specific layout of its own.

use super::DRIVER_NAME;
use super::protocol::{self, BROADCAST_ID, Instruction, PacketError, StatusPacket};
use super::settings::DynamixelSettings;
use evo_common::consts::MAX_AXIS_ID;
use evo_common::servo::bus::{BusError, CurrentSupport, MotorBus};
use evo_common::servo::config::{RegisterMap, ServoConfig};
use evo_common::servo::types::{AxisId, AxisSample, GoalMap, MeasuredState};
use serialport::{ClearBuffer, SerialPort};
use std::fmt::Display;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Byte stream carrying bus packets.
pub trait PacketPort: Read + Write + Send {
    /// Change the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Drop unread input.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl PacketPort for Box<dyn SerialPort> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(&mut **self, timeout).map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        SerialPort::clear(&**self, ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Control-table range requested per axis in one bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadSpan {
    start: u16,
    len: u16,
    position: usize,
    current: Option<usize>,
}

impl ReadSpan {
    fn position_only(registers: &RegisterMap) -> Self {
        Self {
            start: registers.present_position,
            len: 4,
            position: 0,
            current: None,
        }
    }

    /// One range covering both registers; a bulk read takes one entry per ID.
    fn with_current(registers: &RegisterMap) -> Self {
        let (pos, cur) = (registers.present_position, registers.present_current);
        let start = pos.min(cur);
        let end = pos.saturating_add(4).max(cur.saturating_add(2));
        Self {
            start,
            len: end - start,
            position: usize::from(pos - start),
            current: Some(usize::from(cur - start)),
        }
    }

    fn decode(&self, data: &[u8]) -> Option<AxisSample> {
        let position = protocol::le_i32(tail(data, self.position))?;
        let current = self
            .current
            .and_then(|offset| protocol::le_i16(tail(data, offset)));
        Some(AxisSample { position, current })
    }
}

fn tail(data: &[u8], offset: usize) -> &[u8] {
    data.get(offset..).unwrap_or_default()
}

fn transmit(port: &mut Box<dyn PacketPort>, packet: &[u8]) -> io::Result<()> {
    port.clear_input()?;
    port.write_all(packet)?;
    port.flush()
}

fn transport(instruction: Instruction, id: u8, detail: impl Display) -> BusError {
    BusError::Transport(format!("{instruction:?} to axis {id}: {detail}"))
}

/// DYNAMIXEL Protocol 2.0 motor bus.
pub struct DynamixelBus {
    device: String,
    baudrate: u32,
    axes: Vec<AxisId>,
    registers: RegisterMap,
    settings: DynamixelSettings,
    port: Option<Box<dyn PacketPort>>,
    current_support: CurrentSupport,
}

impl DynamixelBus {
    /// Build the bus from `[bus]`, `[registers]` and
    /// `[driver_config.dynamixel]`. The port opens in [`MotorBus::open`].
    pub fn new(config: &ServoConfig) -> Result<Self, BusError> {
        if (config.bus.protocol - 2.0).abs() > f32::EPSILON {
            return Err(BusError::ConfigError(format!(
                "{DRIVER_NAME} driver supports protocol 2.0 only (got {})",
                config.bus.protocol
            )));
        }
        let settings = DynamixelSettings::from_section(config.driver_section(DRIVER_NAME))?;

        Ok(Self {
            device: config.bus.device.clone(),
            baudrate: config.bus.baudrate,
            axes: config.axes.ids.clone(),
            registers: config.registers,
            settings,
            port: None,
            current_support: CurrentSupport::Unknown,
        })
    }

    /// Build the bus over a port that is already open.
    pub fn with_port(config: &ServoConfig, port: Box<dyn PacketPort>) -> Result<Self, BusError> {
        let mut bus = Self::new(config)?;
        bus.port = Some(port);
        Ok(bus)
    }

    fn port(&mut self) -> Result<&mut Box<dyn PacketPort>, BusError> {
        self.port.as_mut().ok_or(BusError::NotOpen)
    }

    fn send(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<(), BusError> {
        let packet = protocol::encode(id, instruction, params);
        trace!(id, ?instruction, len = packet.len(), "Sending packet");
        transmit(self.port()?, &packet).map_err(|e| transport(instruction, id, e))
    }

    fn receive(&mut self) -> Result<StatusPacket, PacketError> {
        match self.port.as_mut() {
            Some(port) => protocol::read_status(port),
            None => Err(PacketError::Io(io::ErrorKind::NotConnected.into())),
        }
    }

    /// Send to one device and require a clean status from it.
    fn transact(
        &mut self,
        id: AxisId,
        instruction: Instruction,
        params: &[u8],
    ) -> Result<StatusPacket, BusError> {
        self.send(id, instruction, params)?;
        let status = self.receive().map_err(|e| transport(instruction, id, e))?;
        if status.id != id {
            return Err(transport(
                instruction,
                id,
                format!("status from axis {}", status.id),
            ));
        }
        if status.failed() {
            return Err(transport(
                instruction,
                id,
                format!("status error {:#04x}", status.error),
            ));
        }
        Ok(status)
    }

    fn write_register(&mut self, axis: AxisId, address: u16, data: &[u8]) -> Result<(), BusError> {
        let params = protocol::write_params(address, data);
        self.transact(axis, Instruction::Write, &params).map(|_| ())
    }

    fn set_port_timeout(&mut self, timeout: Duration) -> Result<(), BusError> {
        self.port()?
            .set_timeout(timeout)
            .map_err(|e| BusError::Transport(format!("set read timeout: {e}")))
    }

    fn scan(&mut self) -> Result<Vec<AxisId>, BusError> {
        let mut found = Vec::new();
        for id in 0..=MAX_AXIS_ID {
            self.send(id, Instruction::Ping, &[])?;
            match self.receive() {
                Ok(status) if status.id == id && !status.failed() => found.push(id),
                Ok(status) => debug!(id, reply = status.id, error = status.error, "Ping: unusable status"),
                Err(PacketError::Io(e)) => return Err(transport(Instruction::Ping, id, e)),
                Err(e) => trace!(id, "Ping: {e}"),
            }
        }
        Ok(found)
    }

    /// One bulk read of `span` on every axis. Axes without a usable status
    /// are left out of the returned state.
    fn read_span(&mut self, axes: &[AxisId], span: ReadSpan) -> Result<MeasuredState, BusError> {
        let params =
            protocol::bulk_read_params(axes.iter().map(|&axis| (axis, span.start, span.len)));
        self.send(BROADCAST_ID, Instruction::BulkRead, &params)?;

        let mut state = MeasuredState::new();
        for &axis in axes {
            match self.receive() {
                Ok(status) if status.id == axis && !status.failed() => {
                    match span.decode(&status.params) {
                        Some(sample) => state.insert(axis, sample),
                        None => debug!(axis, len = status.params.len(), "Bulk read: short status"),
                    }
                }
                Ok(status) => debug!(
                    axis,
                    reply = status.id,
                    error = status.error,
                    "Bulk read: unusable status"
                ),
                Err(PacketError::Timeout) => debug!(axis, "Bulk read: no status"),
                Err(e) => return Err(transport(Instruction::BulkRead, axis, e)),
            }
        }
        trace!("Bulk read: {:?}", state);
        Ok(state)
    }
}

impl MotorBus for DynamixelBus {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn open(&mut self) -> Result<(), BusError> {
        if self.port.is_some() {
            return Ok(());
        }
        info!(
            "Opening DYNAMIXEL bus on {} at {} baud",
            self.device, self.baudrate
        );
        let serial = serialport::new(self.device.as_str(), self.baudrate)
            .timeout(self.settings.timeout())
            .open()
            .map_err(|e| BusError::OpenFailed(format!("{}: {e}", self.device)))?;
        let port: Box<dyn PacketPort> = Box::new(serial);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.port.take().is_some() {
            info!("Closing DYNAMIXEL bus on {}", self.device);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn discover(&mut self) -> Result<Vec<AxisId>, BusError> {
        self.set_port_timeout(self.settings.scan_timeout())?;
        let found = self.scan();
        self.set_port_timeout(self.settings.timeout())?;
        let found = found?;
        debug!("Scan found {} servos: {:?}", found.len(), found);
        Ok(found)
    }

    fn set_mode(&mut self, axis: AxisId, mode: u8) -> Result<(), BusError> {
        self.write_register(axis, self.registers.operating_mode, &[mode])?;
        debug!(axis, mode, "Operating mode written");
        Ok(())
    }

    fn set_torque(&mut self, axis: AxisId, enabled: bool) -> Result<(), BusError> {
        self.write_register(axis, self.registers.torque_enable, &[u8::from(enabled)])?;
        debug!(axis, enabled, "Torque enable written");
        Ok(())
    }

    fn bulk_read(
        &mut self,
        axes: &[AxisId],
        want_current: bool,
    ) -> Result<MeasuredState, BusError> {
        self.port()?;
        if axes.is_empty() {
            return Ok(MeasuredState::new());
        }

        if self.current_support.should_request(want_current) {
            let state = self.read_span(axes, ReadSpan::with_current(&self.registers))?;
            let all_present = axes.iter().all(|&axis| state.current(axis).is_some());
            self.current_support.observe(all_present);
            if all_present || state.require_positions(axes).is_ok() {
                return Ok(state);
            }
            warn!("Combined position/current read rejected, reading positions only");
        }

        let state = self.read_span(axes, ReadSpan::position_only(&self.registers))?;
        state.require_positions(axes)?;
        Ok(state)
    }

    fn sync_write(&mut self, goals: &GoalMap) -> Result<(), BusError> {
        self.port()?;
        if let Some(&axis) = goals.keys().find(|&&axis| !self.axes.contains(&axis)) {
            return Err(BusError::UnknownAxis(axis));
        }
        if goals.is_empty() {
            return Ok(());
        }

        let params = protocol::sync_write_params(
            self.registers.goal_position,
            goals.iter().map(|(&axis, &goal)| (axis, goal)),
        );
        self.send(BROADCAST_ID, Instruction::SyncWrite, &params)?;
        trace!("Sync write: {:?}", goals);
        Ok(())
    }

    fn current_support(&self) -> CurrentSupport {
        self.current_support
    }
}
