//! Hardware port sink built on midir.

use midir::{MidiOutput, MidiOutputConnection};

use crate::traits::{DeviceError, MidiSink};

const CLIENT_NAME: &str = "midistream";

/// Names of the available output ports.
pub fn list_ports() -> Result<Vec<String>, DeviceError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::DeviceInit(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// A connected midir output port.
pub struct MidirSink {
    conn: MidiOutputConnection,
}

impl MidirSink {
    /// Connect to the port called `port_name`, or the first port if `None`.
    pub fn connect(port_name: Option<&str>) -> Result<Self, DeviceError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::DeviceInit(e.to_string()))?;
        let ports = midi_out.ports();

        let port = match port_name {
            Some(wanted) => ports
                .iter()
                .find(|port| midi_out.port_name(port).is_ok_and(|name| name == wanted)),
            None => ports.first(),
        }
        .ok_or(DeviceError::NoDevice)?;

        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "unknown".to_string());
        let conn = midi_out
            .connect(port, CLIENT_NAME)
            .map_err(|e| DeviceError::DeviceInit(e.to_string()))?;

        log::info!("connected to MIDI port: {}", name);
        Ok(Self { conn })
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        self.conn
            .send(bytes)
            .map_err(|e| DeviceError::Send(e.to_string()))
    }
}
