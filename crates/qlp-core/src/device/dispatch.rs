//! Interpretation of validated packets.

use rand::RngCore;
use tracing::{debug, info};

use super::emitter::{Reply, ReplySink};
use super::state::DeviceState;
use super::strip::LedStrip;
use crate::protocol::command::{ControlCommand, ControlRequest};
use crate::protocol::layout;
use crate::protocol::types::{CommonAnswerCode, PacketType, Rgb};
use crate::protocol::validator::Packet;

/// Color of the marker lit on the last pixel after a resize.
pub const LENGTH_MARKER: Rgb = Rgb::from_u32(0x0000FF);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Exactly one reply was sent.
    Replied,
    /// Nothing was sent: foreign device id, unknown command, unused type.
    Silent,
    /// The reboot command was acknowledged and the strip blanked; the caller
    /// must restart the device.
    ResetRequested,
}

/// Act on one validated packet.
pub fn dispatch<S, R, K>(
    state: &mut DeviceState<S>,
    packet: &Packet<'_>,
    rng: &mut R,
    sink: &mut K,
) -> DispatchOutcome
where
    S: LedStrip,
    R: RngCore,
    K: ReplySink,
{
    match packet.packet_type() {
        PacketType::Discovery => handle_discovery(state, packet, rng, sink),
        PacketType::Control => handle_control(state, packet, sink),
        packet_type => {
            debug!(?packet_type, "no handler for packet type");
            DispatchOutcome::Silent
        }
    }
}

fn handle_discovery<S: LedStrip, R: RngCore, K: ReplySink>(
    state: &DeviceState<S>,
    packet: &Packet<'_>,
    rng: &mut R,
    sink: &mut K,
) -> DispatchOutcome {
    if !packet.payload().starts_with(layout::DISCOVERY_REQUEST) {
        debug!(payload_len = packet.payload().len(), "ignoring discovery payload");
        return DispatchOutcome::Silent;
    }
    let correlation = rng.next_u32();
    let payload = state.identity.discovery_reply(correlation);
    debug!(correlation, "answering discovery");
    sink.send(Reply::Typed {
        packet_type: PacketType::Discovery,
        payload: payload.into_bytes(),
    });
    DispatchOutcome::Replied
}

fn handle_control<S: LedStrip, K: ReplySink>(
    state: &mut DeviceState<S>,
    packet: &Packet<'_>,
    sink: &mut K,
) -> DispatchOutcome {
    let device_id = match ControlRequest::device_id(packet) {
        Ok(device_id) => device_id,
        Err(err) => {
            debug!(error = %err, "control frame without device id");
            return answer(sink, CommonAnswerCode::LengthError);
        }
    };
    if device_id != state.identity.device_id {
        debug!(
            device_id = %format!("{device_id:08X}"),
            "control frame for another device"
        );
        return DispatchOutcome::Silent;
    }

    let request = match ControlRequest::parse(packet) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "control frame without command id");
            return answer(sink, CommonAnswerCode::LengthError);
        }
    };

    let command = match ControlCommand::parse(request.command_id, request.data) {
        Ok(Some(command)) => command,
        Ok(None) => {
            debug!(command_id = request.command_id, "unknown command ignored");
            return DispatchOutcome::Silent;
        }
        Err(err) => {
            debug!(error = %err, "command rejected");
            return answer(sink, CommonAnswerCode::LengthError);
        }
    };

    debug!(?command, "applying command");
    apply(&mut state.strip, command, sink)
}

fn apply<S: LedStrip, K: ReplySink>(
    strip: &mut S,
    command: ControlCommand,
    sink: &mut K,
) -> DispatchOutcome {
    match command {
        ControlCommand::Reboot => {
            sink.send(Reply::answer(PacketType::Control, CommonAnswerCode::Ok));
            strip.clear();
            strip.flush();
            info!("reset requested");
            return DispatchOutcome::ResetRequested;
        }
        ControlCommand::SetLength { length } => {
            strip.set_len(u16::from(length));
            strip.clear();
            // Lands out of range (and is dropped) when length is 0.
            strip.set_pixel(u16::from(length).wrapping_sub(1), LENGTH_MARKER);
        }
        ControlCommand::Fill { color } => strip.fill(color),
        ControlCommand::SetPixel { index, color } => strip.set_pixel(index, color),
        ControlCommand::SetLine { start, end, color } => {
            for index in start..end {
                strip.set_pixel(index, color);
            }
        }
    }
    strip.flush();
    answer(sink, CommonAnswerCode::Ok)
}

fn answer<K: ReplySink>(sink: &mut K, code: CommonAnswerCode) -> DispatchOutcome {
    sink.send(Reply::answer(PacketType::Control, code));
    DispatchOutcome::Replied
}
