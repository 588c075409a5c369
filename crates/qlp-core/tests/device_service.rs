use std::net::SocketAddr;

use qlp_core::{
    CommonAnswer, CommonAnswerCode, ControlCommand, DeviceIdentity, DeviceService, DeviceState,
    DispatchOutcome, LENGTH_MARKER, LoopbackTransport, MemoryStrip, PacketType, PollOutcome, Rgb,
    decode_common_answer, decode_frame, encode_control, encode_frame, encode_raw_control,
};
use rand::rngs::mock::StepRng;

const DEVICE_ID: u32 = 0x00C0FFEE;

type Service = DeviceService<LoopbackTransport, MemoryStrip, StepRng, fn()>;

fn controller() -> SocketAddr {
    SocketAddr::from(([192, 168, 4, 2], 52075))
}

fn broadcast() -> SocketAddr {
    SocketAddr::from(([255, 255, 255, 255], 52075))
}

fn no_reset() {}

fn device(strip_len: u16) -> Service {
    DeviceService::new(
        LoopbackTransport::new(),
        broadcast(),
        DeviceState::new(
            DeviceIdentity::new(DEVICE_ID, "Workbench"),
            MemoryStrip::new(strip_len),
        ),
        StepRng::new(0xABCD, 1),
        no_reset as fn(),
    )
}

/// Feed one datagram and return what the device sent in response.
fn exchange(service: &mut Service, datagram: Vec<u8>) -> (PollOutcome, Vec<Vec<u8>>) {
    service.transport_mut().push_inbound(datagram, controller());
    let outcome = service.poll_once().unwrap();
    let sent = service
        .transport_mut()
        .take_sent()
        .into_iter()
        .map(|(frame, dest)| {
            assert_eq!(dest, broadcast());
            frame
        })
        .collect();
    (outcome, sent)
}

fn single_answer(sent: &[Vec<u8>]) -> CommonAnswer {
    assert_eq!(sent.len(), 1, "expected exactly one reply");
    decode_common_answer(&sent[0]).unwrap()
}

#[test]
fn discovery_request_gets_iah_reply() {
    let mut service = device(1);
    let (_, sent) = exchange(&mut service, encode_frame(PacketType::Discovery, b"ABH"));
    assert_eq!(sent.len(), 1);
    let frame = decode_frame(&sent[0]).unwrap();
    assert_eq!(frame.packet_type, PacketType::Discovery);
    assert_eq!(frame.payload, b"IAH-00C0FFEE-0000ABCD-Workbench");
}

#[test]
fn discovery_with_trailing_bytes_still_answers() {
    let mut service = device(1);
    let (_, sent) = exchange(&mut service, encode_frame(PacketType::Discovery, b"ABHxyz"));
    assert_eq!(sent.len(), 1);
}

#[test]
fn non_abh_discovery_is_silent() {
    let mut service = device(1);
    for payload in [&b""[..], &b"AB"[..], &b"XYZ"[..]] {
        let (outcome, sent) = exchange(&mut service, encode_frame(PacketType::Discovery, payload));
        assert_eq!(outcome, PollOutcome::Dispatched(DispatchOutcome::Silent));
        assert!(sent.is_empty());
    }
}

#[test]
fn broadcast_type_is_silent() {
    let mut service = device(1);
    let (_, sent) = exchange(&mut service, encode_frame(PacketType::Broadcast, b"hello"));
    assert!(sent.is_empty());
}

#[test]
fn foreign_device_id_produces_no_datagram() {
    let mut service = device(4);
    let fill = ControlCommand::Fill {
        color: Rgb::new(1, 2, 3),
    };
    let (outcome, sent) = exchange(&mut service, encode_control(DEVICE_ID + 1, &fill));
    assert_eq!(outcome, PollOutcome::Dispatched(DispatchOutcome::Silent));
    assert!(sent.is_empty());
    assert_eq!(service.state().strip.flush_count(), 0);
}

#[test]
fn fill_requires_exactly_three_bytes() {
    let mut service = device(3);

    for data in [&[9u8, 9][..], &[9, 9, 9, 9][..]] {
        let (_, sent) = exchange(&mut service, encode_raw_control(DEVICE_ID, 0x54, data));
        let answer = single_answer(&sent);
        assert_eq!(answer.packet_type, PacketType::Control);
        assert_eq!(answer.code, CommonAnswerCode::LengthError);
        assert_eq!(service.state().strip.flush_count(), 0);
    }

    let (_, sent) = exchange(&mut service, encode_raw_control(DEVICE_ID, 0x54, &[9, 8, 7]));
    assert_eq!(single_answer(&sent).code, CommonAnswerCode::Ok);
    assert_eq!(service.state().strip.shown(), &[Rgb::new(9, 8, 7); 3]);
}

#[test]
fn empty_line_range_writes_nothing_and_acks() {
    let mut service = device(10);
    let line = ControlCommand::SetLine {
        start: 5,
        end: 5,
        color: Rgb::new(255, 255, 255),
    };
    let (_, sent) = exchange(&mut service, encode_control(DEVICE_ID, &line));
    assert_eq!(single_answer(&sent).code, CommonAnswerCode::Ok);
    assert_eq!(service.state().strip.pixel_writes(), 0);
    assert_eq!(service.state().strip.lit(), 0);
}

#[test]
fn line_paints_half_open_range() {
    let mut service = device(10);
    let line = ControlCommand::SetLine {
        start: 2,
        end: 5,
        color: Rgb::new(0, 255, 0),
    };
    exchange(&mut service, encode_control(DEVICE_ID, &line));
    let shown = service.state().strip.shown();
    assert_eq!(service.state().strip.lit(), 3);
    assert_eq!(shown[1], Rgb::BLACK);
    assert_eq!(shown[2], Rgb::new(0, 255, 0));
    assert_eq!(shown[4], Rgb::new(0, 255, 0));
    assert_eq!(shown[5], Rgb::BLACK);
}

#[test]
fn set_length_marks_last_pixel() {
    let mut service = device(1);
    let (_, sent) = exchange(
        &mut service,
        encode_control(DEVICE_ID, &ControlCommand::SetLength { length: 8 }),
    );
    assert_eq!(single_answer(&sent).code, CommonAnswerCode::Ok);
    let shown = service.state().strip.shown();
    assert_eq!(shown.len(), 8);
    assert_eq!(shown[7], LENGTH_MARKER);
    assert_eq!(service.state().strip.lit(), 1);
}

#[test]
fn unknown_command_is_silent() {
    let mut service = device(1);
    let (_, sent) = exchange(&mut service, encode_raw_control(DEVICE_ID, 0x99, &[1, 2, 3]));
    assert!(sent.is_empty());
}

#[test]
fn truncated_control_frame_is_a_length_error() {
    let mut service = device(1);
    let (_, sent) = exchange(&mut service, encode_frame(PacketType::Control, &[0xEE, 0xFF]));
    let answer = single_answer(&sent);
    assert_eq!(answer.packet_type, PacketType::Control);
    assert_eq!(answer.code, CommonAnswerCode::LengthError);
}

#[test]
fn ten_byte_control_frame_is_filtered_by_device_id() {
    let mut service = device(1);
    let foreign = encode_frame(PacketType::Control, &0xDEADBEEFu32.to_le_bytes());
    assert_eq!(foreign.len(), 10);
    let (outcome, sent) = exchange(&mut service, foreign);
    assert_eq!(outcome, PollOutcome::Dispatched(DispatchOutcome::Silent));
    assert!(sent.is_empty());

    let own = encode_frame(PacketType::Control, &DEVICE_ID.to_le_bytes());
    let (_, sent) = exchange(&mut service, own);
    assert_eq!(single_answer(&sent).code, CommonAnswerCode::LengthError);
}

#[test]
fn corrupt_control_frame_gets_typed_crc_error() {
    let mut service = device(1);
    let mut frame = encode_control(DEVICE_ID, &ControlCommand::Reboot);
    let last = frame.len() - 1;
    frame[last] = frame[last].wrapping_add(1);
    let (outcome, sent) = exchange(&mut service, frame);
    assert_eq!(outcome, PollOutcome::Rejected(CommonAnswerCode::CrcError));
    let answer = single_answer(&sent);
    assert_eq!(answer.packet_type, PacketType::Control);
    assert_eq!(answer.code, CommonAnswerCode::CrcError);
}

#[test]
fn reboot_acks_then_blanks_strip() {
    let mut service = device(4);
    exchange(
        &mut service,
        encode_control(
            DEVICE_ID,
            &ControlCommand::Fill {
                color: Rgb::new(5, 5, 5),
            },
        ),
    );
    let (outcome, sent) = exchange(&mut service, encode_raw_control(DEVICE_ID, 0x74, b"now"));
    assert_eq!(
        outcome,
        PollOutcome::Dispatched(DispatchOutcome::ResetRequested)
    );
    assert_eq!(single_answer(&sent).code, CommonAnswerCode::Ok);
    assert_eq!(service.state().strip.lit(), 0);
}

#[test]
fn queued_datagrams_are_handled_one_per_poll() {
    let mut service = device(2);
    service
        .transport_mut()
        .push_inbound(encode_frame(PacketType::Discovery, b"ABH"), controller());
    service
        .transport_mut()
        .push_inbound(b"junk".to_vec(), controller());

    assert!(matches!(
        service.poll_once().unwrap(),
        PollOutcome::Dispatched(DispatchOutcome::Replied)
    ));
    assert_eq!(service.transport().pending(), 1);
    assert_eq!(
        service.poll_once().unwrap(),
        PollOutcome::Rejected(CommonAnswerCode::LengthError)
    );
    assert_eq!(service.poll_once().unwrap(), PollOutcome::Idle);
    assert_eq!(service.transport().sent().len(), 2);
    assert_eq!(service.stats().received, 2);
}
