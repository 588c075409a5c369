use std::net::SocketAddr;
use std::time::{Duration, Instant};

use qlp_core::{
    CommonAnswerCode, ControlCommand, Controller, DeviceIdentity, DeviceService, DeviceState,
    LoopbackTransport, MemoryStrip, PacketType, PollOutcome, Rgb, UdpTransport, encode_frame,
};
use rand::rngs::mock::StepRng;

const DEVICE_ID: u32 = 0x1234_5678;

fn broadcast() -> SocketAddr {
    SocketAddr::from(([255, 255, 255, 255], 52075))
}

fn device_addr() -> SocketAddr {
    SocketAddr::from(([10, 1, 1, 9], 52075))
}

fn controller_addr() -> SocketAddr {
    SocketAddr::from(([10, 1, 1, 2], 52075))
}

fn loopback_device() -> DeviceService<LoopbackTransport, MemoryStrip, StepRng, fn()> {
    fn no_reset() {}
    DeviceService::new(
        LoopbackTransport::new(),
        broadcast(),
        DeviceState::new(DeviceIdentity::new(DEVICE_ID, "Porch"), MemoryStrip::new(6)),
        StepRng::new(0x42, 1),
        no_reset as fn(),
    )
}

#[test]
fn controller_discovers_device_over_loopback() {
    let mut device = loopback_device();
    device
        .transport_mut()
        .push_inbound(encode_frame(PacketType::Discovery, b"ABH"), controller_addr());
    device.poll_once().unwrap();

    let mut controller = Controller::new(LoopbackTransport::new(), broadcast());
    for (frame, _) in device.transport_mut().take_sent() {
        controller.transport_mut().push_inbound(frame, device_addr());
    }

    let devices = controller.discover(Duration::from_millis(20)).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, DEVICE_ID);
    assert_eq!(devices[0].correlation, 0x42);
    assert_eq!(devices[0].name, "Porch");
    assert_eq!(devices[0].addr, device_addr());
}

#[test]
fn controller_commands_device_over_loopback() {
    let mut device = loopback_device();
    let mut controller = Controller::new(LoopbackTransport::new(), broadcast());

    let command = ControlCommand::SetPixel {
        index: 3,
        color: Rgb::new(10, 20, 30),
    };
    controller.send(DEVICE_ID, &command).unwrap();
    for (frame, _) in controller.transport_mut().take_sent() {
        device.transport_mut().push_inbound(frame, controller_addr());
    }
    device.poll_once().unwrap();
    for (frame, _) in device.transport_mut().take_sent() {
        controller.transport_mut().push_inbound(frame, device_addr());
    }

    let answer = controller
        .await_answer(Duration::from_millis(20))
        .unwrap()
        .expect("device answered");
    assert_eq!(answer.packet_type, PacketType::Control);
    assert_eq!(answer.code, CommonAnswerCode::Ok);
    assert_eq!(device.state().strip.shown()[3], Rgb::new(10, 20, 30));
}

#[test]
fn command_for_other_device_gets_no_answer() {
    let mut device = loopback_device();
    let mut controller = Controller::new(LoopbackTransport::new(), broadcast());

    controller
        .send(DEVICE_ID ^ 1, &ControlCommand::Reboot)
        .unwrap();
    for (frame, _) in controller.transport_mut().take_sent() {
        device.transport_mut().push_inbound(frame, controller_addr());
    }
    device.poll_once().unwrap();
    assert!(device.transport().sent().is_empty());
    assert_eq!(
        controller.await_answer(Duration::from_millis(10)).unwrap(),
        None
    );
}

#[test]
fn controller_and_device_over_udp_localhost() {
    let device_transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let controller_transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let device_at = device_transport.local_addr().unwrap();
    let controller_at = controller_transport.local_addr().unwrap();

    let mut device = DeviceService::new(
        device_transport,
        controller_at,
        DeviceState::new(DeviceIdentity::new(DEVICE_ID, "Lab"), MemoryStrip::new(2)),
        StepRng::new(7, 1),
        || {},
    );
    let mut controller = Controller::new(controller_transport, device_at);

    controller
        .send(
            DEVICE_ID,
            &ControlCommand::Fill {
                color: Rgb::new(1, 1, 1),
            },
        )
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if device.poll_once().unwrap() != PollOutcome::Idle {
            break;
        }
        assert!(Instant::now() < deadline, "device never received the command");
        std::thread::sleep(Duration::from_millis(2));
    }

    let answer = controller
        .await_answer(Duration::from_secs(2))
        .unwrap()
        .expect("answer over udp");
    assert_eq!(answer.code, CommonAnswerCode::Ok);
    assert_eq!(device.state().strip.shown(), &[Rgb::new(1, 1, 1); 2]);
}
