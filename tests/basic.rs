use std::time::Duration;

use lumictl::e2e_common::{DeviceScript, FakeDevice};
use lumictl::messages::{
    AuthRequest, FileRequest, PollRequest, SaltRequest, SceneTrigger, ZoneQuery,
};
use lumictl::{
    Codec, CompiledProfile, ControllerConfig, DiscoveryClient, NameTable, Reply, Request, Rgb,
    TriggerCommand, ZoneState, ZoneStatus,
};

fn codec() -> Codec {
    Codec::new(&CompiledProfile::default())
}

#[test]
fn every_request_encodes_to_its_fixed_length() {
    let codec = codec();
    let requests = [
        Request::Poll(PollRequest {
            protocol_version: 1,
        }),
        Request::SceneTrigger(SceneTrigger {
            scene: 3,
            zone_sync_id: 1,
            command: TriggerCommand::Start,
            dimmer: None,
            speed: None,
            color: None,
        }),
        Request::File(FileRequest {
            filename: "names.xml".into(),
            first: true,
            chunk_size: 512,
        }),
        Request::ZoneQuery(ZoneQuery {
            timestamp: 9,
            zone_id: 2,
        }),
        Request::Salt(SaltRequest { timestamp: 9 }),
        Request::Auth(AuthRequest {
            timestamp: 9,
            login: "admin".into(),
            salt: [1; 32],
            signature: [2; 32],
        }),
    ];
    for request in requests {
        let frame = codec.encode_request(&request).unwrap();
        assert_eq!(frame.len(), Codec::request_len(request.opcode()));
        assert_eq!(&frame[..8], b"LUMICTRL");
        assert_eq!(codec.decode_request(&frame).unwrap(), request);
    }
}

#[test]
fn absent_zone_fields_survive_the_wire_as_absent() {
    let codec = codec();
    let status = Reply::ZoneStatus(ZoneStatus {
        timestamp: 5,
        zone_id: 2,
        state: ZoneState {
            running_scene: Some(0),
            dimmer: Some(0xFFFE),
            color: Some(Rgb::new(1, 2, 3)),
            ..ZoneState::default()
        },
    });
    let frame = codec.encode_reply(&status).unwrap();
    match codec.decode_reply(&frame).unwrap() {
        Reply::ZoneStatus(decoded) => {
            assert_eq!(decoded.state.running_scene, Some(0));
            assert_eq!(decoded.state.dimmer, Some(0xFFFE));
            assert_eq!(decoded.state.speed, None);
            assert_eq!(decoded.state.saturation, None);
            assert_eq!(decoded.state.extra, [None; 3]);
            assert_eq!(decoded.state.color, Some(Rgb::new(1, 2, 3)));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn custom_identifier_is_emitted_on_every_frame() {
    let profile = ControllerConfig::from_json(r#"{"profile":{"identifier":"SHOWCTRL"}}"#)
        .unwrap()
        .validate()
        .unwrap();
    let codec = Codec::new(&profile);
    let frame = codec
        .encode_request(&Request::Salt(SaltRequest { timestamp: 1 }))
        .unwrap();
    assert_eq!(&frame[..8], b"SHOWCTRL");
}

#[test]
fn name_table_collects_scenes_zones_and_form_factor() {
    let xml = br#"<?xml version="1.0"?>
        <root formFactor="wall">
          <scenes><scene id="1" name="Warm"/><scene index="2" name="Cool &amp; Blue"/></scenes>
          <zones><zone id="4" name="Lobby"/><zone name="orphan"/></zones>
        </root>"#;
    let table = NameTable::parse(xml).unwrap();
    assert_eq!(table.form_factor.as_deref(), Some("wall"));
    assert_eq!(table.scenes.get(&1).map(String::as_str), Some("Warm"));
    assert_eq!(table.scenes.get(&2).map(String::as_str), Some("Cool & Blue"));
    assert_eq!(table.zones.len(), 1);
    assert_eq!(NameTable::parse(b"<root/>").unwrap(), NameTable::default());
}

#[tokio::test]
async fn discovery_finds_the_fake_device() {
    let device = FakeDevice::spawn(DeviceScript::reference()).await.unwrap();
    let client = DiscoveryClient::new(
        "127.0.0.1:0".parse().unwrap(),
        device.udp_addr(),
        &CompiledProfile::default(),
        Duration::from_millis(200),
    );
    let found = client.discover().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].reply.name, "X");
    assert_eq!(found[0].reply.serial, 42);
    assert_eq!(found[0].control_addr(), device.tcp_addr());
}
