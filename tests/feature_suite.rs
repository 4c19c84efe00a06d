use std::sync::Arc;
use std::time::Duration;

use lumictl::e2e_common::{DeviceLog, DeviceScript, FakeDevice};
use lumictl::handshake::{sign, signing_key, HandshakeError};
use lumictl::messages::SceneTrigger;
use lumictl::session::Busy;
use lumictl::{
    AuthState, Category, ClientError, Codec, CompiledProfile, Controller, Request, Rgb,
    TriggerCommand, ZoneState,
};
use tokio::time::{sleep, timeout};

async fn eventually(device: &FakeDevice, check: impl Fn(&DeviceLog) -> bool) -> DeviceLog {
    timeout(Duration::from_secs(2), async {
        loop {
            let log = device.log();
            if check(&log) {
                return log;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fake device never reached the expected state")
}

#[test]
fn signature_is_deterministic_and_matches_reference() {
    let codec = Codec::new(&CompiledProfile::default());
    let message = codec.signing_message(7, "admin", &[0u8; 32]).unwrap();
    let key = signing_key(b"lumictl-protocol-base", "secret");
    let signature = sign(&key, &message).unwrap();
    assert_eq!(
        signature[..8],
        [0xea, 0x6d, 0x2c, 0x92, 0x12, 0x8e, 0xc9, 0x45]
    );
    assert_eq!(signature, sign(&key, &message).unwrap());
}

#[tokio::test]
async fn nonzero_auth_result_is_surfaced_with_its_code() {
    let mut script = DeviceScript::reference();
    script.auth.result = 0x0000_0005;
    let device = FakeDevice::spawn(script).await.unwrap();
    let mut controller = Controller::new(device.config()).unwrap();
    controller.start().await.unwrap();

    let err = controller.authenticate().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Handshake(HandshakeError::AuthFailed(5))
    ));
    assert_eq!(controller.auth_state(), AuthState::Failed(5));
    assert!(controller.is_started());
    assert!(controller.pending().is_empty());
    controller.stop().await;
}

#[tokio::test]
async fn rejected_salt_aborts_before_auth() {
    let mut script = DeviceScript::reference();
    script.salt.status = 2;
    let device = FakeDevice::spawn(script).await.unwrap();
    let mut controller = Controller::new(device.config()).unwrap();
    controller.start().await.unwrap();

    let err = controller.poll().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Handshake(HandshakeError::SaltRejected(2))
    ));
    assert_eq!(controller.auth_state(), AuthState::Idle);
    let log = device.log();
    assert!(!log.requests.iter().any(|r| matches!(r, Request::Auth(_))));
    assert!(!log.requests.iter().any(|r| matches!(r, Request::Poll(_))));
    controller.stop().await;
}

#[tokio::test]
async fn missing_password_skips_the_handshake() {
    let device = FakeDevice::spawn(DeviceScript::reference()).await.unwrap();
    let mut config = device.config();
    config.password = None;
    let mut controller = Controller::new(config).unwrap();
    controller.start().await.unwrap();

    controller.poll().await.unwrap();
    let log = eventually(&device, |log| !log.requests.is_empty()).await;
    assert!(matches!(log.requests[0], Request::Poll(_)));
    assert!(!log.requests.iter().any(|r| matches!(r, Request::Salt(_))));
    assert_eq!(controller.auth_state(), AuthState::Idle);
    controller.stop().await;
}

#[tokio::test]
async fn second_file_request_is_busy_and_writes_nothing() {
    // no script entry for "slow.bin": the device never answers
    let device = FakeDevice::spawn(DeviceScript::reference()).await.unwrap();
    let mut controller = Controller::new(device.config()).unwrap();
    controller.start().await.unwrap();
    controller.authenticate().await.unwrap();
    let controller = Arc::new(controller);

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.fetch_file("slow.bin").await })
    };
    let before = eventually(&device, |log| {
        log.requests.iter().any(|r| matches!(r, Request::File(_)))
    })
    .await;
    assert_eq!(controller.pending(), vec![Category::File]);

    let err = controller.fetch_file("names.xml").await.unwrap_err();
    assert!(matches!(err, ClientError::Busy(Busy(Category::File))));
    sleep(Duration::from_millis(50)).await;
    assert_eq!(device.log().stream_bytes, before.stream_bytes);

    first.abort();
}

#[tokio::test]
async fn secondary_triggers_reuse_the_running_scene() {
    let script = DeviceScript::reference().with_zone(
        2,
        ZoneState {
            running_scene: Some(7),
            ..ZoneState::default()
        },
    );
    let device = FakeDevice::spawn(script).await.unwrap();
    let mut controller = Controller::new(device.config()).unwrap();
    controller.start().await.unwrap();

    controller.query_zone(2).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while controller.zone(2).is_none() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    controller.set_brightness(2, 500).await.unwrap();
    controller.set_rgb(2, Rgb::new(255, 0, 64)).await.unwrap();
    let log = eventually(&device, |log| log.datagrams.len() == 2).await;
    assert_eq!(
        log.datagrams[0],
        Request::SceneTrigger(SceneTrigger {
            scene: 7,
            zone_sync_id: 2,
            command: TriggerCommand::SetDimmer,
            dimmer: Some(500),
            speed: None,
            color: None,
        })
    );
    assert_eq!(
        log.datagrams[1],
        Request::SceneTrigger(SceneTrigger {
            scene: 7,
            zone_sync_id: 2,
            command: TriggerCommand::SetColor,
            dimmer: None,
            speed: None,
            color: Some(Rgb::new(255, 0, 64)),
        })
    );
    assert!(matches!(
        controller.set_speed(9, 10).await,
        Err(ClientError::UnknownZone(9))
    ));
    controller.stop().await;
}
