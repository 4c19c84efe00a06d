use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use lumictl::e2e_common::{DeviceScript, FakeDevice};
use lumictl::{AuthState, ClientError, Controller, Request, TransferError, ZoneState};
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn initialize_mirrors_identity_and_authenticates() -> Result<(), Box<dyn Error>> {
    let device = FakeDevice::spawn(DeviceScript::reference()).await?;
    let mut controller = Controller::new(device.config())?;
    controller.start().await?;

    controller.initialize().await?;

    let state = controller.state();
    assert_eq!(state.name.as_deref(), Some("X"));
    assert_eq!(state.firmware_version, Some(3));
    assert_eq!(state.serial, Some(42));
    assert!(state.scenes.is_empty());
    assert!(state.zones.is_empty());
    assert_eq!(controller.auth_state(), AuthState::Authenticated);
    assert!(controller.pending().is_empty());

    let log = device.log();
    let salts = log
        .requests
        .iter()
        .filter(|r| matches!(r, Request::Salt(_)))
        .count();
    assert_eq!(salts, 1);
    let files: Vec<bool> = log
        .requests
        .iter()
        .filter_map(|r| match r {
            Request::File(req) => Some(req.first),
            _ => None,
        })
        .collect();
    assert_eq!(files, vec![true, false]);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn initialize_queries_every_named_zone() -> Result<(), Box<dyn Error>> {
    let names: &[u8] = br#"<root formFactor="wall"><scene id="7" name="Sunset"/><zone id="1" name="Bar"/><zone id="2" name="Lobby"/></root>"#;
    let (head, tail) = names.split_at(40);
    let script = DeviceScript::reference()
        .with_file("names.xml", &[(1, head), (0xFF, tail)])
        .with_zone(
            2,
            ZoneState {
                running_scene: Some(7),
                dimmer: Some(800),
                ..ZoneState::default()
            },
        );
    let device = FakeDevice::spawn(script).await?;
    let mut controller = Controller::new(device.config())?;
    controller.start().await?;

    controller.initialize().await?;

    assert_eq!(
        controller.scene_names().get(&7).map(String::as_str),
        Some("Sunset")
    );
    assert_eq!(controller.zone_names().len(), 2);
    assert_eq!(controller.state().form_factor.as_deref(), Some("wall"));
    assert_eq!(controller.zone(2).and_then(|z| z.dimmer), Some(800));
    // zone 1 is named but the device has no status for it
    assert!(controller.zone(1).is_none());

    let queried: Vec<u16> = device
        .log()
        .requests
        .iter()
        .filter_map(|r| match r {
            Request::ZoneQuery(q) => Some(q.zone_id),
            _ => None,
        })
        .collect();
    assert_eq!(queried, vec![1, 2]);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn reconnect_fails_pending_transfer_and_reauthenticates() -> Result<(), Box<dyn Error>> {
    let device = FakeDevice::spawn(DeviceScript::reference()).await?;
    let mut controller = Controller::new(device.config())?;
    controller.start().await?;
    controller.authenticate().await?;
    let controller = Arc::new(controller);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.fetch_file("never.bin").await })
    };
    timeout(Duration::from_secs(2), async {
        while controller.pending().is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    device.hang_up();

    let result = timeout(Duration::from_secs(2), pending).await??;
    assert!(matches!(
        result,
        Err(ClientError::Transfer(TransferError::Closed))
    ));
    assert_ne!(controller.auth_state(), AuthState::Authenticated);

    // the next command waits out the reconnect and logs in again
    timeout(Duration::from_secs(2), controller.poll()).await??;
    assert_eq!(controller.auth_state(), AuthState::Authenticated);
    assert_eq!(device.log().connections, 2);

    let salts = device
        .log()
        .requests
        .iter()
        .filter(|r| matches!(r, Request::Salt(_)))
        .count();
    assert_eq!(salts, 2);
    Ok(())
}

#[tokio::test]
async fn stop_fails_outstanding_requests_and_rejects_new_ones() -> Result<(), Box<dyn Error>> {
    let device = FakeDevice::spawn(DeviceScript::reference()).await?;
    let mut controller = Controller::new(device.config())?;
    controller.start().await?;
    controller.stop().await;

    assert!(!controller.is_started());
    assert!(matches!(
        controller.poll().await,
        Err(ClientError::NotStarted)
    ));
    assert!(controller.pending().is_empty());
    Ok(())
}
