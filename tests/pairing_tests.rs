use ebeco_connect::{Credentials, EbecoClient, Error, PairingSession, Regulator};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer) -> PairingSession {
    let uri = server.uri();
    PairingSession::with_builder(move |credentials| EbecoClient::builder(credentials).base_url(uri.clone()))
}

#[tokio::test]
async fn pairs_a_cloud_device() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/TokenAuth/Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "accessToken": "tok", "expireInSeconds": 86400 },
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/services/app/Devices/GetUserDevices"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "id": 11,
                "displayName": "Hallway",
                "powerOn": true,
                "temperatureSet": "20",
                "temperatureFloor": 21.0,
                "temperatureRoom": 19.5,
                "relayOn": true,
                "installedEffect": 300,
                "todaysOnMinutes": 15
            }],
            "success": true
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    session
        .login(Credentials::new("user@example.com", "hunter2"))
        .await
        .unwrap();
    let devices = session.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Hallway");
    assert_eq!(devices[0].settings.regulator, Regulator::Floor);

    session.select_device(11).unwrap();
    let paired = session.select_regulator(Regulator::Room).unwrap();
    assert_eq!(paired.data.id, 11);
    assert_eq!(paired.settings.regulator, Regulator::Room);
    assert_eq!(paired.settings.interval, 30);
    assert!(session.client().is_some());
}

#[tokio::test]
async fn wrong_password_stays_at_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/TokenAuth/Authenticate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let err = session
        .login(Credentials::new("user@example.com", "bad"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(session.client().is_none());
    assert!(matches!(session.list_devices().await, Err(Error::Pairing(_))));
}
