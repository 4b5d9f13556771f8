//! End-to-end push scenarios: a bootstrapped station, real WebSocket
//! clients and real control datagrams.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{Local, NaiveTime, Utc};
use futures::StreamExt;
use onair_core::playlist::{EventKind, PlaylistEvent, Show, Spin};
use onair_core::{api, bootstrap_services, send_raw, start_server, BootstrappedServices, Config};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Station {
    services: BootstrappedServices,
    port: u16,
}

impl Station {
    async fn start() -> Self {
        let config = Config {
            bind_port: 0,
            control_port: 0,
            ..Config::default()
        };
        let services = bootstrap_services(&config).unwrap();
        let listener = api::bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        services.start_background_tasks();
        tokio::spawn(start_server(
            services.app_state(),
            listener,
            services.cancel_token.clone(),
        ));
        Self { services, port }
    }

    async fn connect(&self) -> Client {
        let url = format!("ws://127.0.0.1:{}/push/onair", self.port);
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    fn control_addr(&self) -> SocketAddr {
        self.services.control_addr()
    }

    /// Puts an all-day show on the air with one spin that aired a second ago.
    fn air_spin(&self, id: u64, artist: &str, tag: Option<u64>) {
        let now = Utc::now();
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let show = Show {
            id: 12,
            name: "Afternoon Delight".into(),
            airname: Some("DJ Marlowe".into()),
            date: now.with_timezone(&Local).date_naive(),
            start: midnight,
            end: midnight,
        };
        let spin = PlaylistEvent {
            id,
            created: Some(now - chrono::Duration::seconds(1)),
            kind: EventKind::Spin(Spin {
                artist: artist.into(),
                album: "Songs".into(),
                label: "Label".into(),
                track: "Opening".into(),
                tag,
            }),
        };
        self.services.playlist.insert_show(show, vec![spin]);
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.services.shutdown();
    }
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let frame = tokio::time::timeout(Duration::from_millis(500), client.next()).await;
    assert!(frame.is_err(), "unexpected frame: {:?}", frame);
}

#[tokio::test]
async fn first_client_with_nothing_on_air_gets_none_snapshot() {
    let station = Station::start().await;
    let mut client = station.connect().await;

    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["event"], "none");
    assert_eq!(snapshot["show_id"], 0);
    assert_eq!(snapshot["id"], 0);
    assert_eq!(snapshot["type"], "zookeeper");
    assert!(snapshot["track_tag"].is_null());
}

#[tokio::test]
async fn swapped_artist_is_broadcast_in_display_form() {
    let station = Station::start().await;
    station.air_spin(77, "Smith, John", Some(1001));
    let mut client = station.connect().await;

    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["event"], "track");
    assert_eq!(snapshot["id"], 77);
    assert_eq!(snapshot["show_id"], 12);
    assert_eq!(snapshot["airname"], "DJ Marlowe");
    assert_eq!(snapshot["track_artist"], "John Smith");
    assert_eq!(snapshot["track_tag"], 1001);
    // No provider configured.
    assert_eq!(snapshot["image_url"], "");
    assert_eq!(snapshot["info_url"], "");
}

#[tokio::test]
async fn control_poll_broadcasts_changes_once() {
    let station = Station::start().await;
    let mut first = station.connect().await;
    assert_eq!(next_json(&mut first).await["event"], "none");

    station.air_spin(5, "Stereolab", None);
    send_raw(station.control_addr(), "").await.unwrap();
    let snapshot = next_json(&mut first).await;
    assert_eq!(snapshot["id"], 5);
    assert_eq!(snapshot["track_artist"], "Stereolab");

    // Nothing changed, so a second poll stays quiet.
    send_raw(station.control_addr(), "").await.unwrap();
    assert_silent(&mut first).await;

    // Late joiners get the current snapshot straight away.
    let mut second = station.connect().await;
    assert_eq!(next_json(&mut second).await["id"], 5);
    assert_silent(&mut first).await;
}

#[tokio::test]
async fn control_snapshot_reaches_every_client() {
    let station = Station::start().await;
    let mut first = station.connect().await;
    let mut second = station.connect().await;
    next_json(&mut first).await;
    next_json(&mut second).await;

    send_raw(station.control_addr(), "garbage").await.unwrap();
    send_raw(
        station.control_addr(),
        r#"{"name":"Station Break","show_id":9,"event":"show"}"#,
    )
    .await
    .unwrap();

    for client in [&mut first, &mut second] {
        let snapshot = next_json(client).await;
        assert_eq!(snapshot["name"], "Station Break");
        assert_eq!(snapshot["show_id"], 9);
        assert_eq!(snapshot["event"], "show");
    }
}

#[tokio::test]
async fn health_counts_connected_clients() {
    let station = Station::start().await;
    let mut client = station.connect().await;
    next_json(&mut client).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", station.port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "onair");
    assert_eq!(body["clients"], 1);
}
