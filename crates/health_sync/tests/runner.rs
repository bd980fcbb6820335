use std::path::Path;

use health_sync::runner::yesterday;
use health_sync::settings::{GcsSettings, TwitterSettings};
use health_sync::storage::{GcsObjectStore, LocalObjectStore};
use health_sync::{Clients, RunSettings, Runner};
use health_sync_client::config::ClientConfig;
use health_sync_client::{Credential, CredentialStore, MemoryCredentialStore};
use secrecy::{ExposeSecret, SecretString};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRACE_PATHS: &str = r"^/1\.2/user/-/(activities|foods/log|sleep)/date/\d{4}-\d{2}-\d{2}\.json$";

fn settings(server: &MockServer, data_dir: &Path, cross_post: bool, twitter: bool) -> RunSettings {
    RunSettings {
        client: ClientConfig::with_base_url(&server.uri()),
        credentials_path: data_dir.join("credentials.toml"),
        data_dir: data_dir.to_path_buf(),
        gcs: None,
        cross_post,
        twitter: twitter.then(|| TwitterSettings {
            user_id: "12345".into(),
            hashtag: "RingFitAdventure".into(),
        }),
    }
}

fn credentials() -> MemoryCredentialStore {
    MemoryCredentialStore::new()
        .with_section("health_planet", Credential::bearer("hp-token"))
        .with_section(
            "fitbit",
            Credential::new("client", "secret", "old-access", "old-refresh"),
        )
        .with_section("twitter", Credential::bearer("tw-token"))
}

async fn mount_body_composition(server: &MockServer, compact_day: &str) {
    Mock::given(method("GET"))
        .and(path("/status/innerscan.json/"))
        .and(query_param("access_token", "hp-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"date": format!("{compact_day}0730"), "keydata": "65.20", "model": "01000117", "tag": "6021"},
                {"date": format!("{compact_day}0730"), "keydata": "18.40", "model": "01000117", "tag": "6022"}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_traces(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path_regex(TRACE_PATHS))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"summary": {}})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_exports_every_provider() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, dir.path(), true, true);
    let day = yesterday(settings.client.timezone);
    let day_str = day.format("%Y-%m-%d").to_string();

    mount_body_composition(&server, &day.format("%Y%m%d").to_string()).await;
    mount_traces(&server, "old-access", 3).await;
    Mock::given(method("POST"))
        .and(path("/1/user/-/body/log/weight.json"))
        .and(body_string_contains("weight=65.2"))
        .and(body_string_contains("time=07%3A30%3A00"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"weightLog": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/user/-/body/log/fat.json"))
        .and(body_string_contains("fat=18.4"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"fatLog": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(header("authorization", "Bearer tw-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "includes": {"media": [{"media_key": "3_1", "url": format!("{}/media/AAA.jpg", server.uri())}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/AAA.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials();
    let objects = LocalObjectStore::new(dir.path());
    let clients = Clients::from_store(&settings, &store).expect("clients");
    let mut runner = Runner::new(&settings, clients, &store, &objects);
    let report = runner.run(day).await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    let expected = [
        format!("health_planet/{day_str}.json"),
        format!("fitbit/activities/{day_str}.json"),
        format!("fitbit/foods/{day_str}.json"),
        format!("fitbit/sleep/{day_str}.json"),
        format!("ring_fit_adventure/{day_str}_AAA.jpg"),
    ];
    for key in &expected {
        assert!(report.written.contains(key), "{key} not written");
        assert!(dir.path().join(key).exists(), "{key} missing on disk");
    }
    let body: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join(&expected[0])).unwrap(),
    )
    .unwrap();
    assert_eq!(body["data"][0]["keydata"], "65.20");
    assert_eq!(
        std::fs::read(dir.path().join(&expected[4])).unwrap(),
        vec![1u8, 2, 3]
    );
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn empty_body_composition_skips_cross_post() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, dir.path(), true, false);
    let day = yesterday(settings.client.timezone);

    Mock::given(method("GET"))
        .and(path("/status/innerscan.json/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    mount_traces(&server, "old-access", 3).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/1/user/-/body/log/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = credentials();
    let objects = LocalObjectStore::new(dir.path());
    let clients = Clients::from_store(&settings, &store).expect("clients");
    let report = Runner::new(&settings, clients, &store, &objects).run(day).await;

    assert!(report.is_success());
    assert_eq!(report.written.len(), 3);
    assert!(!dir.path().join("health_planet").exists());
}

#[tokio::test]
async fn expired_tracker_token_is_refreshed_once_for_the_whole_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, dir.path(), false, false);
    let day = yesterday(settings.client.timezone);

    mount_body_composition(&server, &day.format("%Y%m%d").to_string()).await;
    Mock::given(method("GET"))
        .and(path_regex(TRACE_PATHS))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_traces(&server, "new-access", 3).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials();
    let objects = LocalObjectStore::new(dir.path());
    let clients = Clients::from_store(&settings, &store).expect("clients");
    let mut runner = Runner::new(&settings, clients, &store, &objects);
    let report = runner.run(day).await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.written.len(), 4);
    assert_eq!(store.save_count(), 1);
    let saved = store.load("fitbit").unwrap();
    assert_eq!(saved.access_token.expose_secret(), "new-access");
    assert_eq!(saved.refresh_token.expose_secret(), "new-refresh");
}

#[tokio::test]
async fn failing_step_is_reported_and_run_continues() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, dir.path(), false, false);
    let day = yesterday(settings.client.timezone);
    let day_str = day.format("%Y-%m-%d").to_string();

    Mock::given(method("GET"))
        .and(path("/status/innerscan.json/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/1.2/user/-/sleep/date/{day_str}.json")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_traces(&server, "old-access", 2).await;

    let store = credentials();
    let objects = LocalObjectStore::new(dir.path());
    let clients = Clients::from_store(&settings, &store).expect("clients");
    let report = Runner::new(&settings, clients, &store, &objects).run(day).await;

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].starts_with("health_planet"));
    assert!(report.failures[1].starts_with("fitbit/sleep"));
    assert_eq!(report.written.len(), 2);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn remote_store_receives_objects_and_local_copies_are_removed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(&server, dir.path(), false, false);
    settings.gcs = Some(GcsSettings {
        bucket: "export_from_devices".into(),
        token: SecretString::from("gcs-token"),
        base_url: server.uri(),
    });
    let day = yesterday(settings.client.timezone);
    let day_str = day.format("%Y-%m-%d").to_string();

    mount_body_composition(&server, &day.format("%Y%m%d").to_string()).await;
    mount_traces(&server, "old-access", 3).await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/export_from_devices/o"))
        .and(header("authorization", "Bearer gcs-token"))
        .and(query_param("uploadType", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(4)
        .mount(&server)
        .await;

    let store = credentials();
    let gcs = settings.gcs.as_ref().unwrap();
    let objects = GcsObjectStore::new(gcs, settings.client.timeout).expect("gcs");
    let clients = Clients::from_store(&settings, &store).expect("clients");
    let report = Runner::new(&settings, clients, &store, &objects).run(day).await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert!(!dir.path().join(format!("health_planet/{day_str}.json")).exists());

    let names: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/upload/"))
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "name")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert!(names.contains(&format!("health_planet/{day_str}.json")));
    assert!(names.contains(&format!("fitbit/foods/{day_str}.json")));
}

#[test]
fn missing_credential_section_fails_client_setup() {
    let dir = tempfile::tempdir().unwrap();
    let settings = RunSettings {
        client: ClientConfig::default(),
        credentials_path: dir.path().join("credentials.toml"),
        data_dir: dir.path().to_path_buf(),
        gcs: None,
        cross_post: false,
        twitter: None,
    };
    let store = MemoryCredentialStore::new().with_section("fitbit", Credential::bearer("x"));
    assert!(Clients::from_store(&settings, &store).is_err());
}
