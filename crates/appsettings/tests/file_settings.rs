use std::{sync::Arc, thread, time::Duration};

use appsettings::{AppSettings, CancellationToken, Json, SettingsError};
use appsettings_storage::{AesCipher, SettingsFileStore, SymmetricKeyPair};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Theme {
    Light,
    Dark,
}

fn file_settings(dir: &TempDir) -> (AppSettings, Arc<SettingsFileStore>) {
    let store = Arc::new(
        SettingsFileStore::new(dir.path().join("settings.bin"))
            .with_key_pair(AesCipher::generate_key_pair()),
    );
    (AppSettings::new(store.clone()), store)
}

#[test]
fn no_provider_reads_absent_and_writes_report_false() {
    let settings = AppSettings::unconfigured();
    assert_eq!(settings.get::<bool>("x", false).expect("get"), None);
    assert!(!settings.set("x", &true, false).expect("set"));
    assert_eq!(settings.get::<bool>("x", false).expect("get"), None);
}

#[test]
fn plain_string_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, _) = file_settings(&dir);

    assert!(settings
        .set("greeting", &"hello".to_string(), false)
        .expect("set"));
    assert_eq!(
        settings.get::<String>("greeting", false).expect("get"),
        Some("hello".to_string())
    );
    assert_eq!(settings.get::<String>("other", false).expect("get"), None);
}

#[test]
fn encrypted_secret_survives_until_clear() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, store) = file_settings(&dir);

    settings
        .set("secret", &"s3cr3t".to_string(), true)
        .expect("set");
    assert_eq!(
        settings.get::<String>("secret", true).expect("get"),
        Some("s3cr3t".to_string())
    );

    assert!(settings.clear().expect("clear"));
    assert!(!store.path().exists());
    assert_eq!(settings.get::<String>("secret", true).expect("get"), None);
}

#[test]
fn generated_key_pairs_are_distinct() {
    let first = AesCipher::generate_key_pair();
    let second = AesCipher::generate_key_pair();

    assert_eq!(first.key().len(), 32);
    assert_eq!(first.iv().len(), 16);
    assert_ne!(first.key(), second.key());
    assert_ne!(first.iv(), second.iv());
}

#[test]
fn every_supported_type_round_trips_plain_and_encrypted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, _) = file_settings(&dir);
    let stamp = Utc
        .with_ymd_and_hms(2024, 2, 29, 23, 59, 58)
        .single()
        .expect("valid timestamp");
    let price: Decimal = "1234.5678".parse().expect("decimal");

    for encrypted in [false, true] {
        settings.set("bool", &true, encrypted).expect("bool");
        settings.set("byte", &200u8, encrypted).expect("u8");
        settings
            .set("bytes", &vec![0u8, 1, 254, 255], encrypted)
            .expect("bytes");
        settings.set("stamp", &stamp, encrypted).expect("datetime");
        settings.set("price", &price, encrypted).expect("decimal");
        settings.set("ratio", &0.25f64, encrypted).expect("f64");
        settings.set("scale", &1.5f32, encrypted).expect("f32");
        settings.set("small", &-12i16, encrypted).expect("i16");
        settings.set("medium", &i32::MIN, encrypted).expect("i32");
        settings.set("large", &i64::MAX, encrypted).expect("i64");
        settings
            .set("name", &"Zoë \"quoted\"".to_string(), encrypted)
            .expect("string");
        settings
            .set("theme", &Json(Theme::Dark), encrypted)
            .expect("enum");

        assert_eq!(settings.get("bool", encrypted).expect("bool"), Some(true));
        assert_eq!(settings.get("byte", encrypted).expect("u8"), Some(200u8));
        assert_eq!(
            settings.get::<Vec<u8>>("bytes", encrypted).expect("bytes"),
            Some(vec![0, 1, 254, 255])
        );
        assert_eq!(settings.get("stamp", encrypted).expect("datetime"), Some(stamp));
        assert_eq!(settings.get("price", encrypted).expect("decimal"), Some(price));
        assert_eq!(settings.get("ratio", encrypted).expect("f64"), Some(0.25f64));
        assert_eq!(settings.get("scale", encrypted).expect("f32"), Some(1.5f32));
        assert_eq!(settings.get("small", encrypted).expect("i16"), Some(-12i16));
        assert_eq!(settings.get("medium", encrypted).expect("i32"), Some(i32::MIN));
        assert_eq!(settings.get("large", encrypted).expect("i64"), Some(i64::MAX));
        assert_eq!(
            settings.get::<String>("name", encrypted).expect("string"),
            Some("Zoë \"quoted\"".to_string())
        );
        assert_eq!(
            settings.get_object("theme", Theme::Light, encrypted),
            Theme::Dark
        );
    }
}

#[test]
fn non_finite_floats_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, _) = file_settings(&dir);

    settings.set("nan", &f64::NAN, false).expect("nan");
    settings.set("inf", &f32::INFINITY, true).expect("inf");

    let nan: f64 = settings.get_or("nan", 0.0, false).expect("nan");
    assert!(nan.is_nan());
    assert_eq!(
        settings.get::<f32>("inf", true).expect("inf"),
        Some(f32::INFINITY)
    );
}

#[test]
fn defaults_fill_in_for_absent_values_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, _) = file_settings(&dir);

    assert_eq!(settings.get_or("retries", 3i32, false).expect("absent"), 3);
    settings.set("retries", &0i32, false).expect("set");
    assert_eq!(settings.get_or("retries", 3i32, false).expect("present"), 0);
}

#[test]
fn empty_key_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, _) = file_settings(&dir);

    assert_eq!(
        settings.set("", &1i32, false),
        Err(SettingsError::Validation {
            reason: "settings key must not be null or empty".into()
        })
    );
    assert!(matches!(
        settings.get::<i32>("", true),
        Err(SettingsError::Validation { .. })
    ));
}

#[test]
fn encrypted_write_without_key_pair_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = AppSettings::new(Arc::new(SettingsFileStore::new(
        dir.path().join("settings.bin"),
    )));

    assert!(matches!(
        settings.set("secret", &"x".to_string(), true),
        Err(SettingsError::Validation { .. })
    ));
    assert!(settings.set("plain", &"x".to_string(), false).expect("plain"));
}

#[test]
fn values_persist_across_store_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pair = SymmetricKeyPair::generate();
    let path = dir.path().join("settings.bin");

    let writer = AppSettings::new(Arc::new(
        SettingsFileStore::new(&path).with_key_pair(pair.clone()),
    ));
    writer.set("token", &"abc".to_string(), true).expect("set");
    writer.set("count", &9i64, false).expect("set");

    let reader = AppSettings::new(Arc::new(SettingsFileStore::new(&path).with_key_pair(pair)));
    assert_eq!(
        reader.get::<String>("token", true).expect("token"),
        Some("abc".to_string())
    );
    assert_eq!(reader.get::<i64>("count", false).expect("count"), Some(9));

    let stranger = AppSettings::new(Arc::new(
        SettingsFileStore::new(&path).with_key_pair(SymmetricKeyPair::generate()),
    ));
    assert_eq!(stranger.get_lenient("token", "fallback".to_string(), true), "fallback");
}

#[test]
fn stale_cache_is_reloaded_after_ttl() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.bin");
    let ttl = Duration::from_millis(200);

    let observer = AppSettings::new(Arc::new(
        SettingsFileStore::new(&path).with_cache_ttl(ttl),
    ));
    let writer = AppSettings::new(Arc::new(SettingsFileStore::new(&path)));

    writer.set("mode", &"a".to_string(), false).expect("first");
    assert_eq!(
        observer.get::<String>("mode", false).expect("cached"),
        Some("a".to_string())
    );

    writer.set("mode", &"b".to_string(), false).expect("second");
    assert_eq!(
        observer.get::<String>("mode", false).expect("still cached"),
        Some("a".to_string())
    );

    thread::sleep(ttl + Duration::from_millis(50));
    assert_eq!(
        observer.get::<String>("mode", false).expect("reloaded"),
        Some("b".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_async_writers_all_land() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, store) = file_settings(&dir);
    let settings = Arc::new(settings);
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for i in 0..24i32 {
        let settings = settings.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            settings
                .set_async(&format!("key-{i}"), i, i % 2 == 0, &cancel)
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.expect("join").expect("set"));
    }

    store.invalidate().expect("invalidate");
    assert_eq!(store.keys().expect("keys").len(), 24);
    for i in 0..24i32 {
        assert_eq!(
            settings
                .get_async::<i32>(&format!("key-{i}"), i % 2 == 0, &cancel)
                .await
                .expect("get"),
            Some(i)
        );
    }
}

#[tokio::test]
async fn cancelled_async_write_leaves_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (settings, store) = file_settings(&dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(
        settings
            .set_async("late", "value".to_string(), true, &cancel)
            .await,
        Err(SettingsError::Cancelled)
    );
    assert_eq!(
        settings.clear_async(&cancel).await,
        Err(SettingsError::Cancelled)
    );
    assert!(!store.path().exists());
}
