use std::path::Path;
use std::process::Command;

fn imgsync(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("imgsync"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("IMGSYNC_CONFIG")
        .env_remove("IMGSYNC_ENV_FILE")
        .env_remove("PEXELS_API_KEY")
        .env_remove("GOOGLE_CSE_API_KEY")
        .env_remove("GOOGLE_CSE_CX")
        // Nothing listens here; any provider call fails fast instead of leaving the machine.
        .env("IMGSYNC_ARASAAC_ENDPOINT", "http://127.0.0.1:9/search")
        .env("IMGSYNC_WIKIMEDIA_ENDPOINT", "http://127.0.0.1:9/w/api.php")
        .env("RUST_LOG", "error");
    cmd
}

fn write_dataset(root: &Path, body: &str) -> std::path::PathBuf {
    let p = root.join("assets").join("data").join("lectoescritura_dataset.json");
    std::fs::create_dir_all(p.parent().unwrap()).unwrap();
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn missing_dataset_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let out = imgsync(tmp.path())
        .args(["sync", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("dataset not found"));
}

#[test]
fn dataset_without_items_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    write_dataset(tmp.path(), r#"{"entries": []}"#);
    let out = imgsync(tmp.path())
        .args(["sync", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("items"));
}

#[test]
fn entries_with_working_assets_are_skipped_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let body = r#"{"items": [{"id": "mesa_01", "word": "MESA", "category": "COSAS DE CASA", "level": 1, "imageAsset": "assets/images/cosas_de_casa/mesa_01.jpg"}]}"#;
    let dataset = write_dataset(tmp.path(), body);
    let asset = tmp.path().join("assets/images/cosas_de_casa/mesa_01.jpg");
    std::fs::create_dir_all(asset.parent().unwrap()).unwrap();
    std::fs::write(&asset, b"jpg").unwrap();

    let out = imgsync(tmp.path())
        .args(["--output", "json", "sync", "--providers", "arasaac,wikimedia", "--sleep-ms", "0", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["kind"].as_str(), Some("sync"));
    let s = &v["summary"];
    assert_eq!(
        (s["updated"].as_u64(), s["skipped"].as_u64(), s["failed"].as_u64()),
        (Some(0), Some(1), Some(0))
    );

    let after: serde_json::Value = serde_json::from_slice(&std::fs::read(&dataset).unwrap()).unwrap();
    assert_eq!(
        after["items"][0]["imageAsset"].as_str(),
        Some("assets/images/cosas_de_casa/mesa_01.jpg")
    );
    assert_eq!(std::fs::read(&asset).unwrap(), b"jpg");
}

#[test]
fn unreachable_providers_fail_the_entry_not_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let body = r#"{"items": [{"id": "sol_01", "word": "SOL", "category": "NATURALEZA", "level": 1}]}"#;
    let dataset = write_dataset(tmp.path(), body);
    let before = std::fs::read_to_string(&dataset).unwrap();

    let out = imgsync(tmp.path())
        .args(["sync", "--providers", "arasaac,wikimedia", "--sleep-ms", "0", "--timeout-ms", "2000", "--root"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("- updated: 0"));
    assert!(stdout.contains("- failed: 1"));

    // The final flush rewrites the file, but the entry keeps no asset.
    let after: serde_json::Value = serde_json::from_slice(&std::fs::read(&dataset).unwrap()).unwrap();
    let before: serde_json::Value = serde_json::from_str(&before).unwrap();
    assert_eq!(after, before);
}
