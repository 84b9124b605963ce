#[test]
fn imgsync_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("imgsync");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("IMGSYNC_ENV_FILE")
        .output()
        .expect("run imgsync version");

    assert!(out.status.success(), "imgsync version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("imgsync"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn imgsync_version_text_output() {
    use assert_cmd::Command;
    use predicates::prelude::*;

    Command::cargo_bin("imgsync")
        .unwrap()
        .args(["--output", "text", "version"])
        .env_remove("IMGSYNC_ENV_FILE")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("imgsync "));
}
