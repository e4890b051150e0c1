use std::{path::PathBuf, process::Command};

fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../packages/lite-client/src/test_utils/fixtures")
        .join(format!("{name}.json"))
}

fn materialize(name: &str, dir: &tempfile::TempDir) -> PathBuf {
    let trace = dir.path().join(format!("{name}.trace.json"));
    let status = Command::new(env!("CARGO_BIN_EXE_lite-verifier"))
        .args(["fixtures", "--scenario"])
        .arg(scenario(name))
        .arg("-o")
        .arg(&trace)
        .status()
        .unwrap();
    assert!(status.success());
    trace
}

#[test]
fn test_verify_rotation_trace() {
    let dir = tempfile::tempdir().unwrap();
    let trace = materialize("validator_rotation", &dir);

    let output = Command::new(env!("CARGO_BIN_EXE_lite-verifier"))
        .args(["verify", "--trace"])
        .arg(&trace)
        .args(["--trusting-period", "3600"])
        .output()
        .unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!output.status.success());
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        [
            "height 2: accepted",
            "height 3: accepted",
            "height 10: rejected (insufficient_voting_power): cannot trust new validator set: \
             signed voting power 0 of 3 does not meet trust level 1/3",
            "height 10: accepted",
        ]
    );
}

#[test]
fn test_verify_uses_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let trace = materialize("adjacent_full_quorum", &dir);
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "trusting_period_secs = 10\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lite-verifier"))
        .args(["verify", "--trace"])
        .arg(&trace)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("height 2: rejected (expired_trusted_header)"));

    let output = Command::new(env!("CARGO_BIN_EXE_lite-verifier"))
        .args(["verify", "--trace"])
        .arg(&trace)
        .arg("--config")
        .arg(&config)
        .args(["--trusting-period", "3600"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "height 2: accepted\n");
}
