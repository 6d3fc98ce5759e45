use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patchbot"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "patchbot init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".patchbot.toml");
    assert!(config_path.exists(), ".patchbot.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[llm]"));
    assert!(content.contains("[filter]"));

    let config: patchbot_core::PatchbotConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.filter.include, vec!["**/*"]);
    assert_eq!(config.filter.exclude, patchbot_core::ExcludeSpec::Nothing);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".patchbot.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patchbot"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".patchbot.toml")).unwrap();
    assert_eq!(content, "# existing");
}
