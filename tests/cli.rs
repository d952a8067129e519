use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn strokeboard_cmd(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("strokeboard").expect("binary exists");
    cmd.env("XDG_CONFIG_HOME", config_home.path());
    cmd
}

#[test]
fn strokeboard_help_prints_usage() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Infinite-canvas ink engine with incremental GPU rendering",
        ));
}

#[test]
fn no_action_prints_quick_usage() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .assert()
        .success()
        .stdout(predicate::str::contains("--init-config"));
}

#[test]
fn demo_document_is_saved_and_summarised() {
    let temp = TempDir::new().unwrap();
    let document = temp.path().join("board.json");

    strokeboard_cmd(&temp)
        .arg("--document")
        .arg(&document)
        .arg("--demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Drew 4 demo strokes"));
    assert!(document.exists());

    strokeboard_cmd(&temp)
        .arg("--document")
        .arg(&document)
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("elements: 4"))
        .stdout(predicate::str::contains("erasers: 1"));
}

#[test]
fn stats_of_a_missing_document_are_empty() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .arg("--document")
        .arg(temp.path().join("new.json"))
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("bounds: empty"));
}

#[test]
fn corrupt_document_fails_to_load() {
    let temp = TempDir::new().unwrap();
    let document = temp.path().join("broken.json");
    std::fs::write(&document, "{ not json").unwrap();

    strokeboard_cmd(&temp)
        .arg("--document")
        .arg(&document)
        .arg("--stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load document"));
}

#[test]
fn preview_of_an_empty_document_fails() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .arg("--preview")
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to preview"));
}

#[cfg(not(feature = "png"))]
#[test]
fn preview_requires_png_feature() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .args(["--demo", "--preview"])
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--features png"));
}

#[cfg(feature = "png")]
#[test]
fn preview_is_written_as_png() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out.png");
    strokeboard_cmd(&temp)
        .args(["--demo", "--preview"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("preview to"));
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[test]
fn init_config_writes_once() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("strokeboard").join("config.toml");

    strokeboard_cmd(&temp)
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(config.exists());

    strokeboard_cmd(&temp)
        .arg("--init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn init_config_conflicts_with_actions() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .args(["--init-config", "--stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bad.toml");
    std::fs::write(&config, "[render\n").unwrap();

    strokeboard_cmd(&temp)
        .arg("--config")
        .arg(&config)
        .arg("--stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}

#[test]
fn schema_dump_lists_sections() {
    Command::cargo_bin("dump_config_schema")
        .expect("binary exists")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"persistence\""))
        .stdout(predicate::str::contains("\"grid_mode\""));
}

#[test]
fn version_reports_the_package_version() {
    let temp = TempDir::new().unwrap();
    strokeboard_cmd(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
