use assert_cmd::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let sd = dir.path().join("sd");
    fs::create_dir_all(&sd).unwrap();
    fs::write(
        dir.path().join("fil.pal"),
        "[loaded]\nfila_id = \"PLA-1\"\n\n[PLA-1]\nhotend_current_temp = 205\n",
    )
    .unwrap();
    let toml = format!(
        "[paths]\nparams_file = \"{}\"\nsdcard_dir = \"{}\"\n\n[parse_commands]\nM104 = true\n",
        dir.path().join("fil.pal").display(),
        sd.display()
    );
    let path = dir.path().join("filpal.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON: {l}: {e}")))
        .collect()
}

/// Every stdout line of a JSON run is an event object; the last one is the summary.
#[test]
fn jsonl_exec_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("filpal")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["exec", "FILPAL_SWAP", "FILPAL_UPDATER PARAM=fan_min VALUE=40"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let events = json_lines(&out.stdout);
    for e in &events {
        assert!(e["event"].is_string(), "{e}");
    }
    assert!(events.iter().any(|e| e["event"] == "script" && e["text"] == "G1 F1000 E-500"));
    assert!(events.iter().any(|e| e["event"] == "respond" && e["text"] == "Filament unloaded"));

    let done = events.last().unwrap();
    assert_eq!(done["event"], "done");
    assert_eq!(done["loaded"], "PLA-1");
    assert_eq!(done["swap_state"], "idle");
    let heaters = done["heaters"].as_array().unwrap();
    let extruder = heaters.iter().find(|h| h["name"] == "extruder").unwrap();
    assert_eq!(extruder["control"], "pid");
    assert_eq!(extruder["target"], 205.0);
}

/// Errors in JSON mode are a single object on stderr with a stable reason.
#[test]
fn jsonl_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("filpal")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["exec", "FILPAL_CALIBRATE TEST=nope"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "UnknownTest");
    assert_eq!(v["code"], 5);
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[test]
fn json_fit_output() {
    let out = Command::cargo_bin("filpal")
        .unwrap()
        .args(["--json", "fit", "--observed", "200,220", "--commanded", "190,210"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v = &json_lines(&out.stdout)[0];
    assert_eq!(v["degree"], 1);
    assert!((v["c0"].as_f64().unwrap() - 10.0).abs() < 1e-9);
    assert!((v["c1"].as_f64().unwrap() - 1.0).abs() < 1e-9);
}
