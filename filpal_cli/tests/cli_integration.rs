use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const PARAMS: &str = r#"
[loaded]
fila_id = "PLA-1"

[PLA-1]
hotend_current_temp = 210
filament_type = "PLA"

[PLA-1.M104]
S = [210.0]

[PETG-1]
hotend_current_temp = 240
"#;

const TRACE: &str = "; sliced
G28
START_PRINT
M104 S200
G1 X10 Y10
";

// Config, parameter file and SD card in one temp dir
fn write_setup(dir: &Path) -> PathBuf {
    let sd = dir.join("sd");
    fs::create_dir_all(&sd).unwrap();
    fs::write(sd.join("cube.gcode"), TRACE).unwrap();
    fs::write(sd.join("extruder_temp.gcode"), "G28\n").unwrap();
    fs::write(dir.join("fil.pal"), PARAMS).unwrap();
    let toml = format!(
        r#"
[paths]
params_file = "{}"
sdcard_dir = "{}"

[parse_commands]
M104 = true
M140 = false

[heater_commands]
M104 = "extruder"
"#,
        dir.join("fil.pal").display(),
        sd.display()
    );
    let path = dir.join("filpal.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn filpal(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("filpal").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["exec", "FILPAL_UPDATER LOOKUP=1"], 0, "Filament PLA-1:", "stdout")]
#[case(&["show", "--id", "PETG-1"], 0, "hotend_current_temp = 240", "stdout")]
#[case(&["show", "--id", "ABS-9"], 4, "No filament profile named 'ABS-9'", "stderr")]
#[case(&["exec", "FILPAL_CALIBRATE TEST=extruder_tmp"], 5, "What happened", "stderr")]
#[case(&["exec", "FILPAL_CALIBRATE TEST=bed_temp MIN=50 MAX=70"], 5, "No calibration file", "stderr")]
#[case(&["exec", "FILPAL_UPDATER PARAM=fan_mni VALUE=1"], 8, "not recognized", "stderr")]
#[case(&["exec", "FILPAL_LOAD_CONTINUE"], 9, "Command not valid now", "stderr")]
#[case(&["exec"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_setup(dir.path());

    let assert = filpal(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn fit_runs_without_config() {
    let mut cmd = Command::cargo_bin("filpal").unwrap();
    cmd.args(["--config", "/nonexistent/filpal.toml", "fit", "--observed", "210", "--commanded", "200"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("c0=0.000000 c1=1.050000 c2=0.000000"));
}

#[test]
fn fit_reports_unpairable_series() {
    let mut cmd = Command::cargo_bin("filpal").unwrap();
    cmd.args(["fit", "--observed", "1,2", "--commanded", "1,2,3"]);
    cmd.assert().code(7).stderr(predicate::str::contains("cannot fit"));
}

#[test]
fn calibrate_starts_tuning_tower() {
    let dir = tempdir().unwrap();
    let cfg = write_setup(dir.path());
    filpal(&cfg)
        .args(["exec", "FILPAL_CALIBRATE TEST=extruder_temp MIN=190 MAX=230 BANDS=4"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "> TUNING_TOWER COMMAND='SET_HEATER_TEMPERATURE HEATER=extruder' PARAMETER=TARGET START=235",
        ))
        .stdout(predicate::str::contains("> SDCARD_PRINT_FILE FILENAME=extruder_temp.gcode"));
}

#[test]
fn swap_runs_to_completion_in_simulation() {
    let dir = tempdir().unwrap();
    let cfg = write_setup(dir.path());
    filpal(&cfg)
        .args(["exec", "FILPAL_SWAP LOAD=PETG-1", "FILPAL_LOAD_CONTINUE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("> G1 F1000 E-500"))
        .stdout(predicate::str::contains("// Insert filament PETG-1"))
        .stdout(predicate::str::contains("> G1 F100 E500"))
        .stdout(predicate::str::contains("// Filament PETG-1 loaded"));

    let params = fs::read_to_string(dir.path().join("fil.pal")).unwrap();
    assert!(params.contains("fila_id = \"PETG-1\""), "{params}");
}

#[test]
fn parse_then_inject_installs_correction() {
    let dir = tempdir().unwrap();
    let cfg = write_setup(dir.path());
    filpal(&cfg)
        .args(["parse", "cube.gcode"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""command":"M104""#));

    let gcode = fs::read_to_string(dir.path().join("sd/cube.gcode")).unwrap();
    assert!(gcode.starts_with("; sliced ;PARSED\n"));
    let line = gcode
        .lines()
        .find(|l| l.starts_with("FILPAL_INJECTOR"))
        .unwrap()
        .to_string();

    filpal(&cfg)
        .args(["exec", &line])
        .assert()
        .success()
        .stdout(predicate::str::contains("// M104 correction on extruder"))
        .stdout(predicate::str::contains("extruder: control=filpal_corrected"));

    let params = fs::read_to_string(dir.path().join("fil.pal")).unwrap();
    assert!(params.contains("correction_M104"), "{params}");

    // Parsing the annotated file again is refused and leaves it alone.
    filpal(&cfg).args(["parse", "cube.gcode"]).assert().code(6);
    assert_eq!(fs::read_to_string(dir.path().join("sd/cube.gcode")).unwrap(), gcode);
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_setup(dir.path());
    let text = fs::read_to_string(&cfg).unwrap() + "\n[fit]\nmax_degree = 5\n";
    fs::write(&cfg, text).unwrap();
    filpal(&cfg)
        .args(["show"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("fit.max_degree"));
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    filpal(&dir.path().join("nope.toml"))
        .args(["show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Something went wrong"));
}
