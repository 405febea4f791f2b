// Integration tests for the qcdiff shell contract: exit codes, stdout shape,
// and error lines on stderr.
//
// Run with: cargo test -p qcdiff-cli --test cli_contract -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn qcdiff(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_qcdiff"));
    cmd.current_dir(dir);
    // Keep the user's settings file out of the picture.
    cmd.env("QCDIFF_SETTINGS", dir.join("no-settings.toml"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("process exited with a code")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn single_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{stdout}"))
}

fn pair(dir: &Path, qc_bmi: &str) {
    write(dir, "prod.csv", "usubjid,age,bmi\nS1,54,22.31\nS2,61,27.9\n");
    write(dir, "qc.csv", &format!("usubjid,age,bmi\nS1,54,{qc_bmi}\nS2,61,27.9\n"));
}

// ===========================================================================
// compare: verdict exit codes
// ===========================================================================

#[test]
fn identical_files_pass() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.31");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--key", "usubjid"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let json = single_json(&out);
    assert_eq!(json["contract_version"], 1);
    assert_eq!(json["command"], "compare");
    assert_eq!(json["result"]["overall_status"], "pass");
    assert_eq!(json["result"]["base_name"], "prod");
    assert_eq!(json["result"]["compare_name"], "qc");
    assert_eq!(json["result"]["summary"]["value_matches"], 4);
    assert!(stderr(&out).contains("status: PASS"));
}

#[test]
fn major_mismatch_fails() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.40");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--key", "usubjid", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).is_empty(), "quiet run wrote: {}", stderr(&out));

    let json = single_json(&out);
    assert_eq!(json["result"]["overall_status"], "fail");
    assert_eq!(json["result"]["summary"]["value_mismatches"], 1);
}

#[test]
fn warnings_only_downgrades_to_warning() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.40");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--key", "usubjid", "--warnings-only", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 1);
    assert_eq!(single_json(&out)["result"]["overall_status"], "warning");
}

#[test]
fn tolerance_flag_absorbs_difference() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.32");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--key", "usubjid", "--abs", "0.01", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0);
}

#[test]
fn spec_file_sets_keys_and_criticality() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.40");
    write(
        dir.path(),
        "adsl.toml",
        r#"
name = "adsl"
key_fields = ["usubjid"]

[[fields]]
name = "bmi"
kind = "numeric"
criticality = "minor"
"#,
    );

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--spec", "adsl.toml", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 1, "stderr: {}", stderr(&out));
}

// ===========================================================================
// compare: error exit codes
// ===========================================================================

#[test]
fn key_schema_mismatch_is_config_error() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.31");

    let out = qcdiff(dir.path())
        .args([
            "compare", "prod.csv", "qc.csv",
            "--base-key", "usubjid",
            "--compare-key", "usubjid,age",
        ])
        .output()
        .unwrap();
    assert_eq!(code(&out), 3);
    assert!(out.stdout.is_empty());
    let err = stderr(&out);
    assert!(err.contains("error:"), "{err}");
    assert!(err.contains("hint:"), "{err}");
}

#[test]
fn duplicate_keys_are_config_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", "id,v\n1,10\n1,11\n");
    write(dir.path(), "b.csv", "id,v\n1,10\n");

    let out = qcdiff(dir.path())
        .args(["compare", "a.csv", "b.csv", "--key", "id"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 3);
    assert!(stderr(&out).contains("1 (2 times)"), "{}", stderr(&out));
}

#[test]
fn missing_input_is_input_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", "id,v\n1,10\n");

    let out = qcdiff(dir.path())
        .args(["compare", "a.csv", "absent.csv", "--key", "id"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 4);
}

#[test]
fn missing_key_is_usage_error() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.31");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 5);
    assert!(stderr(&out).contains("--key"));
}

#[test]
fn unknown_flag_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let out = qcdiff(dir.path())
        .args(["compare", "--no-such-flag"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 5);
}

#[test]
fn help_exits_zero() {
    let dir = TempDir::new().unwrap();
    let out = qcdiff(dir.path()).args(["compare", "--help"]).output().unwrap();
    assert_eq!(code(&out), 0);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Exit codes"));
}

// ===========================================================================
// compare: output formats
// ===========================================================================

#[test]
fn csv_output_only_discrepancies() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.40");

    let out = qcdiff(dir.path())
        .args([
            "compare", "prod.csv", "qc.csv", "--key", "usubjid",
            "--out", "csv", "--only-discrepancies", "-q",
        ])
        .output()
        .unwrap();
    assert_eq!(code(&out), 2);

    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "run,kind,severity,key,field,base,compare,difference,detail");
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[1].starts_with("prod,value_mismatch,major,S1,bmi,"), "{}", lines[1]);
}

#[test]
fn output_file_receives_json() {
    let dir = TempDir::new().unwrap();
    pair(dir.path(), "22.31");

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.csv", "--key", "usubjid", "--output", "report.json"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0);
    assert!(out.stdout.is_empty());
    assert!(stderr(&out).contains("wrote report.json"));

    let written = fs::read_to_string(dir.path().join("report.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["result"]["overall_status"], "pass");
}

#[test]
fn json_and_csv_inputs_compare() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "prod.csv", "id,v,label\nS1,10.5,Placebo\n");
    write(dir.path(), "qc.json", r#"[{"id": "S1", "v": 10.5, "label": "Placebo"}]"#);

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.json", "--key", "id", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "{}", String::from_utf8_lossy(&out.stdout));
}

#[test]
fn numeric_ids_match_across_csv_and_json() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "prod.csv", "id,v\n1,10.5\n2,3\n");
    write(dir.path(), "qc.json", r#"[{"id": 1, "v": 10.5}, {"id": 2, "v": 3}]"#);

    let out = qcdiff(dir.path())
        .args(["compare", "prod.csv", "qc.json", "--key", "id", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "{}", String::from_utf8_lossy(&out.stdout));

    let summary = &single_json(&out)["result"]["summary"];
    assert_eq!(summary["records_in_both"], 2);
    assert_eq!(summary["missing_records"], 0);
    assert_eq!(summary["extra_records"], 0);
}

// ===========================================================================
// validate-spec
// ===========================================================================

#[test]
fn validate_spec_accepts_good_file() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "adsl.toml",
        "key_fields = [\"usubjid\"]\n\n[[fields]]\nname = \"age\"\nkind = \"numeric\"\n",
    );

    let out = qcdiff(dir.path()).args(["validate-spec", "adsl.toml"]).output().unwrap();
    assert_eq!(code(&out), 0);
    assert!(stderr(&out).contains("valid:"), "{}", stderr(&out));
    assert!(stderr(&out).contains("1 field(s)"));
}

#[test]
fn validate_spec_rejects_bad_file() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "bad.toml",
        "key_fields = [\"id\"]\n\n[[fields]]\nname = \"trt\"\nkind = \"text\"\ntolerance = { abs = 0.1 }\n",
    );

    let out = qcdiff(dir.path()).args(["validate-spec", "bad.toml"]).output().unwrap();
    assert_eq!(code(&out), 3);
    assert!(stderr(&out).contains("bad.toml"));
}

// ===========================================================================
// portfolio
// ===========================================================================

fn portfolio_fixture(dir: &Path) {
    write(dir, "prod/t1.csv", "id,v\n1,10\n2,20\n");
    write(dir, "qc/t1.csv", "id,v\n1,10\n2,20\n");
    write(dir, "prod/t2.csv", "id,v\n1,10\n");
    write(dir, "qc/t2.csv", "id,v\n1,12\n");
}

#[test]
fn portfolio_rolls_up_worst_verdict() {
    let dir = TempDir::new().unwrap();
    portfolio_fixture(dir.path());
    write(
        dir.path(),
        "csr.toml",
        r#"
name = "CSR"

[[comparisons]]
name = "t1"
base = "prod/t1.csv"
compare = "qc/t1.csv"
key = ["id"]

[[comparisons]]
name = "t2"
base = "prod/t2.csv"
compare = "qc/t2.csv"
key = ["id"]
"#,
    );

    let out = qcdiff(dir.path())
        .args(["portfolio", "csr.toml", "--jobs", "2", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 2, "stderr: {}", stderr(&out));

    let json = single_json(&out);
    assert_eq!(json["command"], "portfolio");
    let result = &json["result"];
    assert_eq!(result["name"], "CSR");
    assert_eq!(result["summary"]["runs"], 2);
    assert_eq!(result["summary"]["passed"], 1);
    assert_eq!(result["summary"]["failed"], 1);
    assert_eq!(result["summary"]["verdict"], "fail");
    assert_eq!(result["summary"]["overview"][0]["name"], "t1");
    assert_eq!(result["summary"]["findings"][0]["run"], "t2");
    assert_eq!(result["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn portfolio_with_broken_entry_is_config_error() {
    let dir = TempDir::new().unwrap();
    portfolio_fixture(dir.path());
    // Invoked from elsewhere: paths still resolve against the portfolio file.
    let elsewhere = TempDir::new().unwrap();
    let file = write(
        dir.path(),
        "csr.toml",
        r#"
[[comparisons]]
name = "t1"
base = "prod/t1.csv"
compare = "qc/t1.csv"
key = ["id"]

[[comparisons]]
name = "gone"
base = "prod/t1.csv"
compare = "qc/missing.csv"
key = ["id"]
"#,
    );

    let out = qcdiff(elsewhere.path())
        .args(["portfolio", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(code(&out), 3);

    let json = single_json(&out);
    let errors = json["result"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["name"], "gone");
    assert_eq!(errors[0]["exit_code"], 4);
    assert_eq!(json["result"]["summary"]["passed"], 1);
    assert!(stderr(&out).contains("ERROR"));
}

#[test]
fn portfolio_fail_fast_skips_later_entries() {
    let dir = TempDir::new().unwrap();
    portfolio_fixture(dir.path());
    write(
        dir.path(),
        "csr.toml",
        r#"
[[comparisons]]
name = "t2"
base = "prod/t2.csv"
compare = "qc/t2.csv"
key = ["id"]

[[comparisons]]
name = "t1"
base = "prod/t1.csv"
compare = "qc/t1.csv"
key = ["id"]
"#,
    );

    let out = qcdiff(dir.path())
        .args(["portfolio", "csr.toml", "--fail-fast", "-q"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 2);

    let json = single_json(&out);
    assert_eq!(json["result"]["skipped"][0], "t1");
    assert_eq!(json["result"]["summary"]["runs"], 1);
}

#[test]
fn portfolio_zero_jobs_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let out = qcdiff(dir.path())
        .args(["portfolio", "csr.toml", "--jobs", "0"])
        .output()
        .unwrap();
    assert_eq!(code(&out), 5);
}
