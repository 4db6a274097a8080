use serde_json::{Value, json};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "shardmerge-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, name: &str, contents: &str) -> String {
        let path = self.path.join(name);
        fs::write(&path, contents).expect("fixture file should be written");
        path.to_string_lossy().into_owned()
    }

    fn write_json(&self, name: &str, payload: &Value) -> String {
        self.write(
            name,
            &serde_json::to_string_pretty(payload).expect("payload should serialize"),
        )
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_shardmerge<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_shardmerge");
    Command::new(bin)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("shardmerge command should execute")
}

fn assert_exit(output: &Output, code: i32) {
    if output.status.code() != Some(code) {
        panic!(
            "expected exit {code}, got {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be valid json: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

const OVERLAPPING_CONFIG: &str = r#"
[[shards]]
id = "a"
sources = ["filings"]
keys = ["k"]
priority = 1

[[shards]]
id = "b"
sources = ["filings", "market-feed"]
keys = ["k", "extra"]
priority = 2

[merge]
conflict_resolution = "priority"
"#;

#[test]
fn merge_disjoint_shards_json() {
    let tmp = TempDirGuard::new("merge-disjoint");
    let shards = tmp.write_json(
        "shards.json",
        &json!({
            "core-metadata": {"company_type": "public", "run_metadata": {"run": 1}, "company_profile": {"name": "Acme"}},
            "base-metrics": {"financials": {"revenue": 10}, "operating_metrics": {"staff": 3}}
        }),
    );

    let output = run_shardmerge(["merge", "--shards", shards.as_str(), "--json"]);
    assert_exit(&output, 0);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["data"]["company_type"], "public");
    assert_eq!(payload["data"]["financials"]["revenue"], 10);
    assert_eq!(payload["validation"]["isValid"], true);
    assert_eq!(payload["shortCircuited"], false);
    assert!(
        payload["digest"]
            .as_str()
            .is_some_and(|digest| digest.starts_with("rec1_"))
    );
}

#[test]
fn merge_conflict_is_invalid_but_merged() {
    let tmp = TempDirGuard::new("merge-conflict");
    let config = tmp.write("engine.toml", OVERLAPPING_CONFIG);
    let shards = tmp.write_json(
        "shards.json",
        &json!({"a": {"k": 1}, "b": {"k": 2, "extra": {"x": 1}}}),
    );

    let output = run_shardmerge([
        "merge",
        "--shards",
        shards.as_str(),
        "--config",
        config.as_str(),
    ]);
    assert_exit(&output, 1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shardmerge merge"));
    assert!(stdout.contains("  Strategy: priority"));
    assert!(stdout.contains("    - k <- a"));
    assert!(stdout.contains("k: a vs b"));
}

#[test]
fn merge_error_strategy_halts_with_exit_2() {
    let tmp = TempDirGuard::new("merge-error");
    let config = tmp.write("engine.toml", OVERLAPPING_CONFIG);
    let shards = tmp.write_json("shards.json", &json!({"a": {"k": 1}, "b": {"k": 2}}));

    let output = run_shardmerge([
        "merge",
        "--shards",
        shards.as_str(),
        "--config",
        config.as_str(),
        "--strategy",
        "error",
    ]);
    assert_exit(&output, 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: merge halted"));
    assert!(stderr.contains("`k`"));
}

#[test]
fn merge_no_strip_still_reads_authorized_keys_only() {
    let tmp = TempDirGuard::new("merge-no-strip");
    let config = tmp.write("engine.toml", OVERLAPPING_CONFIG);
    let shards = tmp.write_json(
        "shards.json",
        &json!({"a": {"k": 1, "extra": {"x": 1}, "stray": 2}}),
    );

    let output = run_shardmerge([
        "merge",
        "--shards",
        shards.as_str(),
        "--config",
        config.as_str(),
        "--no-strip",
        "--json",
    ]);
    assert_exit(&output, 0);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["data"], json!({"k": 1}));
    assert_eq!(payload["validation"]["contamination"].as_array().map(Vec::len), Some(2));
}

#[test]
fn merge_validate_first_short_circuits() {
    let tmp = TempDirGuard::new("merge-short-circuit");
    let shards = tmp.write_json(
        "shards.json",
        &json!({"core-metadata": [1, 2], "valuation": {"valuation": {"ev": 1}}}),
    );

    let output = run_shardmerge([
        "merge",
        "--shards",
        shards.as_str(),
        "--strategy",
        "error",
        "--validate-first",
        "--json",
    ]);
    assert_exit(&output, 2);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["shortCircuited"], true);
    assert_eq!(payload["data"], json!({}));
    assert_eq!(
        payload["validation"]["shardResults"][0]["errors"][0],
        "(root): expected object, received array"
    );
}

#[test]
fn validate_reports_reruns_and_contamination() {
    let tmp = TempDirGuard::new("validate");
    let config = tmp.write("engine.toml", OVERLAPPING_CONFIG);
    let shards = tmp.write_json(
        "shards.json",
        &json!({"a": {"k": 1, "stray": true}, "b": {"k": 1}}),
    );

    let output = run_shardmerge([
        "validate",
        "--shards",
        shards.as_str(),
        "--config",
        config.as_str(),
        "--min-coverage",
        "0.75",
        "--json",
    ]);
    assert_exit(&output, 0);
    let payload = parse_json_stdout(&output);
    assert_eq!(
        payload["validation"]["contamination"],
        json!(["Shard \"a\" contains unauthorized key: \"stray\""])
    );
    assert_eq!(
        payload["reruns"],
        json!([{"shardId": "b", "reasons": ["low_coverage"], "coverage": 0.5}])
    );
}

#[test]
fn routing_reports_readiness() {
    let output = run_shardmerge([
        "routing",
        "--completed",
        "company-registry",
        "--completed",
        "market-feed",
        "--json",
    ]);
    assert_exit(&output, 0);
    let payload = parse_json_stdout(&output);
    let shards = payload["shards"].as_array().expect("shards array");
    let ready: Vec<(&str, bool)> = shards
        .iter()
        .map(|row| {
            (
                row["shardId"].as_str().unwrap_or_default(),
                row["ready"].as_bool().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        ready,
        vec![
            ("core-metadata", true),
            ("base-metrics", false),
            ("valuation", false),
            ("risks-events", false),
            ("public-market", true),
        ]
    );
}

#[test]
fn routing_human_output_lists_missing_sources() {
    let tmp = TempDirGuard::new("routing-human");
    let config = tmp.write("engine.toml", OVERLAPPING_CONFIG);
    let output = run_shardmerge(["routing", "--config", config.as_str(), "--completed", "filings"]);
    assert_exit(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("    1. a [ready] keys: k"));
    assert!(stdout.contains("    2. b [waiting] keys: k, extra"));
    assert!(stdout.contains("       missing: market-feed"));
    assert!(stdout.contains("    - k: a, b"));
}

#[test]
fn missing_shards_file_is_a_load_error() {
    let tmp = TempDirGuard::new("missing");
    let missing = tmp.path().join("absent.json").to_string_lossy().into_owned();
    let output = run_shardmerge(["merge", "--shards", missing.as_str()]);
    assert_exit(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("error: failed to read"));
}
