// tests/gates.rs

mod common;
use crate::common::fake_runner::FakeCommandRunner;
use crate::common::{init_tracing, root};

use std::time::Duration;

use storydag::config::{ConfigFile, parse_raw};
use storydag::fs::mock::MockFileSystem;
use storydag::gates::evaluator::snake_case;
use storydag::gates::{GateEvaluator, GateResults};

fn config(toml: &str) -> ConfigFile {
    ConfigFile::try_from(parse_raw(toml).expect("toml")).expect("valid config")
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/README.md", "# demo");
    fs
}

async fn evaluate(
    fs: &MockFileSystem,
    runner: &FakeCommandRunner,
    cfg: &ConfigFile,
    gates: &[&str],
) -> GateResults {
    let root = root();
    let names: Vec<String> = gates.iter().map(|g| g.to_string()).collect();
    let evaluator = GateEvaluator::new(fs, runner, cfg, &root);
    let fut = evaluator.evaluate(&names);
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("gate evaluation timed out")
}

#[tokio::test]
async fn no_rej_finds_reject_files_outside_skipped_dirs() {
    init_tracing();

    let fs = project();
    fs.add_file("/proj/.git/old.rej", "");
    let runner = FakeCommandRunner::new();
    let cfg = ConfigFile::default();

    let clean = evaluate(&fs, &runner, &cfg, &["no_rej"]).await;
    assert!(clean["no_rej"].ok, "{:?}", clean["no_rej"]);
    assert_eq!(clean["no_rej"].detail, "no reject files");

    fs.add_file("/proj/src/lib.rs.rej", "@@ hunk");
    let dirty = evaluate(&fs, &runner, &cfg, &["no_rej"]).await;
    assert!(!dirty["no_rej"].ok);
    assert_eq!(dirty["no_rej"].detail, "found src/lib.rs.rej");
}

#[tokio::test]
async fn clean_tree_reports_first_dirty_lines() {
    let fs = project();
    let runner =
        FakeCommandRunner::new().succeeds("git", " M src/a.rs\n?? b\n?? c\n?? d\n?? e\n?? f\n");
    let cfg = ConfigFile::default();

    let results = evaluate(&fs, &runner, &cfg, &["clean_tree"]).await;

    let outcome = &results["clean_tree"];
    assert!(!outcome.ok);
    assert_eq!(outcome.detail, "M src/a.rs | ?? b | ?? c | ?? d | ?? e");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "git");
    assert_eq!(calls[0].args, vec!["status", "--porcelain"]);
    assert_eq!(calls[0].cwd, root());
}

#[tokio::test]
async fn clean_tree_passes_on_empty_status() {
    let fs = project();
    let runner = FakeCommandRunner::new().succeeds("git", "\n");
    let results = evaluate(&fs, &runner, &ConfigFile::default(), &["clean_tree"]).await;
    assert!(results["clean_tree"].ok);
    assert_eq!(results["clean_tree"].detail, "working tree clean");
}

#[tokio::test]
async fn gate_errors_follow_the_configured_policy() {
    init_tracing();

    let fs = project();
    let runner = FakeCommandRunner::new().errors("git", "spawn failed");

    let open = evaluate(&fs, &runner, &ConfigFile::default(), &["clean_tree"]).await;
    assert!(open["clean_tree"].ok);
    assert!(open["clean_tree"].detail.starts_with("gate error ignored: "));
    assert!(open["clean_tree"].detail.contains("spawn failed"));

    let closed_cfg = config("[gates]\non_error = \"fail-closed\"\n");
    let closed = evaluate(&fs, &runner, &closed_cfg, &["clean_tree"]).await;
    assert!(!closed["clean_tree"].ok);
    assert!(closed["clean_tree"].detail.starts_with("gate error: "));
}

#[tokio::test]
async fn git_failure_is_a_gate_error() {
    let fs = project();
    let runner = FakeCommandRunner::new().fails("git", 128, "", "not a git repository");
    let cfg = config("[gates]\non_error = \"fail-closed\"\n");

    let results = evaluate(&fs, &runner, &cfg, &["clean_tree"]).await;

    assert!(!results["clean_tree"].ok);
    assert!(results["clean_tree"].detail.contains("not a git repository"));
}

#[tokio::test]
async fn schema_guard_script_takes_precedence() {
    let fs = project();
    fs.add_file("/proj/scripts/guards/schema_applied.sh", "exit 1");
    let runner = FakeCommandRunner::new().fails("sh", 3, "", "");

    let results = evaluate(&fs, &runner, &ConfigFile::default(), &["schema_applied"]).await;

    let outcome = &results["schema_applied"];
    assert!(!outcome.ok);
    assert_eq!(
        outcome.detail,
        "guard scripts/guards/schema_applied.sh exited with status 3"
    );
    assert_eq!(runner.calls()[0].program, "sh");
}

#[tokio::test]
async fn schema_guard_success_passes() {
    let fs = project();
    fs.add_file("/proj/scripts/guards/schema_applied.sh", "exit 0");
    let runner = FakeCommandRunner::new().succeeds("sh", "ok");

    let results = evaluate(&fs, &runner, &ConfigFile::default(), &["schema_applied"]).await;

    assert!(results["schema_applied"].ok);
    assert_eq!(results["schema_applied"].detail, "guard scripts/guards/schema_applied.sh passed");
}

#[tokio::test]
async fn schema_without_guard_walks_the_file_checks() {
    let fs = project();
    let runner = FakeCommandRunner::new();
    let cfg = config("[gates.schema_applied]\nkeywords = [\"create table\", \"stories\"]\n");

    let missing = evaluate(&fs, &runner, &cfg, &["schema_applied"]).await;
    assert_eq!(missing["schema_applied"].detail, "missing schema file db/schema.sql");

    fs.add_file("/proj/db/schema.sql", "-- schema");
    let no_migrations = evaluate(&fs, &runner, &cfg, &["schema_applied"]).await;
    assert_eq!(no_migrations["schema_applied"].detail, "no migrations under db/migrations");

    fs.add_file("/proj/db/migrations/001_init.sql", "CREATE TABLE users (id int);");
    let unrelated = evaluate(&fs, &runner, &cfg, &["schema_applied"]).await;
    assert!(!unrelated["schema_applied"].ok);
    assert_eq!(unrelated["schema_applied"].detail, "no migration mentions create table, stories");

    fs.add_file("/proj/db/migrations/002_stories.sql", "Create Table stories (slug text);");
    let applied = evaluate(&fs, &runner, &cfg, &["schema_applied"]).await;
    assert!(applied["schema_applied"].ok);
    assert_eq!(
        applied["schema_applied"].detail,
        "migration db/migrations/002_stories.sql applies schema"
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn api_contract_requires_declared_and_implemented_operation() {
    let fs = project();
    let runner = FakeCommandRunner::new();
    let cfg = config("[gates.api_contract_exists]\noperation_id = \"getUserProfile\"\n");

    let missing = evaluate(&fs, &runner, &cfg, &["api_contract_exists"]).await;
    assert_eq!(missing["api_contract_exists"].detail, "missing contract api/openapi.yaml");

    fs.add_file(
        "/proj/api/openapi.yaml",
        "paths:\n  /me:\n    get:\n      operationId: listUsers\n",
    );
    let undeclared = evaluate(&fs, &runner, &cfg, &["api_contract_exists"]).await;
    assert_eq!(
        undeclared["api_contract_exists"].detail,
        "operationId getUserProfile not declared in api/openapi.yaml"
    );

    fs.add_file(
        "/proj/api/openapi.yaml",
        "paths:\n  /me:\n    get:\n      operationId: \"getUserProfile\"\n",
    );
    let no_handler = evaluate(&fs, &runner, &cfg, &["api_contract_exists"]).await;
    assert!(no_handler["api_contract_exists"].detail.starts_with("no handler file matches"));

    fs.add_file("/proj/src/user_handler.rs", "pub fn list_users() {}");
    let unimplemented = evaluate(&fs, &runner, &cfg, &["api_contract_exists"]).await;
    assert_eq!(unimplemented["api_contract_exists"].detail, "no handler implements getUserProfile");

    fs.add_file("/proj/src/routes/profile.rs", "pub async fn get_user_profile() {}");
    let ok = evaluate(&fs, &runner, &cfg, &["api_contract_exists"]).await;
    assert!(ok["api_contract_exists"].ok);
    assert_eq!(
        ok["api_contract_exists"].detail,
        "handler src/routes/profile.rs implements getUserProfile"
    );
}

#[tokio::test]
async fn api_contract_without_operation_only_needs_a_handler() {
    let fs = project();
    fs.add_file("/proj/api/openapi.yaml", "openapi: 3.0.0\n");
    fs.add_file("/proj/src/api/mod.rs", "");
    let runner = FakeCommandRunner::new();

    let results = evaluate(&fs, &runner, &ConfigFile::default(), &["api_contract_exists"]).await;

    assert!(results["api_contract_exists"].ok);
    assert_eq!(results["api_contract_exists"].detail, "handler src/api/mod.rs");
}

#[tokio::test]
async fn unknown_and_repeated_gates() {
    let fs = project();
    let runner = FakeCommandRunner::new().succeeds("git", "");

    let gates = ["clean_tree", "lint_ok", "clean_tree"];
    let results = evaluate(&fs, &runner, &ConfigFile::default(), &gates).await;

    assert_eq!(results.len(), 2);
    assert!(results["lint_ok"].ok);
    assert_eq!(results["lint_ok"].detail, "unknown gate");
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn test_snake_case_conversion() {
    assert_eq!(snake_case("getUserProfile"), "get_user_profile");
    assert_eq!(snake_case("list-users"), "list_users");
    assert_eq!(snake_case("v2Items"), "v2_items");
}
