use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use jsflow_checker::builder::ty;
use jsflow_checker::{AstBuilder, BinaryOperator, Doc, Program};
use tempfile::tempdir;

fn jsflow_binary() -> &'static str {
    env!("CARGO_BIN_EXE_jsflow")
}

fn write_program(dir: &Path, name: &str, program: &Program) -> std::path::PathBuf {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(program).expect("serialize program");
    fs::write(&path, json).expect("write program");
    path
}

fn run(args: &[&std::ffi::OsStr]) -> Output {
    Command::new(jsflow_binary())
        .args(args)
        .output()
        .expect("run jsflow")
}

/// `function f(x) { return x - 5; } f('str');`
fn mistyped_call() -> Program {
    let b = AstBuilder::new();
    b.program(vec![
        b.function_decl(
            "f",
            &["x"],
            vec![b.ret(Some(b.binary(BinaryOperator::Subtract, b.ident("x"), b.num(5.0))))],
        ),
        b.expr(b.call(b.ident("f"), vec![b.str("str")])),
    ])
}

#[test]
fn clean_program_exits_successfully() {
    let tmp = tempdir().expect("tempdir");
    let b = AstBuilder::new();
    let program = b.program(vec![b.var_doc(
        Doc::new().ty(ty::number()),
        "count",
        Some(b.num(1.0)),
    )]);
    let input = write_program(tmp.path(), "clean.json", &program);

    let output = run(&[input.as_os_str()]);
    assert!(
        output.status.success(),
        "expected success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).trim().is_empty());
}

#[test]
fn type_error_is_reported_with_location() {
    let tmp = tempdir().expect("tempdir");
    let input = write_program(tmp.path(), "call.json", &mistyped_call());

    let output = run(&[input.as_os_str()]);
    assert!(!output.status.success(), "expected non-zero exit on type error");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("error[invalidArgumentType]"),
        "expected diagnostic name, got: {stdout}"
    );
    assert!(stdout.contains("-->"), "expected location, got: {stdout}");
    assert!(stdout.contains("1 error(s), 0 warning(s)"), "got: {stdout}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 error found"), "got: {stderr}");
}

#[test]
fn json_format_lists_diagnostics() {
    let tmp = tempdir().expect("tempdir");
    let input = write_program(tmp.path(), "call.json", &mistyped_call());

    let output = run(&[input.as_os_str(), "--format".as_ref(), "json".as_ref()]);
    assert!(!output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let diagnostics = report["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["kind"], "invalidArgumentType");
    assert_eq!(diagnostics[0]["level"], "error");
    assert_eq!(diagnostics[0]["group"], "checkTypes");
    assert!(diagnostics[0]["span"]["line"].is_u64());
}

#[test]
fn yaml_config_enables_mixed_mode() {
    let tmp = tempdir().expect("tempdir");
    let b = AstBuilder::new();
    let program = b.program(vec![b.let_("total", Some(b.num(0.0)))]);
    let input = write_program(tmp.path(), "let.json", &program);
    let config = tmp.path().join("jsflow.yaml");
    fs::write(&config, "inputMode: mixed\n").expect("write config");

    let output = run(&[input.as_os_str(), "--config".as_ref(), config.as_os_str()]);
    assert!(
        output.status.success(),
        "warnings alone should not fail the check: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("warning[requiresTranspilation]"),
        "got: {stdout}"
    );
}

#[test]
fn mixed_flag_overrides_default_mode() {
    let tmp = tempdir().expect("tempdir");
    let b = AstBuilder::new();
    let program = b.program(vec![b.let_("total", Some(b.num(0.0)))]);
    let input = write_program(tmp.path(), "let.json", &program);

    let quiet = run(&[input.as_os_str()]);
    assert!(String::from_utf8_lossy(&quiet.stdout).trim().is_empty());

    let mixed = run(&[input.as_os_str(), "--mixed".as_ref()]);
    assert!(String::from_utf8_lossy(&mixed.stdout).contains("requiresTranspilation"));
}

#[test]
fn externs_declare_globals() {
    let tmp = tempdir().expect("tempdir");
    let e = AstBuilder::with_function_ids_from(1000);
    let externs = e.program(vec![e.function_decl_doc(
        Doc::new().param("n", ty::number()).returns(ty::number()),
        "sqrt",
        &["n"],
        vec![],
    )]);
    let b = AstBuilder::new();
    let program = b.program(vec![b.expr(b.call(b.ident("sqrt"), vec![b.str("four")]))]);
    let externs_path = write_program(tmp.path(), "externs.json", &externs);
    let input = write_program(tmp.path(), "main.json", &program);

    let output = run(&[
        input.as_os_str(),
        "--externs".as_ref(),
        externs_path.as_os_str(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("invalidArgumentType"), "got: {stdout}");
    assert!(!stdout.contains("undefinedName"), "got: {stdout}");
}

#[test]
fn unreadable_input_fails_with_context() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");

    let output = run(&[missing.as_os_str()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load program"), "got: {stderr}");
}
