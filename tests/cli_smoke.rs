use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const CALC: &str = "def add(a, b):\n    return a + b\n\n\ndef divide(a, b):\n    return a / b\n";

fn project(tmp: &Path) -> std::path::PathBuf {
    let root = tmp.join("proj");
    std::fs::create_dir_all(root.join("pkg")).unwrap();
    std::fs::create_dir_all(root.join("__pycache__")).unwrap();
    std::fs::write(root.join("calc.py"), CALC).unwrap();
    std::fs::write(root.join("pkg/util.py"), "class Box:\n    def grow(self, by):\n        pass\n").unwrap();
    std::fs::write(root.join("__pycache__/calc.cpython-311.pyc"), "junk").unwrap();
    root
}

/// The binary with no API key and a throwaway cache, so nothing leaves the machine.
fn codesumma(tmp: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_codesumma"));
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .current_dir(tmp)
        .arg("--cache-file")
        .arg(tmp.join("cache.json"));
    cmd
}

fn stdout(out: &Output) -> String {
    String::from_utf8(out.stdout.clone()).expect("stdout is utf-8")
}

#[test]
fn summarizes_directory() {
    let tmp = TempDir::new().unwrap();
    let root = project(tmp.path());

    let out = codesumma(tmp.path()).arg(&root).output().expect("run codesumma");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let doc = stdout(&out);
    assert!(doc.starts_with("Context:\n\nDirectory Structure:\n```\nproj/\n    calc.py\n    pkg/\n        util.py\n```\n"));
    assert!(doc.contains("File Summary:\n"));
    assert!(doc.contains("```\nadd(a, b)\ndivide(a, b)\n```\n"));
    assert!(doc.contains("```\nClass: Box\ngrow(self, by)\n```\n"));
    assert!(!doc.contains("__pycache__"));
    assert!(!doc.contains("Traceback"));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Summary length:"));
}

#[test]
fn traceback_from_argument() {
    let tmp = TempDir::new().unwrap();
    let root = project(tmp.path());
    let tb = format!(
        "Traceback (most recent call last):\n  File \"{}\", line 6, in divide\n    return a / b\nZeroDivisionError: division by zero",
        root.join("calc.py").display()
    );

    let out = codesumma(tmp.path()).arg(&root).arg("-t").arg(&tb).output().expect("run codesumma");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let doc = stdout(&out);
    assert!(doc.contains("\nTraceback:\n```\nTraceback (most recent call last):"));
    assert!(doc.contains("Traceback Context:\n```\nFile: "));
    assert!(doc.contains("Line: 6\nFunction: divide\nSummary: divide(a, b)\n"));
    assert!(doc.ends_with("Resolve this error.\n"));
}

#[test]
fn traceback_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let root = project(tmp.path());
    let tb = format!("  File \"{}\", line 2, in add\n", root.join("calc.py").display());

    let mut child = codesumma(tmp.path())
        .arg(&root)
        .arg("-t")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn codesumma");
    child.stdin.take().unwrap().write_all(tb.as_bytes()).unwrap();
    let out = child.wait_with_output().expect("wait codesumma");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let doc = stdout(&out);
    assert!(doc.contains("Function: add\nSummary: add(a, b)\n"));
}

#[test]
fn empty_input_exits_nonzero_with_diagnostics() {
    let tmp = TempDir::new().unwrap();
    let root = project(tmp.path());

    let out = codesumma(tmp.path())
        .arg(&root)
        .args(["-i", ".py"])
        .output()
        .expect("run codesumma");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no summary generated"));
    assert!(stderr.contains("Ignore patterns:"));
    assert!(stderr.contains("\".py\""));
}

#[test]
fn print_full_emits_file_text() {
    let tmp = TempDir::new().unwrap();
    let root = project(tmp.path());

    let out = codesumma(tmp.path())
        .arg(&root)
        .args(["--print-full", "calc"])
        .output()
        .expect("run codesumma");
    assert!(out.status.success());
    assert!(stdout(&out).contains(CALC));
}
