use std::env;
use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rsnake"))
}

#[test]
fn runs_a_script_file() {
    let path = env::temp_dir().join(format!("rsnake-driver-{}.snake", std::process::id()));
    fs::write(&path, "x = 2 + 3\nprint x * 2\n").expect("script should be written");

    let output = binary().arg(&path).output().expect("binary should run");
    fs::remove_file(&path).ok();

    assert!(output.status.success(), "status: {:?}", output.status);
    assert_eq!("10\n", String::from_utf8_lossy(&output.stdout));
    assert!(output.stderr.is_empty());
}

#[test]
fn reads_the_script_from_stdin() {
    let mut child = binary()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("binary should start");
    child
        .stdin
        .as_mut()
        .expect("stdin is piped")
        .write_all(b"print 'hi'\n")
        .expect("stdin should accept the script");

    let output = child.wait_with_output().expect("binary should run");

    assert!(output.status.success(), "status: {:?}", output.status);
    assert_eq!("hi\n", String::from_utf8_lossy(&output.stdout));
}

#[test]
fn reports_errors_and_exits_nonzero() {
    let mut child = binary()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should start");
    child
        .stdin
        .as_mut()
        .expect("stdin is piped")
        .write_all(b"print missing\n")
        .expect("stdin should accept the script");

    let output = child.wait_with_output().expect("binary should run");

    assert_eq!(Some(1), output.status.code());
    assert!(output.stdout.is_empty());
    assert_eq!(
        "Error: name \"missing\" is not defined\n",
        String::from_utf8_lossy(&output.stderr)
    );
}
