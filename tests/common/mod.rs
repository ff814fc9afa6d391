//! Fatal paths abort the process, so they run in a child copy of the test
//! binary and the parent inspects how it died.

use std::env;
use std::process::Command;

const CHILD: &str = "HWREACTOR_FATAL_CHILD";

/// Runs `body` in a re-spawned copy of this test binary filtered down to
/// `test`, and asserts that the child aborted after logging `expected`.
///
/// `test` must be the name of the calling test function.
pub fn assert_fatal(test: &str, expected: &str, body: impl FnOnce()) {
    if env::var_os(CHILD).is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
        body();
        return;
    }

    let output = Command::new(env::current_exe().unwrap())
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD, "1")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        !output.status.success(),
        "{test} returned from its fatal path:\n{stderr}"
    );
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        const SIGABRT: i32 = 6;
        assert_eq!(
            output.status.signal(),
            Some(SIGABRT),
            "{test} did not abort:\n{stderr}"
        );
    }
    assert!(
        stderr.contains(expected),
        "{test} did not log {expected:?}:\n{stderr}"
    );
}
