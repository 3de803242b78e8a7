use std::sync::Arc;
use std::time::Duration;

use cptest_core::style::{self, Plain};
use cptest_core::testing::{list_artifacts, Checker, JudgeCode, TestCase, TestRunner, Verdict};
use tempfile::TempDir;

struct Fixture {
    cases: TempDir,
    artifacts: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            cases: tempfile::tempdir().unwrap(),
            artifacts: tempfile::tempdir().unwrap(),
        }
    }

    fn case(&self, name: &str, input: &str, expected: &str) -> TestCase {
        self.indexed_case(1, name, input, expected)
    }

    fn indexed_case(&self, index: u32, name: &str, input: &str, expected: &str) -> TestCase {
        let input_path = self.cases.path().join(format!("{}.in", name));
        let expected_path = self.cases.path().join(format!("{}.out", name));
        std::fs::write(&input_path, input).unwrap();
        std::fs::write(&expected_path, expected).unwrap();
        TestCase::new(index, name, input_path, expected_path)
    }

    fn runner(&self, script: impl Into<String>) -> TestRunner {
        TestRunner::new(script).artifact_dir(self.artifacts.path())
    }

    async fn judge(&self, runner: TestRunner, t: &TestCase) -> Verdict {
        let v = dbg!(runner.judge(t).await);
        assert_eq!(v.diff().is_some(), v.code() == JudgeCode::WA);
        assert!(
            list_artifacts(self.artifacts.path()).unwrap().is_empty(),
            "output file left behind for {}",
            v.code()
        );
        v
    }
}

#[tokio::test]
async fn sum_is_accepted() {
    let f = Fixture::new();
    let t = f.case("sample-1", "2 3\n", "5\n");

    let v = f.judge(f.runner("read a b; echo $((a + b))"), &t).await;
    assert_eq!(v.code(), JudgeCode::AC);
    assert_eq!(v.diff(), None);
    assert_eq!(v.fail_log(), None);
}

/// Returns true when `pid` is gone or only a zombie.
#[cfg(target_os = "linux")]
fn is_terminated(pid: &str) -> bool {
    let Ok(stat) = std::fs::read_to_string(std::path::Path::new("/proc").join(pid).join("stat")) else {
        return true;
    };
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next());
    state == Some('Z')
}

#[tokio::test]
async fn busy_loop_is_killed_at_the_time_limit() {
    let f = Fixture::new();
    let t = f.case("1", "", "");
    let pidfile = f.cases.path().join("child.pid");
    let script = format!(
        "sleep 30 & echo $! > {}; while true; do :; done",
        pidfile.display()
    );

    let limit = Duration::from_millis(1000);
    let v = f.judge(f.runner(script).time_limit(limit), &t).await;
    assert_eq!(v.code(), JudgeCode::TLE);
    assert!(v.elapsed() >= limit, "{:?}", v.elapsed());
    assert!(v.elapsed() < limit + Duration::from_millis(500), "{:?}", v.elapsed());

    #[cfg(target_os = "linux")]
    {
        let pid = std::fs::read_to_string(&pidfile).unwrap();
        let pid = pid.trim();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(is_terminated(pid), "background child {} survived", pid);
    }
}

#[tokio::test]
async fn runtime_fault_keeps_stderr() {
    struct X {
        script: &'static str,
        want_stderr: &'static str,
    }
    let tests = [
        X {
            script: "echo 'Floating point exception' >&2; exit 136",
            want_stderr: "Floating point exception",
        },
        X {
            script: "echo 'about to fault' >&2; kill -FPE $$",
            want_stderr: "about to fault",
        },
    ];

    for x in tests {
        let f = Fixture::new();
        let t = f.case("1", "1 0\n", "0\n");
        let v = f.judge(f.runner(x.script), &t).await;
        assert_eq!(v.code(), JudgeCode::RTE);
        assert!(
            v.stderr_log().unwrap_or_default().contains(x.want_stderr),
            "{:?}",
            v.stderr_log()
        );
    }
}

#[tokio::test]
async fn wrong_answer_shows_diff_table() {
    let f = Fixture::new();
    let t = f.case("1", "1 2\n", "3\n");

    let v = f.judge(f.runner("echo 4"), &t).await;
    assert_eq!(v.code(), JudgeCode::WA);
    let diff = v.diff().unwrap();
    assert_eq!(diff.input.trim_end(), "1 2");
    assert_eq!(diff.expected.trim_end(), "3");
    assert_eq!(diff.output.trim_end(), "4");

    let report = style::render(&v, &Plain);
    assert!(report.contains("INPUT"), "{}", report);
    assert!(report.contains("EXPECTED"), "{}", report);
    assert!(report.contains("OUTPUT"), "{}", report);
    assert!(report.contains("Verdict: WA"), "{}", report);
}

#[tokio::test]
async fn missing_checker_executable_is_a_failure() {
    let f = Fixture::new();
    let t = f.case("1", "", "ok\n");
    let runner = f
        .runner("echo ok")
        .checker(Checker::new("/nonexistent/cptest-checker #{outputFile} #{expectedFile}"));

    let v = f.judge(runner, &t).await;
    assert_eq!(v.code(), JudgeCode::FAIL);
    assert!(v.fail_log().unwrap().contains("checker"), "{:?}", v.fail_log());
    assert_eq!(v.checker_log(), None);
    assert_eq!(v.diff(), None);
}

#[tokio::test]
async fn verdicts_arrive_in_index_order_under_parallelism() {
    let f = Fixture::new();
    let mut testcases = Vec::new();
    for (i, sleep) in [(1, "0.3\n"), (2, "0\n"), (3, "0.1\n")] {
        testcases.push(f.indexed_case(i, &i.to_string(), sleep, "done\n"));
    }

    let runner = Arc::new(f.runner("read s; sleep $s; echo done"));
    let mut seen = Vec::new();
    let verdicts = runner
        .judge_all(testcases, 3, |v| seen.push(v.index()))
        .await;

    assert_eq!(seen, [1, 2, 3]);
    assert!(verdicts.iter().all(Verdict::is_accepted));
    assert!(list_artifacts(f.artifacts.path()).unwrap().is_empty());
}
