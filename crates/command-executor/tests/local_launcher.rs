//! Integration tests for the local launcher

use command_executor::{
    Command, Error, Launcher, LocalLauncher, OutputFraming, OutputTee, ProcessEvent,
    ProcessEventType, ProcessHandle,
};
use futures::StreamExt;
use futures::stream::Stream;

/// Pid reported by the `Started` event that opens every stream
async fn started_pid(events: &mut (impl Stream<Item = ProcessEvent> + Unpin)) -> u32 {
    match events.next().await.map(|event| event.event_type) {
        Some(ProcessEventType::Started { pid }) => pid,
        other => panic!("expected a Started event, got {:?}", other),
    }
}

#[smol_potat::test]
async fn test_local_launcher_basic_command() {
    let mut command = Command::new("echo");
    command.arg("hello world");

    let (mut events, mut handle) = LocalLauncher.launch(command).await.unwrap();

    let mut output = String::new();
    while let Some(event) = events.next().await {
        if let Some(line) = event.output_line() {
            output.push_str(line);
            output.push('\n');
        }
    }

    let exit_status = handle.wait().await.unwrap();
    assert_eq!(exit_status.code, Some(0));
    assert_eq!(output, "hello world\n");
}

#[smol_potat::test]
async fn test_execute_merges_stdout_and_stderr() {
    let command = Command::builder("sh")
        .arg("-c")
        .arg("echo out; echo err 1>&2")
        .build();

    let result = LocalLauncher.execute(command).await.unwrap();
    assert!(result.success());
    assert!(result.output.contains("out\n"));
    assert!(result.output.contains("err\n"));
}

#[smol_potat::test]
async fn test_nonzero_exit_is_not_an_error() {
    let command = Command::builder("sh").arg("-c").arg("echo failing; exit 3").build();

    let result = LocalLauncher.execute(command).await.unwrap();
    assert!(!result.success());
    assert_eq!(result.exit_code(), 3);
    assert_eq!(result.output, "failing\n");
}

#[smol_potat::test]
async fn test_execute_tee_streams_into_sink() {
    let command = Command::builder("sh")
        .arg("-c")
        .arg("for i in 1 2 3; do echo line$i; done")
        .build();

    let mut tee = OutputTee::new(Vec::new());
    let status = LocalLauncher.execute_tee(command, &mut tee).await.unwrap();

    assert!(status.success());
    let (sink, captured) = tee.into_parts();
    assert_eq!(captured, "line1\nline2\nline3\n");
    assert_eq!(String::from_utf8(sink).unwrap(), captured);
}

#[smol_potat::test]
async fn test_current_dir_is_applied() {
    let dir = tempfile::TempDir::new().unwrap();
    let command = Command::builder("pwd").current_dir(dir.path()).build();

    let result = LocalLauncher.execute(command).await.unwrap();
    let reported = std::path::PathBuf::from(result.output.trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[smol_potat::test]
async fn test_from_invocation_runs_multi_word_base() {
    let command = Command::from_invocation("sh -c", ["echo $0", "spaced arg"]).unwrap();

    let result = LocalLauncher.execute(command).await.unwrap();
    assert_eq!(result.output, "spaced arg\n");
}

#[smol_potat::test]
async fn test_missing_program() {
    let command = Command::new("definitely-not-a-real-program-98765");
    let err = LocalLauncher.execute(command).await.unwrap_err();
    assert!(matches!(err, Error::CommandNotFound { .. }));
}

#[smol_potat::test]
async fn test_invalid_utf8_does_not_cut_the_stream() {
    let command = Command::builder("sh")
        .arg("-c")
        .arg("printf 'before\\n\\377bad\\n'; for i in $(seq 1 20000); do echo line$i; done; echo after; exit 4")
        .build();

    let result = LocalLauncher.execute(command).await.unwrap();

    assert_eq!(result.exit_code(), 4);
    assert!(result.output.starts_with("before\n\u{FFFD}bad\nline1\n"));
    assert!(result.output.contains("line20000\n"));
    assert!(result.output.ends_with("after\n"));
}

#[smol_potat::test]
async fn test_chunk_framing_captures_verbatim() {
    let command = Command::builder("sh")
        .arg("-c")
        .arg("printf 'a\\rb\\r\\ndone'")
        .output_framing(OutputFraming::Chunks)
        .build();

    let mut tee = OutputTee::new(Vec::new());
    let status = LocalLauncher.execute_tee(command, &mut tee).await.unwrap();

    assert!(status.success());
    let (sink, captured) = tee.into_parts();
    assert_eq!(captured, "a\rb\r\ndone");
    assert_eq!(sink, b"a\rb\r\ndone");
}

#[smol_potat::test]
async fn test_line_framing_strips_terminators() {
    let command = Command::builder("sh")
        .arg("-c")
        .arg("printf 'a\\r\\nb'")
        .build();

    let result = LocalLauncher.execute(command).await.unwrap();
    assert_eq!(result.output, "a\nb\n");
}

#[test]
#[cfg(unix)]
fn test_killed_process_reports_signal() -> anyhow::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    futures::executor::block_on(async {
        let command = Command::builder("sleep").arg("30").build();
        let (mut events, mut handle) = LocalLauncher.launch(command).await?;
        let pid = started_pid(&mut events).await;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL)?;
        let status = handle.wait().await?;

        assert!(status.terminated_by_signal());
        assert_eq!(status.exit_code(), 128 + 9);
        Ok(())
    })
}

#[test]
#[cfg(unix)]
fn test_process_killed_on_handle_drop() {
    futures::executor::block_on(async {
        let command = Command::builder("sleep").arg("60").build();
        let (mut events, handle) = LocalLauncher.launch(command).await.unwrap();
        let pid = started_pid(&mut events).await;

        drop(handle);
        smol::Timer::after(std::time::Duration::from_millis(200)).await;

        use nix::sys::signal;
        use nix::unistd::Pid;
        let is_alive = signal::kill(Pid::from_raw(pid as i32), None).is_ok();
        assert!(!is_alive, "process should be killed when its handle is dropped");
    });
}
