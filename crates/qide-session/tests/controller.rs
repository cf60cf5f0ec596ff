//! Session controller tests against a scripted stand-in interpreter.
//!
//! The stand-in is a `/bin/sh` loop that behaves like R on a pipe: it prints
//! a banner and a prompt, echoes each line it reads, prints a canned result
//! and prompts again.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use qide_core::{ExitInfo, InterpreterSettings, SessionEvent, SessionState};
use qide_session::{ConsoleView, SessionController};

const FAKE_R: &str = r#"
printf 'R fake 1.0\n\n> '
while IFS= read -r line; do
  if [ "$line" = quit ]; then exit 0; fi
  printf '%s\n' "$line"
  case "$line" in
    "1+1") printf '[1] 2\n' ;;
    warn) printf 'Warning message\n' >&2 ;;
    cls) printf 'old\014new\n' ;;
    color) printf '\033[31m[1] "red"\033[0m\n' ;;
    crash) kill -9 $$ ;;
    hang) sleep 30 ;;
    "x<-5") ;;
    *) printf '[1] "%s"\n' "$line" ;;
  esac
  printf '> '
done
"#;

fn fake_settings() -> InterpreterSettings {
    InterpreterSettings {
        program: "sh".to_string(),
        executable: Some(PathBuf::from("/bin/sh")),
        args: vec!["-c".to_string(), FAKE_R.to_string()],
        quit_command: "quit".to_string(),
        terminate_timeout_ms: 500,
        locale: None,
        ..Default::default()
    }
}

struct Harness {
    session: SessionController,
    events: UnboundedReceiver<SessionEvent>,
    seen: Vec<SessionEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(fake_settings())
    }

    fn with_settings(settings: InterpreterSettings) -> Self {
        let (session, events) = SessionController::channel(settings);
        Self {
            session,
            events,
            seen: Vec::new(),
        }
    }

    async fn started() -> Self {
        Self::started_with(fake_settings()).await
    }

    async fn started_with(settings: InterpreterSettings) -> Self {
        let mut harness = Self::with_settings(settings);
        assert!(harness.session.start().await);
        harness
            .run_until(|_, session| session.state() == SessionState::Idle)
            .await;
        harness
    }

    fn collect(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
    }

    /// Events seen so far, leaving the log empty.
    fn take(&mut self) -> Vec<SessionEvent> {
        self.collect();
        std::mem::take(&mut self.seen)
    }

    /// Handle process events until `done` holds or no process is left.
    async fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut(&[SessionEvent], &SessionController) -> bool,
    {
        let result = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                self.collect();
                if done(&self.seen, &self.session) {
                    return;
                }
                if !self.session.next_event().await {
                    self.collect();
                    return;
                }
            }
        })
        .await;
        assert!(result.is_ok(), "timed out, events so far: {:?}", self.seen);
    }

    async fn run_until_finished(&mut self, command: &str) {
        let expected = SessionEvent::CommandFinished(command.to_string());
        self.run_until(|seen, _| seen.contains(&expected)).await;
    }
}

fn finished_commands(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CommandFinished(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_startup_shows_banner_and_prompt() {
    let mut h = Harness::new();
    assert_eq!(h.session.state(), SessionState::NotStarted);
    assert!(h.session.start().await);
    assert_eq!(h.session.state(), SessionState::AwaitingFirstPrompt);
    assert!(h.session.is_running());

    h.run_until(|_, s| s.state() == SessionState::Idle).await;
    let events = h.take();
    assert_eq!(events.first(), Some(&SessionEvent::Started));
    assert_eq!(events.last(), Some(&SessionEvent::Prompt));

    let mut view = ConsoleView::default();
    for event in &events {
        view.apply(event);
    }
    assert_eq!(view.plain_text(), "R fake 1.0\n\n> ");
}

#[tokio::test]
async fn test_visible_command_strips_echo() {
    let mut h = Harness::started().await;
    h.take();

    assert!(h.session.submit("1+1", false).await);
    assert_eq!(h.session.state(), SessionState::Executing { silent: false });
    h.run_until_finished("1+1").await;

    assert_eq!(
        h.take(),
        vec![
            SessionEvent::Output("[1] 2\n".to_string()),
            SessionEvent::Prompt,
            SessionEvent::CommandFinished("1+1".to_string()),
        ]
    );
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_silent_command_shows_nothing() {
    let mut h = Harness::started().await;
    h.take();

    assert!(h.session.submit("x<-5", true).await);
    assert_eq!(h.session.state(), SessionState::Executing { silent: true });
    h.run_until_finished("x<-5").await;

    assert_eq!(
        h.take(),
        vec![SessionEvent::CommandFinished("x<-5".to_string())]
    );
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_commands_finish_in_submission_order() {
    let mut h = Harness::started().await;
    h.take();

    let commands = ["a", "1+1", "x<-5", "b", "c"];
    for (i, command) in commands.iter().enumerate() {
        assert!(h.session.submit(*command, i % 2 == 0).await);
    }
    // One in flight, the rest waiting
    assert_eq!(h.session.pending(), commands.len() - 1);

    h.run_until_finished("c").await;
    assert_eq!(finished_commands(&h.take()), commands);
    assert_eq!(h.session.pending(), 0);
}

#[tokio::test]
async fn test_ansi_sequences_are_removed() {
    let mut h = Harness::started().await;
    h.take();

    h.session.submit("color", false).await;
    h.run_until_finished("color").await;
    assert!(h
        .take()
        .contains(&SessionEvent::Output("[1] \"red\"\n".to_string())));
}

#[tokio::test]
async fn test_form_feed_clears_console() {
    let mut h = Harness::started().await;
    h.take();

    h.session.submit("cls", false).await;
    h.run_until_finished("cls").await;
    assert_eq!(
        h.take(),
        vec![
            SessionEvent::Clear,
            SessionEvent::Output("new\n".to_string()),
            SessionEvent::Prompt,
            SessionEvent::CommandFinished("cls".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_stderr_becomes_error_event() {
    let mut h = Harness::started().await;
    h.take();

    h.session.submit("warn", false).await;
    h.run_until(|seen, _| {
        seen.contains(&SessionEvent::Error("Warning message\n".to_string()))
            && seen.contains(&SessionEvent::CommandFinished("warn".to_string()))
    })
    .await;
}

#[tokio::test]
async fn test_stop_exits_gracefully() {
    let mut h = Harness::started().await;
    h.take();

    h.session.stop().await;
    assert_eq!(
        h.take(),
        vec![SessionEvent::Finished(ExitInfo::exited(0))]
    );
    assert_eq!(h.session.state(), SessionState::Stopped);
    assert!(!h.session.is_running());

    assert!(!h.session.submit("1+1", false).await);
    assert_eq!(
        h.take(),
        vec![SessionEvent::Error("R process is not running.".to_string())]
    );
    assert!(!h.session.next_event().await);
}

#[tokio::test]
async fn test_stop_while_silent_command_runs() {
    let mut h = Harness::started().await;
    h.take();

    assert!(h.session.submit("hang", true).await);
    assert!(h.session.submit("1+1", false).await);
    // Let the stand-in read the command and start sleeping
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.session.pending(), 1);

    let started = std::time::Instant::now();
    h.session.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let events = h.take();
    assert!(matches!(events.last(), Some(SessionEvent::Finished(_))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Output(_))));
    assert_eq!(h.session.pending(), 1);
    assert_eq!(h.session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_crash_reports_error_then_finished() {
    let mut h = Harness::started().await;
    h.take();

    h.session.submit("crash", false).await;
    h.session.submit("1+1", false).await;
    h.run_until(|seen, _| {
        seen.iter()
            .any(|e| matches!(e, SessionEvent::Finished(_)))
    })
    .await;

    let events = h.take();
    let n = events.len();
    assert!(n >= 2);
    assert_eq!(
        events[n - 2],
        SessionEvent::Error("R process crashed: R process crashed with signal: 9".to_string())
    );
    assert_eq!(events[n - 1], SessionEvent::Finished(ExitInfo::signaled(9)));

    // The queue is left for the caller to inspect
    assert_eq!(h.session.pending(), 1);
    assert_eq!(h.session.state(), SessionState::Stopped);

    // Rejected while stopped, without touching the queue
    assert!(!h.session.submit("2+2", false).await);
    assert_eq!(h.session.pending(), 1);
    assert_eq!(
        h.take(),
        vec![SessionEvent::Error("R process is not running.".to_string())]
    );
}

#[tokio::test]
async fn test_stop_after_unhandled_crash_reports_crash() {
    let mut h = Harness::started().await;
    h.take();

    h.session.submit("crash", false).await;
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while h.session.is_running() && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!h.session.is_running());

    // The exit is only noticed here
    h.session.stop().await;
    let events = h.take();
    let n = events.len();
    assert!(n >= 2, "events: {events:?}");
    assert_eq!(
        events[n - 2],
        SessionEvent::Error("R process crashed: R process crashed with signal: 9".to_string())
    );
    assert_eq!(events[n - 1], SessionEvent::Finished(ExitInfo::signaled(9)));
    assert_eq!(h.session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_stop_reports_timeout_when_quit_is_ignored() {
    let settings = InterpreterSettings {
        // Prompts once, then ignores stdin and SIGTERM
        args: vec!["-c".to_string(), "trap '' TERM; printf '> '; sleep 30".to_string()],
        terminate_timeout_ms: 200,
        ..fake_settings()
    };
    let mut h = Harness::started_with(settings).await;
    h.take();

    let started = std::time::Instant::now();
    h.session.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(
        h.take(),
        vec![
            SessionEvent::Error("R process timed out after 200ms".to_string()),
            SessionEvent::Finished(ExitInfo::signaled(9)),
        ]
    );
    assert_eq!(h.session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_restart_replaces_process() {
    let mut h = Harness::started().await;
    h.session.submit("x<-5", true).await;
    let first_id = h.session.session_id();
    let first_pid = h.session.pid();
    h.take();

    assert!(h.session.start().await);
    let events = h.take();
    let n = events.len();
    assert!(n >= 2, "events: {events:?}");
    assert!(matches!(events[n - 2], SessionEvent::Finished(_)));
    assert_eq!(events[n - 1], SessionEvent::Started);

    assert_ne!(h.session.session_id(), first_id);
    assert_ne!(h.session.pid(), first_pid);
    // Restart starts from an empty queue
    assert_eq!(h.session.pending(), 0);

    h.run_until(|_, s| s.state() == SessionState::Idle).await;
    h.session.submit("1+1", false).await;
    h.run_until_finished("1+1").await;
}

#[tokio::test]
async fn test_select_loop_with_recv_process_event() {
    let mut h = Harness::started().await;
    h.take();
    h.session.submit("1+1", false).await;

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = h.session.recv_process_event() => h.session.handle(event).await,
            _ = &mut deadline => panic!("timed out"),
        }
        h.collect();
        if h.seen.contains(&SessionEvent::CommandFinished("1+1".to_string())) {
            break;
        }
    }
}
