//! Property tests for prompt detection and echo stripping.

use proptest::prelude::*;

use qide_core::PendingCommand;
use qide_session::{FramerEvent, OutputFramer};

/// One visible command and the lines it prints.
fn command_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        "[a-z0-9+]{1,8}",
        proptest::collection::vec("[a-z0-9 \\[\\]\"]{0,12}", 0..4),
    )
}

/// A command, its output lines, and whether the echo repeats the prompt.
fn echoed_command_strategy() -> impl Strategy<Value = (String, Vec<String>, bool)> {
    (command_strategy(), any::<bool>()).prop_map(|((command, lines), prompt_echo)| {
        (command, lines, prompt_echo)
    })
}

/// Split `text` into chunks at the given cut points.
fn chunks(text: &str, cuts: &[usize]) -> Vec<String> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (text.len() + 1)).collect();
    points.push(0);
    points.push(text.len());
    points.sort_unstable();
    points.dedup();
    points
        .windows(2)
        .map(|w| text[w[0]..w[1]].to_string())
        .collect()
}

fn ready_framer() -> OutputFramer {
    let mut framer = OutputFramer::new("> ");
    framer.reset();
    let events = framer.push_stdout("R banner\n> ");
    assert!(events.contains(&FramerEvent::Ready));
    framer
}

proptest! {
    /// Display text, prompts and completions do not depend on how the
    /// interpreter's output is chunked.
    #[test]
    fn visible_output_is_chunking_invariant(
        commands in proptest::collection::vec(echoed_command_strategy(), 1..5),
        cuts in proptest::collection::vec(0usize..200, 0..6),
    ) {
        let mut framer = ready_framer();
        let mut shown = String::new();
        let mut prompts = 0;
        let mut finished = Vec::new();

        for (command, lines, prompt_echo) in &commands {
            framer.begin(PendingCommand::visible(command.clone())).unwrap();

            let output: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let echo = if *prompt_echo { "> " } else { "" };
            let transcript = format!("{echo}{command}\n{output}> ");
            for chunk in chunks(&transcript, &cuts) {
                for event in framer.push_stdout(&chunk) {
                    match event {
                        FramerEvent::Output(text) => shown.push_str(&text),
                        FramerEvent::Prompt => prompts += 1,
                        FramerEvent::CommandFinished(text) => finished.push(text),
                        other => prop_assert!(false, "unexpected event {:?}", other),
                    }
                }
            }
            prop_assert!(framer.is_idle());
        }

        let expected: String = commands
            .iter()
            .flat_map(|(_, lines, _)| lines.iter().map(|l| format!("{l}\n")))
            .collect();
        let submitted: Vec<String> = commands.iter().map(|(c, _, _)| c.clone()).collect();

        prop_assert_eq!(shown, expected);
        prop_assert_eq!(prompts, commands.len());
        prop_assert_eq!(finished, submitted);
    }

    /// A silent command completes exactly once and shows nothing.
    #[test]
    fn silent_completion_is_chunking_invariant(
        (command, lines) in command_strategy(),
        cuts in proptest::collection::vec(0usize..200, 0..6),
    ) {
        let mut framer = ready_framer();
        framer.begin(PendingCommand::silent(command.clone())).unwrap();

        let output: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let transcript = format!("{command}\n{output}> ");

        let mut events = Vec::new();
        for chunk in chunks(&transcript, &cuts) {
            events.extend(framer.push_stdout(&chunk));
        }

        prop_assert_eq!(events, vec![FramerEvent::CommandFinished(command)]);
        prop_assert!(framer.is_idle());
    }
}
