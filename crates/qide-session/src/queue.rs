//! FIFO queue of commands waiting for the interpreter.

use std::collections::VecDeque;

use qide_core::PendingCommand;

/// Pending commands in submission order.
///
/// No deduplication and no size bound. Owned by the session controller and
/// never shared between threads.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<PendingCommand>,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn enqueue(&mut self, text: impl Into<String>, silent: bool) {
        self.push(PendingCommand::new(text, silent));
    }

    /// Append an already built command.
    pub fn push(&mut self, command: PendingCommand) {
        self.commands.push_back(command);
    }

    /// Put a command that could not be dispatched back at the head.
    pub fn requeue_front(&mut self, command: PendingCommand) {
        self.commands.push_front(command);
    }

    /// Remove and return the oldest command.
    pub fn dequeue_next(&mut self) -> Option<PendingCommand> {
        self.commands.pop_front()
    }

    /// Whether no command is waiting.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of waiting commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Drop all waiting commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
