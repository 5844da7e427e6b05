//! Non-blocking sources of operator commands, polled once per tick.

use crate::input::{parse_line, CommandToken};
use heapless::spsc::Queue;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Upper bound on tokens drained from a channel in a single tick.
pub const MAX_COMMANDS_PER_TICK: usize = 64;
const QUEUE_CAPACITY: usize = 32;

pub trait CommandSource {
    /// Returns immediately with whatever arrived since the last poll.
    fn poll_commands(&mut self) -> alloc::vec::Vec<CommandToken>;
}

/// Drains tokens pushed by reader tasks (stdin, TCP clients, Ctrl-C).
#[derive(Debug)]
pub struct ChannelCommandSource {
    rx: mpsc::Receiver<CommandToken>,
    disconnected: bool,
}

impl ChannelCommandSource {
    pub fn new(rx: mpsc::Receiver<CommandToken>) -> Self {
        Self {
            rx,
            disconnected: false,
        }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<CommandToken>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl CommandSource for ChannelCommandSource {
    fn poll_commands(&mut self) -> alloc::vec::Vec<CommandToken> {
        let mut tokens = alloc::vec::Vec::new();
        while tokens.len() < MAX_COMMANDS_PER_TICK {
            match self.rx.try_recv() {
                Ok(token) => tokens.push(token),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        debug!("All command producers have gone away");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        tokens
    }
}

/// Fixed-capacity queue filled directly by the caller; used for scripted runs.
pub struct ScriptedCommandSource {
    queue: Queue<CommandToken, QUEUE_CAPACITY>,
}

impl ScriptedCommandSource {
    pub fn new() -> Self {
        Self { queue: Queue::new() }
    }

    /// Hands the token back when the queue is full.
    pub fn push(&mut self, token: CommandToken) -> Result<(), CommandToken> {
        self.queue.enqueue(token)
    }

    pub fn push_all(&mut self, tokens: &[CommandToken]) -> Result<(), CommandToken> {
        for &token in tokens {
            self.push(token)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for ScriptedCommandSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSource for ScriptedCommandSource {
    fn poll_commands(&mut self) -> alloc::vec::Vec<CommandToken> {
        let mut tokens = alloc::vec::Vec::with_capacity(self.queue.len());
        while let Some(token) = self.queue.dequeue() {
            tokens.push(token);
        }
        tokens
    }
}

/// Forwards operator input lines from stdin until EOF or the receiver closes.
pub async fn forward_stdin(tx: mpsc::Sender<CommandToken>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                for token in parse_line(&line) {
                    if tx.send(token).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                debug!("stdin closed");
                return;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return;
            }
        }
    }
}

/// Decodes one line received from a remote client: a JSON token such as
/// `"Accelerate"`, or raw keys otherwise.
pub fn parse_remote_line(line: &str) -> alloc::vec::Vec<CommandToken> {
    let trimmed = line.trim();
    if trimmed.starts_with('"') {
        if let Ok(token) = serde_json::from_str::<CommandToken>(trimmed) {
            return alloc::vec![token];
        }
    }
    if trimmed.starts_with('[') {
        if let Ok(tokens) = serde_json::from_str::<alloc::vec::Vec<CommandToken>>(trimmed) {
            return tokens;
        }
    }
    parse_line(line)
}
