//! Batched command execution.
//!
//! A [`Pipeline`] collects commands and sends them in one write, then reads
//! exactly one reply per command. Replies come back in send order; an error
//! reply for one command is returned in its slot and does not affect the
//! others.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::resp::{Command, Reply};
use tracing::debug;

/// A queue of commands executed together.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command.
    pub fn cmd(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Send every queued command and read one reply for each. Error
    /// replies stay in their slots as [`Reply::Error`].
    ///
    /// The queue is kept, so the same pipeline can run again.
    pub fn execute(&self, conn: &mut Connection) -> Result<Vec<Reply>> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }
        conn.send_pipeline(&self.commands)?;
        let replies = conn.read_n(self.commands.len())?;
        debug!(conn = %conn, commands = replies.len(), "Pipeline complete");
        Ok(replies)
    }

    /// Like [`execute`](Self::execute), but the first error reply becomes
    /// `Err(Error::Reply)`. All replies are read before returning, so the
    /// connection stays in step.
    pub fn execute_checked(&self, conn: &mut Connection) -> Result<Vec<Reply>> {
        self.execute(conn)?
            .into_iter()
            .map(Reply::into_result)
            .collect::<std::result::Result<Vec<_>, Error>>()
    }
}

impl FromIterator<Command> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}
