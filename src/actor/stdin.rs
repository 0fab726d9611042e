//! Stdin Source
//!
//! Reads newline-delimited JSON build events, one per compilation:
//!
//! ```text
//! {"mode":"development","changedFiles":[{"path":"content.js","kind":"script"}]}
//! ```
//!
//! Malformed lines are reported and skipped. End of input ends the source.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;

use super::messages::SessionMsg;
use crate::core::BuildEvent;

const SOURCE: &str = "stdin";

/// Build events from a line-oriented reader.
pub struct StdinSource<R> {
    reader: R,
    session_tx: mpsc::Sender<SessionMsg>,
}

impl StdinSource<BufReader<Stdin>> {
    /// Read from the process's standard input.
    pub fn stdin(session_tx: mpsc::Sender<SessionMsg>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), session_tx)
    }
}

impl<R: AsyncBufRead + Unpin> StdinSource<R> {
    pub fn new(reader: R, session_tx: mpsc::Sender<SessionMsg>) -> Self {
        Self { reader, session_tx }
    }

    pub async fn run(self) {
        let mut lines = self.reader.lines();
        let mut line_no = 0usize;

        let error = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break None,
                Err(e) => break Some(e.to_string()),
            };
            line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let event: BuildEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    crate::log!("source"; "line {}: invalid build event: {}", line_no, e);
                    continue;
                }
            };
            if event.changed_files.is_empty() {
                crate::debug!("source"; "line {}: no changed files", line_no);
                continue;
            }
            if self.session_tx.send(SessionMsg::Build(event)).await.is_err() {
                return;
            }
        };

        let _ = self
            .session_tx
            .send(SessionMsg::SourceEnded {
                source: SOURCE,
                error,
            })
            .await;
    }
}
