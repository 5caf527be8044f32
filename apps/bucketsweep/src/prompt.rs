//! Interactive confirmation on the terminal.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use bucketsweep_core::{Confirm, ConfirmationRequest};

/// Asks `[y/N]` on stderr and reads the answer from stdin.
///
/// One buffered reader serves every pass, so piped answers are consumed a
/// line at a time. Cancellation while waiting for an answer counts as "no".
#[derive(Debug)]
pub struct StdinConfirm<R = BufReader<Stdin>> {
    input: Mutex<R>,
    cancel: CancellationToken,
}

impl StdinConfirm {
    /// Create a prompt that gives up when `cancel` fires.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()), cancel)
    }
}

impl<R> StdinConfirm<R> {
    /// Read answers from `input` instead of stdin.
    #[must_use]
    pub fn with_input(input: R, cancel: CancellationToken) -> Self {
        Self {
            input: Mutex::new(input),
            cancel,
        }
    }
}

#[async_trait]
impl<R> Confirm for StdinConfirm<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm(&self, request: &ConfirmationRequest<'_>) -> bool {
        let mut stderr = tokio::io::stderr();
        let prompt = prompt_text(request);
        if let Err(e) = stderr.write_all(prompt.as_bytes()).await {
            warn!(error = %e, "failed to write confirmation prompt");
            return false;
        }
        if let Err(e) = stderr.flush().await {
            warn!(error = %e, "failed to flush confirmation prompt");
        }

        let mut line = String::new();
        let mut input = self.input.lock().await;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            read = input.read_line(&mut line) => match read {
                Ok(0) => false,
                Ok(_) => parse_answer(&line),
                Err(e) => {
                    warn!(error = %e, "failed to read confirmation answer");
                    false
                }
            },
        }
    }
}

/// The question shown before a destructive pass.
#[must_use]
pub fn prompt_text(request: &ConfirmationRequest<'_>) -> String {
    let pass = if request.pass > 1 {
        format!("[pass {}] ", request.pass)
    } else {
        String::new()
    };
    format!(
        "{pass}About to permanently delete {} objects (and skip {} locked objects) from '{}'. \
         Proceed? [y/N]: ",
        request.deletable,
        request.locked.len(),
        request.bucket
    )
}

/// Only an explicit yes approves.
#[must_use]
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
