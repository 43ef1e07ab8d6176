//! Yes/no confirmation used when two routes share a match pattern.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::warn;

/// Asks the operator a yes/no question.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Accepts `y` or `yes` in any case.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

type AnswerLines = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Prompt on stdout, answer read from stdin.
///
/// One buffered reader serves every question so piped answers are not lost
/// between prompts.
pub struct StdinPrompt {
    answers: Mutex<AnswerLines>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read answers from any line source instead of stdin.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            answers: Mutex::new(BufReader::new(reader).lines()),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StdinPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinPrompt").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfirmPrompt for StdinPrompt {
    async fn confirm(&self, question: &str) -> bool {
        let mut answers = self.answers.lock().await;

        let mut stdout = tokio::io::stdout();
        if let Err(e) = async {
            stdout.write_all(question.as_bytes()).await?;
            stdout.write_all(b" ").await?;
            stdout.flush().await
        }
        .await
        {
            warn!(error = %e, "Failed to write prompt");
        }

        match answers.next_line().await {
            Ok(Some(line)) => is_affirmative(&line),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read prompt answer");
                false
            }
        }
    }
}

/// Prompt with a preset answer, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl ConfirmPrompt for FixedAnswer {
    async fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}
