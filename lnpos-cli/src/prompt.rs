//! Terminal PIN prompt

use async_trait::async_trait;
use lnpos_storage::{PinEntry, PinPrompt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Reads PINs from standard input. An empty line cancels.
#[derive(Debug)]
pub struct TerminalPrompt {
    input: Mutex<BufReader<Stdin>>,
}

impl TerminalPrompt {
    /// Prompt on the process terminal
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    /// Ask for one line, `None` on EOF or an empty answer
    pub async fn read_secret(&self, label: &str) -> Option<Zeroizing<String>> {
        let mut stderr = tokio::io::stderr();
        if stderr.write_all(label.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return None;
        }

        let mut line = Zeroizing::new(String::new());
        let mut input = self.input.lock().await;
        match input.read_line(&mut *line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let entered = Zeroizing::new(line.trim().to_string());
                (!entered.is_empty()).then_some(entered)
            }
        }
    }
}

#[async_trait]
impl PinPrompt for TerminalPrompt {
    async fn request_pin(&self) -> PinEntry {
        match self.read_secret("PIN: ").await {
            Some(pin) => PinEntry::Submitted(pin),
            None => PinEntry::Cancelled,
        }
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn show_warning(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}
