//! Line-oriented operator input.

use std::io::{self, BufRead, Write};

/// Asks the operator a question and returns the raw answer.
pub trait Prompt {
    fn prompt(&mut self, text: &str) -> io::Result<String>;
}

/// Reads answers from standard input.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn prompt(&mut self, text: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{text}")?;
        stdout.flush()?;

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed before a choice was made",
            ));
        }
        Ok(answer)
    }
}
