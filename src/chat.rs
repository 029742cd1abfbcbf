//! Interactive chat loop.
//!
//! Reads one line at a time and forwards it to a [`ChatSession`]. Typing
//! `exit` or `quit` (any case) or closing stdin ends the loop. A failed
//! exchange is reported and the loop keeps reading.

use crate::gemini::ChatSession;
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Words that end the chat session.
pub const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

const USER_PROMPT: &str = "\nAsk Gemini > ";
const REPLY_PREFIX: &str = "Gemini > ";

/// True if the line is one of the exit commands.
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    EXIT_COMMANDS.iter().any(|cmd| line.eq_ignore_ascii_case(cmd))
}

/// Run the loop until an exit command or end of input.
///
/// Returns the number of successful exchanges.
pub async fn run_chat_loop<S, R, W>(session: &mut S, input: &mut R, output: &mut W) -> Result<usize>
where
    S: ChatSession,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut exchanges = 0;
    let mut buf = Vec::new();

    loop {
        write!(output, "{}", USER_PROMPT)?;
        output.flush()?;

        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("End of input, leaving chat");
                writeln!(output)?;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read chat input: {}", e);
                writeln!(output, "Error during chat interaction: {}", e)?;
                continue;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let message = line.trim_end_matches(['\n', '\r']);
        if is_exit_command(message) {
            break;
        }

        match session.send_message(message).await {
            Ok(reply) => {
                writeln!(output, "{}{}", REPLY_PREFIX, reply)?;
                exchanges += 1;
            }
            Err(e) => {
                warn!("Chat exchange failed: {}", e);
                writeln!(output, "Error during chat interaction: {}", e)?;
            }
        }
    }

    Ok(exchanges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use crate::models::PromptFeedback;
    use tokio::io::BufReader;

    /// Echoes messages back; fails on "boom".
    #[derive(Default)]
    struct EchoSession {
        received: Vec<String>,
    }

    impl ChatSession for EchoSession {
        async fn send_message(&mut self, text: &str) -> Result<String, GeminiError> {
            self.received.push(text.to_string());
            if text == "boom" {
                Err(GeminiError::Blocked(PromptFeedback::default()))
            } else {
                Ok(format!("echo: {}", text))
            }
        }
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("  Exit  "));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command(""));
    }

    #[tokio::test]
    async fn test_exit_terminates_loop() {
        let mut session = EchoSession::default();
        let mut input = tokio_test::io::Builder::new()
            .read(b"what is xcsset?\n")
            .read(b"exit\n")
            .build();
        let mut input = BufReader::new(&mut input);
        let mut output = Vec::new();

        let exchanges = run_chat_loop(&mut session, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(exchanges, 1);
        assert_eq!(session.received, vec!["what is xcsset?"]);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Ask Gemini > "));
        assert!(shown.contains("Gemini > echo: what is xcsset?"));
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_loop() {
        let mut session = EchoSession::default();
        let mut input: &[u8] = b"boom\nstill here\r\nQuit\nnever sent\n";
        let mut output = Vec::new();

        let exchanges = run_chat_loop(&mut session, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(exchanges, 1);
        assert_eq!(session.received, vec!["boom", "still here"]);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Error during chat interaction"));
        assert!(shown.contains("echo: still here"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_loop() {
        let mut session = EchoSession::default();
        let mut input: &[u8] = b"caf\xe9\nstill here\nexit\n";
        let mut output = Vec::new();

        let exchanges = run_chat_loop(&mut session, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(exchanges, 2);
        assert_eq!(session.received, vec!["caf\u{FFFD}", "still here"]);
    }

    #[tokio::test]
    async fn test_read_error_does_not_stop_loop() {
        let mut session = EchoSession::default();
        let mut input = tokio_test::io::Builder::new()
            .read_error(std::io::Error::other("tty hiccup"))
            .read(b"hello\n")
            .read(b"quit\n")
            .build();
        let mut input = BufReader::new(&mut input);
        let mut output = Vec::new();

        let exchanges = run_chat_loop(&mut session, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(exchanges, 1);
        assert_eq!(session.received, vec!["hello"]);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Error during chat interaction: tty hiccup"));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_loop() {
        let mut session = EchoSession::default();
        let mut input: &[u8] = b"hello\n";
        let mut output = Vec::new();

        let exchanges = run_chat_loop(&mut session, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(exchanges, 1);
    }
}
