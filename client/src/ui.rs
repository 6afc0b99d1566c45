use std::io::{self, BufRead, Write};
use zsm_common::Identity;

/// A parsed line of user input (§4.4 `[NEW]` terminal UI).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendCommand {
    pub target: String,
    pub text: String,
}

/// The client's UI boundary (§4.4 `[NEW]`): `ClientSession` renders through
/// this trait and reads commands from it, so the default terminal front end
/// can be replaced without touching the send/receive paths.
pub trait Ui {
    fn render_message(&mut self, sender_label: &str, timestamp: u64, text: &str);
    fn set_status(&mut self, status: &str);
    fn select_conversation(&mut self, peer: &Identity);
    /// Blocks for the next `/to <hex-or-nickname> <text>` line from the
    /// operator. Returns `None` on EOF (stdin closed).
    fn read_command(&mut self) -> Option<SendCommand>;
}

/// Default [`Ui`]: reads `/to <hex-or-nickname> <text>` lines from stdin and
/// prints `[<timestamp>] <sender>: <text>` to stdout (§4.4). No curses
/// dependency — matches the rest of the pack in reaching for the plainest
/// tool that does the job.
pub struct LineUi {
    stdin: io::BufReader<io::Stdin>,
    selected: Option<Identity>,
}

impl LineUi {
    pub fn new() -> Self {
        LineUi { stdin: io::BufReader::new(io::stdin()), selected: None }
    }
}

impl Default for LineUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for LineUi {
    fn render_message(&mut self, sender_label: &str, timestamp: u64, text: &str) {
        println!("[{timestamp}] {sender_label}: {text}");
        let _ = io::stdout().flush();
    }

    fn set_status(&mut self, status: &str) {
        eprintln!("-- {status}");
    }

    fn select_conversation(&mut self, peer: &Identity) {
        self.selected = Some(*peer);
    }

    fn read_command(&mut self) -> Option<SendCommand> {
        loop {
            let mut line = String::new();
            let read = self.stdin.read_line(&mut line).ok()?;
            if read == 0 {
                return None;
            }
            match Self::parse_command(&line) {
                Ok(Some(command)) => return Some(command),
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("-- {message}");
                    continue;
                }
            }
        }
    }
}

impl LineUi {
    /// Parses one line of input into a [`SendCommand`], `Ok(None)` for a
    /// blank line, or `Err` with a usage message. Factored out of
    /// [`Ui::read_command`] as a pure function so the grammar can be unit
    /// tested without a real stdin.
    pub fn parse_command(line: &str) -> Result<Option<SendCommand>, &'static str> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix("/to ") else {
            return Err("unrecognised command, expected: /to <hex-or-nickname> <text>");
        };
        let rest = rest.trim_start();
        let Some((target, text)) = rest.split_once(' ') else {
            return Err("usage: /to <hex-or-nickname> <text>");
        };
        if text.is_empty() {
            return Err("usage: /to <hex-or-nickname> <text>");
        }
        Ok(Some(SendCommand { target: target.to_string(), text: text.to_string() }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_message_does_not_panic() {
        let mut ui = LineUi::new();
        ui.render_message("alice", 1_700_000_000, "hi");
        ui.set_status("connected");
        ui.select_conversation(&Identity::from_bytes([1u8; 32]));
    }

    #[test]
    fn parses_a_well_formed_to_command() {
        let command = LineUi::parse_command("/to bob hello there\n").unwrap().unwrap();
        assert_eq!(command.target, "bob");
        assert_eq!(command.text, "hello there");
    }

    #[test]
    fn blank_line_parses_to_nothing() {
        assert_eq!(LineUi::parse_command("   \n").unwrap(), None);
    }

    #[test]
    fn rejects_unrecognised_commands() {
        assert!(LineUi::parse_command("hello\n").is_err());
    }
}
