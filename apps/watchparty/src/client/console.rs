use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::upload::ALLOWED_EXTENSIONS;

/// A line typed at the terminal client.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Join,
    Play,
    Pause,
    Seek(f64),
    Upload(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'; type 'help'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a position in seconds")]
    InvalidSeconds(String),
}

impl FromStr for ConsoleCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb.to_ascii_lowercase().as_str() {
            "" => Err(CommandParseError::Empty),
            "join" | "j" => Ok(ConsoleCommand::Join),
            "play" | "p" => Ok(ConsoleCommand::Play),
            "pause" => Ok(ConsoleCommand::Pause),
            "seek" | "s" => {
                if rest.is_empty() {
                    return Err(CommandParseError::MissingArgument("seek"));
                }
                match rest.parse::<f64>() {
                    Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                        Ok(ConsoleCommand::Seek(seconds))
                    }
                    _ => Err(CommandParseError::InvalidSeconds(rest.to_string())),
                }
            }
            "upload" | "u" => {
                if rest.is_empty() {
                    return Err(CommandParseError::MissingArgument("upload"));
                }
                Ok(ConsoleCommand::Upload(PathBuf::from(rest)))
            }
            "status" => Ok(ConsoleCommand::Status),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

pub fn help_text() -> String {
    format!(
        "commands:\n  \
         join            start watching (unlocks playback)\n  \
         play | pause    drive playback (controller only)\n  \
         seek <seconds>  jump to a position (controller only)\n  \
         upload <path>   share a video ({})\n  \
         status          show connection, role and player state\n  \
         quit            leave",
        ALLOWED_EXTENSIONS.join(", ")
    )
}

/// Reads stdin line by line until EOF. Unparseable lines are reported and
/// skipped.
pub fn spawn_reader(commands: UnboundedSender<ConsoleCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Err(CommandParseError::Empty) => {}
                    Err(err) => eprintln!("⚠️  {err}"),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(err) => {
                    debug!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!("join".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Join));
        assert_eq!("  SEEK 42.5 ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Seek(42.5)));
        assert_eq!(
            "upload ~/Movies/clip one.mp4".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Upload(PathBuf::from("~/Movies/clip one.mp4")))
        );
        assert_eq!("q".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<ConsoleCommand>(), Err(CommandParseError::Empty));
        assert_eq!(
            "seek".parse::<ConsoleCommand>(),
            Err(CommandParseError::MissingArgument("seek"))
        );
        assert_eq!(
            "seek -3".parse::<ConsoleCommand>(),
            Err(CommandParseError::InvalidSeconds("-3".into()))
        );
        assert!(matches!(
            "dance".parse::<ConsoleCommand>(),
            Err(CommandParseError::Unknown(_))
        ));
    }
}
