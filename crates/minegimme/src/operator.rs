//! Operator input: slash commands for the console itself, anything else goes
//! to the server as a console command.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    Stop,
    Restart,
    /// Print the current server snapshot
    Status,
    /// List a directory of the file mirror; the root when empty
    List(String),
    /// Print a text file, read-only
    Cat(String),
    /// Print console records matching a query
    Filter(String),
    /// Write the console transcript to a local file
    Export(PathBuf),
    Help,
    Quit,
    /// Forwarded verbatim as a server console command
    Send(String),
}

pub const HELP: &str = "\
/start | /stop | /restart   lifecycle actions
/status                     current server snapshot
/ls [dir]                   list files
/cat <path>                 print a text file
/filter <text>              search the console log
/export <file>              save the console transcript
/quit                       close the session
anything else               sent to the server console";

impl OperatorCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Send(line.to_string())));
        };

        let (verb, arg) = match rest.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (rest, ""),
        };

        let command = match verb {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "restart" => Self::Restart,
            "status" => Self::Status,
            "ls" => Self::List(arg.to_string()),
            "cat" if !arg.is_empty() => Self::Cat(arg.to_string()),
            "cat" => return Err("usage: /cat <path>".to_string()),
            "filter" => Self::Filter(arg.to_string()),
            "export" if !arg.is_empty() => Self::Export(PathBuf::from(arg)),
            "export" => return Err("usage: /export <file>".to_string()),
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '/{other}', try /help")),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            OperatorCommand::parse("  say hello world ").unwrap(),
            Some(OperatorCommand::Send("say hello world".into()))
        );
        assert_eq!(OperatorCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(OperatorCommand::parse("/start").unwrap(), Some(OperatorCommand::Start));
        assert_eq!(
            OperatorCommand::parse("/ls").unwrap(),
            Some(OperatorCommand::List(String::new()))
        );
        assert_eq!(
            OperatorCommand::parse("/ls plugins/Essentials").unwrap(),
            Some(OperatorCommand::List("plugins/Essentials".into()))
        );
        assert_eq!(
            OperatorCommand::parse("/export logs/session.txt").unwrap(),
            Some(OperatorCommand::Export(PathBuf::from("logs/session.txt")))
        );
        assert_eq!(OperatorCommand::parse("/exit").unwrap(), Some(OperatorCommand::Quit));
    }

    #[test]
    fn test_usage_errors() {
        assert!(OperatorCommand::parse("/cat").is_err());
        assert!(OperatorCommand::parse("/export   ").is_err());
        assert!(OperatorCommand::parse("/teleport 0 0 0").unwrap_err().contains("unknown"));
    }
}
