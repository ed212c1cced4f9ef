//! Terminal commands
//!
//! Each input line is either a slash command or the text of a new reminder.
//! A leading `//` stands for a literal `/` so reminders can start with one.

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: create a reminder. May be blank.
    Create(String),
    Delete(String),
    TestNotification,
    List,
    Status,
    Clock,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if let Some(escaped) = trimmed.strip_prefix("//") {
            return Command::Create(format!("/{}", escaped));
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Create(line.to_string());
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        match (name.as_str(), arg) {
            ("del" | "delete" | "rm", id) if !id.is_empty() => Command::Delete(id.to_string()),
            ("test", "") => Command::TestNotification,
            ("list" | "ls", "") => Command::List,
            ("status", "") => Command::Status,
            ("clock" | "time", "") => Command::Clock,
            ("help" | "?", "") => Command::Help,
            ("quit" | "exit" | "q", "") => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        }
    }
}

pub const HELP: &str = "\
Type a message and press Enter to set a reminder.
Start it with // to begin the reminder with a literal /.
  /del <id>   delete a reminder
  /test       show a test notification
  /list       show reminders
  /status     show connection status
  /clock      show the clock
  /quit       exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_creates() {
        assert_eq!(Command::parse("Lunch time"), Command::Create("Lunch time".to_string()));
        assert_eq!(Command::parse("   "), Command::Create("   ".to_string()));
        assert_eq!(Command::parse(""), Command::Create(String::new()));
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(Command::parse("/del abc-123"), Command::Delete("abc-123".to_string()));
        assert_eq!(Command::parse("  /DELETE  abc "), Command::Delete("abc".to_string()));
        assert_eq!(Command::parse("/test"), Command::TestNotification);
        assert_eq!(Command::parse("/list"), Command::List);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/clock"), Command::Clock);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/quit"), Command::Quit);
    }

    #[test]
    fn test_double_slash_escapes() {
        assert_eq!(Command::parse("//2 cups flour"), Command::Create("/2 cups flour".to_string()));
        assert_eq!(Command::parse("  //quit "), Command::Create("/quit".to_string()));
        assert_eq!(Command::parse("//"), Command::Create("/".to_string()));
    }

    #[test]
    fn test_unknown_and_incomplete() {
        assert_eq!(Command::parse("/del"), Command::Unknown("/del".to_string()));
        assert_eq!(Command::parse("/frobnicate"), Command::Unknown("/frobnicate".to_string()));
        assert_eq!(Command::parse("/list all"), Command::Unknown("/list all".to_string()));
    }
}
