//! Terminal command grammar.

use std::path::PathBuf;

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  user <name>                    set your display name
  open <file.pdf>                load a PDF and join its room
  next | prev | page <n>         move between pages
  show                           print the current page
  annotate <selected> | <note>   annotate text on the current page
  annotations                    list annotations for the current page
  chat <message>                 send a chat message
  history                        print the chat log
  search <keywords>              find keywords across all pages
  translate <lang> [text]        translate text (default: current page)
  speak [text]                   read text aloud (default: current page)
  summarize [all]                summarize the current page or whole document
  notices                        show pending notices
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryScope {
    Page,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    User(String),
    Open(PathBuf),
    Next,
    Prev,
    /// 1-based page number as typed
    Page(usize),
    Show,
    Annotate { selected: String, note: String },
    Annotations,
    Chat(String),
    History,
    Search(String),
    Translate { target: String, text: Option<String> },
    Speak(Option<String>),
    Summarize(SummaryScope),
    Notices,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a page number")]
    InvalidPage(String),
}

fn required(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn optional(rest: &str) -> Option<String> {
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "user" => Command::User(required(rest, "user <name>")?),
        "open" => Command::Open(PathBuf::from(required(rest, "open <file.pdf>")?)),
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "page" => {
            let arg = required(rest, "page <n>")?;
            let number = arg
                .parse::<usize>()
                .map_err(|_| CommandError::InvalidPage(arg.clone()))?;
            Command::Page(number)
        }
        "show" => Command::Show,
        "annotate" => {
            let usage = "annotate <selected text> | <annotation>";
            let (selected, note) = rest.split_once('|').ok_or(CommandError::Usage(usage))?;
            Command::Annotate {
                selected: selected.trim().to_string(),
                note: note.trim().to_string(),
            }
        }
        "annotations" => Command::Annotations,
        "chat" | "say" => Command::Chat(required(rest, "chat <message>")?),
        "history" => Command::History,
        "search" | "find" => Command::Search(required(rest, "search <keywords>")?),
        "translate" => {
            let usage = "translate <lang> [text]";
            let (target, text) = match rest.split_once(char::is_whitespace) {
                Some((target, text)) => (target, optional(text.trim())),
                None => (rest, None),
            };
            Command::Translate {
                target: required(target, usage)?.to_ascii_lowercase(),
                text,
            }
        }
        "speak" => Command::Speak(optional(rest)),
        "summarize" | "summary" => match rest {
            "" | "page" => Command::Summarize(SummaryScope::Page),
            "all" | "document" => Command::Summarize(SummaryScope::Document),
            _ => return Err(CommandError::Usage("summarize [all]")),
        },
        "notices" => Command::Notices,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(line: &str) -> Command {
        parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_navigation() {
        assert_eq!(ok("next"), Command::Next);
        assert_eq!(ok("P"), Command::Prev);
        assert_eq!(ok("page 3"), Command::Page(3));
        assert_eq!(parse("page three"), Err(CommandError::InvalidPage("three".into())));
        assert_eq!(parse("page"), Err(CommandError::Usage("page <n>")));
    }

    #[test]
    fn test_annotate_splits_on_bar() {
        assert_eq!(
            ok("annotate the quick fox | nice imagery"),
            Command::Annotate {
                selected: "the quick fox".into(),
                note: "nice imagery".into(),
            }
        );
        // Empty halves are left for session validation
        assert_eq!(
            ok("annotate | note"),
            Command::Annotate {
                selected: String::new(),
                note: "note".into(),
            }
        );
        assert!(matches!(parse("annotate no separator"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_chat_keeps_message_text() {
        assert_eq!(ok("chat  hello  there "), Command::Chat("hello  there".into()));
        assert!(parse("chat").is_err());
    }

    #[test]
    fn test_translate() {
        assert_eq!(
            ok("translate FR good morning"),
            Command::Translate {
                target: "fr".into(),
                text: Some("good morning".into()),
            }
        );
        assert_eq!(
            ok("translate es"),
            Command::Translate {
                target: "es".into(),
                text: None,
            }
        );
        assert!(parse("translate").is_err());
    }

    #[test]
    fn test_summarize_scope() {
        assert_eq!(ok("summarize"), Command::Summarize(SummaryScope::Page));
        assert_eq!(ok("summarize all"), Command::Summarize(SummaryScope::Document));
        assert!(parse("summarize everything").is_err());
    }

    #[test]
    fn test_unknown() {
        assert_eq!(parse("dance"), Err(CommandError::Unknown("dance".into())));
    }

    #[test]
    fn test_open_and_user() {
        assert_eq!(ok("open papers/a b.pdf"), Command::Open(PathBuf::from("papers/a b.pdf")));
        assert_eq!(ok("user  sam"), Command::User("sam".into()));
        assert_eq!(ok("speak"), Command::Speak(None));
        assert_eq!(ok("quit"), Command::Quit);
    }
}
