//! Slash commands typed into a running session.
//!
//! Anything not starting with `/` is a chat message.

use serde_json::Value;

use crate::config::parse_flag;

pub const HELP: &str = "\
/approve <id>              approve a pending tool call
/reject <id> [reason]      reject a pending tool call
/edit <id> <json>          replace the arguments of a pending tool call
/accept [field=value ...]  answer the active elicitation
/decline                   decline the active elicitation
/cancel                    cancel the active elicitation
/answer <text>             answer the agent's question
/stop                      stop the agent run
/agent on|off              toggle agent mode
/autoapprove on|off        toggle auto-approval
/attach <file-id> <text>   send a message with a file
/retry <client-id>         resend a message that was not sent
/reconnect                 reconnect now
/status                    show connection and pending items
/quit                      save and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Message(String),
    Approve(String),
    Reject { id: String, reason: String },
    Edit { id: String, arguments: Value },
    Accept(Vec<(String, String)>),
    Decline,
    Cancel,
    Answer(String),
    Stop,
    Agent(bool),
    AutoApprove(bool),
    Attach { file_id: String, text: String },
    Retry(String),
    Reconnect,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Message(line.to_string())));
    };

    let (name, args) = split_word(rest);
    let command = match name {
        "approve" => Command::Approve(required(args, "/approve <id>")?),
        "reject" => {
            let (id, reason) = split_word(args);
            if id.is_empty() {
                return Err("usage: /reject <id> [reason]".to_string());
            }
            Command::Reject {
                id: id.to_string(),
                reason: reason.to_string(),
            }
        }
        "edit" => {
            let (id, json) = split_word(args);
            if id.is_empty() || json.is_empty() {
                return Err("usage: /edit <id> <json>".to_string());
            }
            let arguments =
                serde_json::from_str(json).map_err(|e| format!("invalid JSON arguments: {}", e))?;
            Command::Edit {
                id: id.to_string(),
                arguments,
            }
        }
        "accept" => Command::Accept(parse_pairs(args)?),
        "decline" => Command::Decline,
        "cancel" => Command::Cancel,
        "answer" => Command::Answer(required(args, "/answer <text>")?),
        "stop" => Command::Stop,
        "agent" => Command::Agent(on_off(args, "/agent on|off")?),
        "autoapprove" => Command::AutoApprove(on_off(args, "/autoapprove on|off")?),
        "attach" => {
            let (file_id, text) = split_word(args);
            if file_id.is_empty() {
                return Err("usage: /attach <file-id> <text>".to_string());
            }
            Command::Attach {
                file_id: file_id.to_string(),
                text: text.to_string(),
            }
        }
        "retry" => Command::Retry(required(args, "/retry <client-id>")?),
        "reconnect" => Command::Reconnect,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '/{}' (try /help)", other)),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn required(args: &str, usage: &str) -> Result<String, String> {
    let args = args.trim();
    if args.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(args.to_string())
    }
}

fn on_off(args: &str, usage: &str) -> Result<bool, String> {
    parse_flag(args).ok_or_else(|| format!("usage: {}", usage))
}

/// `k=v` pairs separated by whitespace; values may be double-quoted.
fn parse_pairs(input: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let (key, after_key) = rest
            .split_once('=')
            .ok_or_else(|| format!("expected field=value, got '{}'", rest))?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(format!("bad field name '{}'", key));
        }
        let (value, remaining) = match after_key.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted
                    .find('"')
                    .ok_or_else(|| format!("unterminated quote for '{}'", key))?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => match after_key.split_once(char::is_whitespace) {
                Some((value, remaining)) => (value, remaining),
                None => (after_key, ""),
            },
        };
        pairs.push((key.to_string(), value.to_string()));
        rest = remaining.trim_start();
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_plain_text_is_message() {
        assert_eq!(parse("  hello there "), Command::Message("hello there".into()));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_tool_commands() {
        assert_eq!(parse("/approve 42"), Command::Approve("42".into()));
        assert_eq!(
            parse("/reject 42 too risky"),
            Command::Reject {
                id: "42".into(),
                reason: "too risky".into()
            }
        );
        assert_eq!(
            parse("/reject 42"),
            Command::Reject {
                id: "42".into(),
                reason: String::new()
            }
        );
        assert_eq!(
            parse(r#"/edit 42 {"path": "/tmp"}"#),
            Command::Edit {
                id: "42".into(),
                arguments: json!({"path": "/tmp"})
            }
        );
        assert!(parse_command("/approve").is_err());
        assert!(parse_command("/edit 42 {oops").is_err());
    }

    #[test]
    fn test_accept_pairs() {
        assert_eq!(parse("/accept"), Command::Accept(Vec::new()));
        assert_eq!(
            parse(r#"/accept name="Ada Lovelace" age=36"#),
            Command::Accept(vec![
                ("name".into(), "Ada Lovelace".into()),
                ("age".into(), "36".into())
            ])
        );
        assert!(parse_command("/accept name").is_err());
        assert!(parse_command(r#"/accept name="open"#).is_err());
    }

    #[test]
    fn test_toggles() {
        assert_eq!(parse("/agent on"), Command::Agent(true));
        assert_eq!(parse("/autoapprove off"), Command::AutoApprove(false));
        assert!(parse_command("/agent maybe").is_err());
    }

    #[test]
    fn test_attach_and_misc() {
        assert_eq!(
            parse("/attach notes.md see this"),
            Command::Attach {
                file_id: "notes.md".into(),
                text: "see this".into()
            }
        );
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/stop"), Command::Stop);
        assert!(parse_command("/frobnicate").is_err());
    }
}
