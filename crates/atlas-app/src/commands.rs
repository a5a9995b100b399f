//! Line-oriented input: plain text is an utterance, `/`-prefixed lines are
//! panel actions.

use std::path::PathBuf;

use atlas_core::GeoSnapshot;

pub const HELP: &str = "\
Type a message to talk to the agent, or:
  /map [on|off]                toggle map mode or set it
  /bbox <north> <south> <east> <west>
                               set the current map viewport
  /tool <kind> <address>       attach a tool service (sse, stdio, ...)
  /tool clear                  detach the tool service
  /file <path>                 attach a skill file
  /file clear                  detach the skill file
  /schedule <interval> <query> run a query every <interval> seconds
  /panel                       toggle the chat panel
  /transcript                  print the whole transcript
  /status                      print the status line
  /help                        show this text
  /quit                        exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    /// `None` toggles.
    Map(Option<bool>),
    Bbox(GeoSnapshot),
    Tool { kind: String, address: String },
    ToolClear,
    File(PathBuf),
    FileClear,
    Schedule { interval: String, query: String },
    Panel,
    Transcript,
    Status,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid coordinate: {0}")]
    Coordinate(String),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "map" => match args {
            "" => Ok(Command::Map(None)),
            "on" => Ok(Command::Map(Some(true))),
            "off" => Ok(Command::Map(Some(false))),
            _ => Err(CommandError::Usage("/map [on|off]")),
        },
        "bbox" => parse_bbox(args),
        "tool" => match args.split_once(char::is_whitespace) {
            _ if args == "clear" => Ok(Command::ToolClear),
            Some((kind, address)) => Ok(Command::Tool {
                kind: kind.to_string(),
                address: address.trim().to_string(),
            }),
            None => Err(CommandError::Usage("/tool <kind> <address> | /tool clear")),
        },
        "file" => match args {
            "" => Err(CommandError::Usage("/file <path> | /file clear")),
            "clear" => Ok(Command::FileClear),
            path => Ok(Command::File(PathBuf::from(path))),
        },
        "schedule" => match args.split_once(char::is_whitespace) {
            Some((interval, query)) => Ok(Command::Schedule {
                interval: interval.to_string(),
                query: query.trim().to_string(),
            }),
            None => Err(CommandError::Usage("/schedule <interval> <query>")),
        },
        "panel" => Ok(Command::Panel),
        "transcript" => Ok(Command::Transcript),
        "status" => Ok(Command::Status),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_bbox(args: &str) -> Result<Command, CommandError> {
    let coords = args
        .split_whitespace()
        .map(|c| {
            c.parse::<f64>()
                .map_err(|_| CommandError::Coordinate(c.to_string()))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    match coords.as_slice() {
        &[north, south, east, west] => Ok(Command::Bbox(GeoSnapshot::new(north, south, east, west))),
        _ => Err(CommandError::Usage("/bbox <north> <south> <east> <west>")),
    }
}
