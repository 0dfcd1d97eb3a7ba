//! Operator commands read line by line from stdin

use std::str::FromStr;

use crate::simulation::{Scenario, SpawnError, SpawnRequest, UnknownScenario};

pub const HELP: &str = "\
commands:
  spawn <north> <south> <east> <west>   add vehicles per approach
  scenario <light|balanced|rush|ns-heavy|random>
  switch <intersection>                 view another intersection
  controller <url>                      talk to another controller
  reset                                 clear local traffic and reset the controller
  health                                ping the controller
  status | map | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spawn(SpawnRequest),
    Scenario(Scenario),
    Switch(String),
    Controller(String),
    Reset,
    Health,
    Status,
    Map,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Scenario(#[from] UnknownScenario),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();
        let single = |name: &'static str| {
            rest.first()
                .map(|s| s.to_string())
                .ok_or(CommandError::MissingArgument(name))
        };

        match verb.as_str() {
            "spawn" => Ok(Command::Spawn(SpawnRequest::from_fields(&rest)?)),
            "scenario" => Ok(Command::Scenario(single("scenario")?.parse()?)),
            "switch" => Ok(Command::Switch(single("switch")?)),
            "controller" => Ok(Command::Controller(single("controller")?)),
            "reset" => Ok(Command::Reset),
            "health" => Ok(Command::Health),
            "status" => Ok(Command::Status),
            "map" => Ok(Command::Map),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
