//! Text command decoding.
//!
//! A command line is decoded once into a typed [`NavCommand`]; everything
//! downstream works on the typed form.

use super::destination::{AxisOrder, ClickIntent, DestinationRequest, HeightMode, NavRequest, ObjectSelector};
use super::error::NavError;
use super::host::ObjectKind;

#[derive(Debug, Clone, PartialEq)]
pub enum OptionsCommand {
    /// Parse the tokens over the current defaults and keep the result.
    Set(Vec<String>),
    /// Back to the configured defaults.
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavCommand {
    Navigate(NavRequest),
    Stop,
    Pause,
    Reload,
    RecordWaypoint { name: String, description: String },
    ListWaypoints,
    Options(OptionsCommand),
    Help,
}

pub const HELP_LINES: &[&str] = &[
    "Usage:",
    "nav target - navigate to the current target",
    "nav id <spawn id> - navigate to a spawn by id",
    "nav spawn <search> - navigate to the first spawn matching the search",
    "nav door [id <id> | nearest | <name>] [click] - navigate to a door",
    "nav item [id <id> | nearest | <name>] [click] - navigate to a ground item",
    "nav waypoint|wp <name> - navigate to a recorded waypoint",
    "nav loc|locyxz <y> <x> <z>, locxyz <x> <y> <z> - navigate to a location",
    "nav locyx <y> <x>, locxy <x> <y> - navigate to the floor nearest a location",
    "nav recordwaypoint|rwp <name> [description] - record a waypoint here",
    "nav listwp - list the waypoints of this zone",
    "nav stop | pause | reload | help",
    "nav options set <key=value...> | options reset",
    "Navigation commands accept trailing options: distance=<n> los=<on|off>",
];

impl NavCommand {
    pub fn parse(line: &str) -> Result<NavCommand, NavError> {
        let tokens = tokenize(line);
        let Some(first) = tokens.first() else {
            return Err(NavError::InvalidDestination(line.trim().to_string()));
        };
        let rest = &tokens[1..];

        let command = match first.to_ascii_lowercase().as_str() {
            "stop" => NavCommand::Stop,
            "pause" => NavCommand::Pause,
            "reload" => NavCommand::Reload,
            "help" => NavCommand::Help,
            "listwp" => NavCommand::ListWaypoints,
            "recordwaypoint" | "rwp" => NavCommand::RecordWaypoint {
                name: rest.first().cloned().unwrap_or_default(),
                description: rest.get(1..).map(|d| d.join(" ")).unwrap_or_default(),
            },
            "options" => match rest.first().map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("reset") => NavCommand::Options(OptionsCommand::Reset),
                Some("set") => NavCommand::Options(OptionsCommand::Set(rest[1..].to_vec())),
                _ => return Err(NavError::InvalidDestination(line.trim().to_string())),
            },
            keyword => NavCommand::Navigate(parse_request(keyword, rest, line)?),
        };
        Ok(command)
    }
}

fn parse_request(keyword: &str, rest: &[String], line: &str) -> Result<NavRequest, NavError> {
    // Index of the first option token.
    let (destination, consumed) = match keyword {
        "target" => (DestinationRequest::Target, 0),
        "id" => (DestinationRequest::SpawnId(rest.first().cloned().unwrap_or_default()), 1),
        "spawn" => {
            let query: Vec<&str> = rest
                .iter()
                .take_while(|t| !t.contains('='))
                .map(String::as_str)
                .collect();
            let consumed = query.len();
            (DestinationRequest::SpawnSearch(query.join(" ")), consumed)
        }
        "door" => parse_object(ObjectKind::Door, rest),
        "item" => parse_object(ObjectKind::GroundItem, rest),
        "waypoint" | "wp" => (DestinationRequest::Waypoint(rest.first().cloned().unwrap_or_default()), 1),
        "loc" | "locyxz" => parse_location(rest, AxisOrder::YX, HeightMode::Exact),
        "locxyz" => parse_location(rest, AxisOrder::XY, HeightMode::Exact),
        "locyx" => parse_location(rest, AxisOrder::YX, HeightMode::NearestFloor),
        "locxy" => parse_location(rest, AxisOrder::XY, HeightMode::NearestFloor),
        _ => return Err(NavError::InvalidDestination(line.trim().to_string())),
    };

    let options = rest.iter().skip(consumed).cloned().collect();
    Ok(NavRequest { destination, options })
}

/// `[id <n> | nearest | click | <name>] [click]`
fn parse_object(kind: ObjectKind, rest: &[String]) -> (DestinationRequest, usize) {
    let is_click = |t: Option<&String>| t.is_some_and(|t| t.eq_ignore_ascii_case("click"));

    let (selector, mut consumed) = match rest.first() {
        None => (ObjectSelector::Targeted, 0),
        Some(t) if t.eq_ignore_ascii_case("click") || t.contains('=') => (ObjectSelector::Targeted, 0),
        Some(t) if t.eq_ignore_ascii_case("id") => (ObjectSelector::Id(rest.get(1).cloned().unwrap_or_default()), 2),
        Some(t) if t.eq_ignore_ascii_case("nearest") => (ObjectSelector::Nearest, 1),
        Some(t) => (ObjectSelector::Name(t.clone()), 1),
    };

    let click = if is_click(rest.get(consumed)) {
        consumed += 1;
        ClickIntent::Once
    } else {
        ClickIntent::None
    };

    (DestinationRequest::Object { kind, selector, click }, consumed.min(rest.len()))
}

/// Up to three leading numeric tokens; whatever follows is options.
fn parse_location(rest: &[String], order: AxisOrder, height: HeightMode) -> (DestinationRequest, usize) {
    let components: Vec<f32> = rest
        .iter()
        .take(3)
        .map_while(|t| t.parse::<f32>().ok())
        .collect();
    let consumed = components.len();
    (
        DestinationRequest::Location {
            components,
            order,
            height,
        },
        consumed,
    )
}

/// Split on whitespace, keeping double-quoted runs together.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    tokens
}
