use serde::{Deserialize, Serialize};

/// Per-request arrival options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationOptions {
    /// Stop once within this planar distance of the destination. 0 means the
    /// end of the path must be reached.
    pub distance: u32,
    /// Only stop early (see `distance`) when the destination is visible.
    pub line_of_sight: bool,
}

/// A `key=value` token that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionIssue {
    pub token: String,
    pub reason: String,
}

impl NavigationOptions {
    /// Apply `key=value` tokens over `self`. Keys are case-insensitive.
    /// Tokens without `=` are skipped; bad values are returned as issues and
    /// leave the previous value untouched.
    pub fn apply_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) -> Vec<OptionIssue> {
        let mut issues = Vec::new();
        for token in tokens {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let issue = |reason: &str| OptionIssue {
                token: token.to_string(),
                reason: reason.to_string(),
            };

            match key.to_ascii_lowercase().as_str() {
                "distance" => match value.trim().parse::<u32>() {
                    Ok(distance) => self.distance = distance,
                    Err(_) => issues.push(issue("distance must be a non-negative integer")),
                },
                "los" => match parse_switch(value) {
                    Some(los) => self.line_of_sight = los,
                    None => issues.push(issue("los must be on/off/true/false")),
                },
                _ => issues.push(issue("unknown option")),
            }
        }
        issues
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}
