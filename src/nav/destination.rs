//! Destination resolution.
//!
//! A [`DestinationRequest`] names *what* to go to (target, spawn, door,
//! waypoint, coordinates); resolving it against the host world produces a
//! concrete [`DestinationInfo`]. Resolution never touches navigation state,
//! so a failed request leaves any active path alone.

mod options;
mod resolver;


use bevy::math::Vec3;

use super::host::{ObjectKind, ObjectRef, SpawnId};

pub use options::{NavigationOptions, OptionIssue};
pub use resolver::resolve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Location,
    Spawn,
    Door,
    GroundItem,
    Waypoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickIntent {
    #[default]
    None,
    /// Click the door or item once on arrival.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightMode {
    #[default]
    Exact,
    /// Height is only a hint; the path ends on the nearest floor.
    NearestFloor,
}

/// Order in which a user typed the two ground coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// `y x [z]`, the host's native display order.
    YX,
    /// `x y [z]`.
    XY,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectSelector {
    /// Whatever the host currently has targeted.
    Targeted,
    /// Closest object of the kind.
    Nearest,
    /// Object id as typed.
    Id(String),
    /// Case-insensitive name prefix; the closest match wins.
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DestinationRequest {
    Target,
    /// Raw id token, validated during resolution.
    SpawnId(String),
    SpawnSearch(String),
    Object {
        kind: ObjectKind,
        selector: ObjectSelector,
        click: ClickIntent,
    },
    Waypoint(String),
    Location {
        components: Vec<f32>,
        order: AxisOrder,
        height: HeightMode,
    },
}

/// A destination plus the trailing `key=value` tokens that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct NavRequest {
    pub destination: DestinationRequest,
    pub options: Vec<String>,
}

impl NavRequest {
    pub fn new(destination: DestinationRequest) -> Self {
        Self {
            destination,
            options: Vec::new(),
        }
    }

    pub fn with_options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }
}

/// A resolved destination. `position` is world space.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationInfo {
    pub kind: DestinationKind,
    pub position: Vec3,
    pub click: ClickIntent,
    pub height: HeightMode,
    pub options: NavigationOptions,
    /// Door or item to click on arrival, if any.
    pub object: Option<ObjectRef>,
    pub spawn: Option<SpawnId>,
    label: String,
}

impl DestinationInfo {
    pub fn new(kind: DestinationKind, position: Vec3, label: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            click: ClickIntent::None,
            height: HeightMode::Exact,
            options: NavigationOptions::default(),
            object: None,
            spawn: None,
            label: label.into(),
        }
    }

    /// Human readable description, e.g. `door: GATE_LEFT`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn describe(&self) -> String {
        format!("Navigating to {}", self.label)
    }

    /// The click target, if one was requested.
    pub fn click_target(&self) -> Option<ObjectRef> {
        match self.click {
            ClickIntent::Once => self.object,
            ClickIntent::None => None,
        }
    }
}
