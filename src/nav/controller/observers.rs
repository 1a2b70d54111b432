use bevy::math::Vec3;

use crate::nav::path::NavigationPath;

/// What an overlay needs to redraw the active path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSnapshot {
    /// Node positions, world space.
    pub nodes: Vec<Vec3>,
    pub index: usize,
    pub destination: Vec3,
    /// Stop radius around the destination, 0 when exact arrival is required.
    pub stop_distance: u32,
    pub revision: u64,
}

impl PathSnapshot {
    pub fn of(path: &NavigationPath) -> Self {
        Self {
            nodes: path.nodes().iter().map(|n| n.position).collect(),
            index: path.index(),
            destination: path.destination(),
            stop_distance: path.destination_info().options.distance,
            revision: path.revision(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathEvent {
    Updated(PathSnapshot),
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u32);

type Observer = Box<dyn FnMut(&PathEvent) + Send + Sync>;

/// Subscription list for path changes. Observers only ever see events; they
/// hold no reference back into the controller.
#[derive(Default)]
pub struct PathObservers {
    next_id: u32,
    observers: Vec<(ObserverId, Observer)>,
}

impl PathObservers {
    pub fn subscribe(&mut self, observer: impl FnMut(&PathEvent) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn publish(&mut self, event: &PathEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }
}

impl std::fmt::Debug for PathObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathObservers")
            .field("observers", &self.observers.len())
            .finish()
    }
}
