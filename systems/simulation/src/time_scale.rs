use std::{
    cell::Cell,
    rc::{Rc, Weak},
};

/// Shared playback-rate multiplier owned by the simulation.
///
/// `1.0` is real time, `0.0` pauses, values above one fast-forward and
/// negative values rewind.
#[derive(Clone, Debug)]
pub struct TimeScale(Rc<Cell<f32>>);

impl TimeScale {
    /// Creates a handle holding `value`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    /// Current multiplier.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0.get()
    }

    /// Replaces the multiplier.
    pub fn set(&self, value: f32) {
        self.0.set(value);
    }

    /// Non-owning link that stops resolving once the simulation is dropped.
    #[must_use]
    pub fn link(&self) -> TimeScaleLink {
        TimeScaleLink(Rc::downgrade(&self.0))
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Weak reference to a simulation's [`TimeScale`].
#[derive(Clone, Debug, Default)]
pub struct TimeScaleLink(Weak<Cell<f32>>);

impl TimeScaleLink {
    /// Resolves the link while the owning simulation is alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<TimeScale> {
        self.0.upgrade().map(TimeScale)
    }

    /// Reports whether the owning simulation is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeScale, TimeScaleLink};

    #[test]
    fn link_writes_through_to_owner() {
        let scale = TimeScale::default();
        let link = scale.link();
        link.upgrade().expect("owner alive").set(-2.0);
        assert_eq!(scale.get(), -2.0);
    }

    #[test]
    fn link_dies_with_owner() {
        let scale = TimeScale::new(0.5);
        let link = scale.link();
        drop(scale);
        assert!(!link.is_live());
        assert!(link.upgrade().is_none());
    }

    #[test]
    fn default_link_never_resolves() {
        assert!(TimeScaleLink::default().upgrade().is_none());
    }
}
