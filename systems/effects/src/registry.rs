use std::collections::BTreeSet;

use matrix_code_core::{CellOverride, Event};
use matrix_code_grid::CellGrid;

use crate::{Effect, EffectContext, EffectKind, EffectRequest};

/// Ordered collection of effects; registration order is override priority.
#[derive(Debug)]
pub struct EffectRegistry<E: Effect = EffectKind> {
    effects: Vec<E>,
    requests: Vec<EffectRequest>,
}

impl<E: Effect> Default for EffectRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Effect> EffectRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Appends an effect behind every effect registered so far.
    pub fn register(&mut self, effect: impl Into<E>) {
        let effect = effect.into();
        tracing::debug!(name = effect.name(), priority = self.effects.len(), "effect registered");
        self.effects.push(effect);
    }

    /// Number of registered effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Reports whether no effect has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Names of the registered effects in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.effects.iter().map(Effect::name)
    }

    /// Looks up an effect by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&E> {
        self.effects.iter().find(|effect| effect.name() == name)
    }

    /// Looks up an effect by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut E> {
        self.effects.iter_mut().find(|effect| effect.name() == name)
    }

    /// Triggers the named effect.
    ///
    /// Returns `false` when no effect carries the name or the effect refused to start.
    pub fn trigger(&mut self, name: &str, ctx: &mut EffectContext<'_>, out: &mut Vec<Event>) -> bool {
        let Some(effect) = self.get_mut(name) else {
            tracing::warn!(name, "trigger for unknown effect");
            out.push(Event::TriggerRejected {
                name: name.to_owned(),
            });
            return false;
        };

        let was_active = effect.is_active();
        if effect.trigger(ctx) {
            if !was_active {
                out.push(Event::EffectStarted {
                    name: name.to_owned(),
                });
            }
            true
        } else {
            tracing::debug!(name, "effect refused trigger");
            out.push(Event::TriggerRejected {
                name: name.to_owned(),
            });
            false
        }
    }

    /// Advances every effect one tick, active or not, then resolves queued requests.
    pub fn update(&mut self, ctx: &mut EffectContext<'_>, out: &mut Vec<Event>) {
        let mut requests = std::mem::take(&mut self.requests);
        for effect in &mut self.effects {
            let was_active = effect.is_active();
            effect.update(ctx, &mut requests);
            match (was_active, effect.is_active()) {
                (false, true) => out.push(Event::EffectStarted {
                    name: effect.name().to_owned(),
                }),
                (true, false) => out.push(Event::EffectFinished {
                    name: effect.name().to_owned(),
                }),
                _ => {}
            }
        }

        for request in requests.drain(..) {
            match request {
                EffectRequest::Trigger(name) => {
                    let _ = self.trigger(&name, ctx, out);
                }
            }
        }
        self.requests = requests;
    }

    /// First override supplied for the cell, in registration order.
    #[must_use]
    pub fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        self.effects
            .iter()
            .find_map(|effect| effect.override_for(index, grid))
    }

    /// Union of every effect's overridden cells.
    ///
    /// Returns `None` as soon as one effect cannot enumerate its cells, in which
    /// case callers must query every index.
    #[must_use]
    pub fn active_indices(&self, grid: &CellGrid) -> Option<BTreeSet<usize>> {
        let mut union = BTreeSet::new();
        for effect in &self.effects {
            union.extend(effect.active_indices(grid)?);
        }
        Some(union)
    }
}
