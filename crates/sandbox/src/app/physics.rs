//! Minimal kinematic physics: integrates velocities and reports AABB overlaps.

use std::collections::{BTreeMap, BTreeSet};

use simcore::{
    BodyDef, BodyId, BodyKind, BodyState, Contact, ContactImpulse, ContactListener, PhysicsWorld,
    Rect, Vec2,
};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Body {
    kind: BodyKind,
    half_extents: Vec2,
    state: BodyState,
}

impl Body {
    fn bounds(&self) -> Rect {
        Rect::centered(
            self.state.position,
            Vec2::new(self.half_extents.x * 2.0, self.half_extents.y * 2.0),
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct KinematicPhysics {
    bodies: BTreeMap<BodyId, Body>,
    touching: BTreeSet<(BodyId, BodyId)>,
    next_body: u64,
    disposed: bool,
}

impl KinematicPhysics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn overlapping_pairs(&self) -> BTreeSet<(BodyId, BodyId)> {
        let mut pairs = BTreeSet::new();
        for (index, (id_a, body_a)) in self.bodies.iter().enumerate() {
            for (id_b, body_b) in self.bodies.iter().skip(index + 1) {
                if body_a.kind == BodyKind::Static && body_b.kind == BodyKind::Static {
                    continue;
                }
                if body_a.bounds().intersects(&body_b.bounds()) {
                    pairs.insert((*id_a, *id_b));
                }
            }
        }
        pairs
    }
}

fn contact_between(a: &Body, b: &Body, id_a: BodyId, id_b: BodyId) -> Contact {
    let delta = Vec2::new(
        b.state.position.x - a.state.position.x,
        b.state.position.y - a.state.position.y,
    );
    let length = (delta.x * delta.x + delta.y * delta.y).sqrt();
    let normal = if length > f32::EPSILON {
        delta.scaled(1.0 / length)
    } else {
        Vec2::new(0.0, 1.0)
    };
    Contact::new(id_a, id_b, normal)
}

impl PhysicsWorld for KinematicPhysics {
    fn step(
        &mut self,
        dt_seconds: f32,
        _velocity_iterations: u32,
        _position_iterations: u32,
        contacts: &mut dyn ContactListener,
    ) {
        if self.disposed {
            return;
        }
        for body in self.bodies.values_mut() {
            if body.kind != BodyKind::Static {
                body.state.position = body
                    .state
                    .position
                    .add(body.state.linear_velocity.scaled(dt_seconds));
            }
        }

        let current = self.overlapping_pairs();
        for (id_a, id_b) in &current {
            let (Some(a), Some(b)) = (self.bodies.get(id_a), self.bodies.get(id_b)) else {
                continue;
            };
            let mut contact = contact_between(a, b, *id_a, *id_b);
            if !self.touching.contains(&(*id_a, *id_b)) {
                contacts.begin_contact(&contact);
            }
            contacts.pre_solve(&mut contact);
            if contact.enabled {
                contacts.post_solve(&contact, &ContactImpulse::default());
            }
        }
        for (id_a, id_b) in self.touching.difference(&current) {
            contacts.end_contact(&Contact::new(*id_a, *id_b, Vec2::ZERO));
        }
        self.touching = current;
    }

    fn create_body(&mut self, def: BodyDef) -> BodyId {
        self.next_body += 1;
        let id = BodyId(self.next_body);
        self.bodies.insert(
            id,
            Body {
                kind: def.kind,
                half_extents: def.half_extents,
                state: BodyState {
                    position: def.position,
                    rotation_radians: def.rotation_radians,
                    linear_velocity: def.linear_velocity,
                },
            },
        );
        id
    }

    fn destroy_body(&mut self, body: BodyId) -> bool {
        if self.bodies.remove(&body).is_none() {
            return false;
        }
        self.touching.retain(|(a, b)| *a != body && *b != body);
        true
    }

    fn body_state(&self, body: BodyId) -> Option<BodyState> {
        self.bodies.get(&body).map(|body| body.state)
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec2) -> bool {
        match self.bodies.get_mut(&body) {
            Some(body) => {
                body.state.linear_velocity = velocity;
                true
            }
            None => false,
        }
    }

    fn set_transform(&mut self, body: BodyId, position: Vec2, rotation_radians: f32) -> bool {
        match self.bodies.get_mut(&body) {
            Some(body) => {
                body.state.position = position;
                body.state.rotation_radians = rotation_radians;
                true
            }
            None => false,
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn dispose(&mut self) {
        debug!(leaked_bodies = self.bodies.len(), "kinematic_physics_disposed");
        self.bodies.clear();
        self.touching.clear();
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        begins: Vec<(BodyId, BodyId)>,
        ends: Vec<(BodyId, BodyId)>,
    }

    impl ContactListener for Events {
        fn begin_contact(&mut self, contact: &Contact) {
            self.begins.push((contact.body_a, contact.body_b));
        }

        fn end_contact(&mut self, contact: &Contact) {
            self.ends.push((contact.body_a, contact.body_b));
        }
    }

    fn square(position: Vec2, velocity: Vec2, kind: BodyKind) -> BodyDef {
        BodyDef {
            kind,
            position,
            linear_velocity: velocity,
            half_extents: Vec2::new(0.5, 0.5),
            ..BodyDef::default()
        }
    }

    #[test]
    fn moving_body_begins_then_ends_contact_with_wall() {
        let mut physics = KinematicPhysics::new();
        let wall = physics.create_body(square(Vec2::new(2.0, 0.0), Vec2::ZERO, BodyKind::Static));
        let mover = physics.create_body(square(
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            BodyKind::Kinematic,
        ));
        let mut events = Events::default();

        physics.step(1.0, 8, 3, &mut events);
        assert_eq!(events.begins, vec![(wall, mover)]);
        physics.step(1.0, 8, 3, &mut events);
        assert_eq!(events.begins.len(), 1);
        physics.step(2.0, 8, 3, &mut events);
        assert_eq!(events.ends, vec![(wall, mover)]);
        assert_eq!(
            physics.body_state(mover).map(|state| state.position),
            Some(Vec2::new(4.0, 0.0))
        );
    }

    #[test]
    fn static_bodies_never_touch_each_other() {
        let mut physics = KinematicPhysics::new();
        physics.create_body(square(Vec2::ZERO, Vec2::ZERO, BodyKind::Static));
        physics.create_body(square(Vec2::ZERO, Vec2::ZERO, BodyKind::Static));
        let mut events = Events::default();
        physics.step(0.1, 8, 3, &mut events);
        assert!(events.begins.is_empty());
    }

    #[test]
    fn destroyed_body_is_forgotten() {
        let mut physics = KinematicPhysics::new();
        let body = physics.create_body(BodyDef::default());
        assert!(physics.destroy_body(body));
        assert!(!physics.destroy_body(body));
        assert!(physics.body_state(body).is_none());
        assert_eq!(physics.body_count(), 0);
    }
}
