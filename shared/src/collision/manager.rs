//! Per-owner collision pass: exhaustive broad phase followed by the physical
//! response for each recorded hit.

use super::geometry::{self, Circle, OrientedRect, WorldShape};
use super::{CollisionData, CollisionType};
use crate::entity::{Collidable, CollidableId, Entity};
use crate::math::Vector2;
use crate::store::{BlockStore, EntityStore};
use log::trace;

/// Tests every shape of `owner` against every shape of every other entity and
/// block, skipping the owner itself and anything in its exception list.
pub fn find_collisions<C>(owner: &C, entities: &EntityStore, blocks: &BlockStore) -> Vec<CollisionData>
where
    C: Collidable + ?Sized,
{
    let owner_id = owner.collidable_id();
    let candidates = entities
        .iter()
        .map(|e| e as &dyn Collidable)
        .chain(blocks.iter().map(|b| b as &dyn Collidable));

    let mut hits = Vec::new();
    for other in candidates {
        let other_id = other.collidable_id();
        if other_id == owner_id || owner.ignores(&other_id) {
            continue;
        }
        collect_hits(owner, other, &other_id, &mut hits);
    }
    hits
}

fn collect_hits<C>(owner: &C, other: &dyn Collidable, other_id: &CollidableId, hits: &mut Vec<CollisionData>)
where
    C: Collidable + ?Sized,
{
    let owner_pose = owner.pose();
    let other_pose = other.pose();

    for (this_shape, own) in owner.shapes().iter().enumerate() {
        let Some(own_world) = WorldShape::from_shape(own, &owner_pose) else {
            continue;
        };

        for (other_shape, theirs) in other.shapes().iter().enumerate() {
            let Some(kind) = CollisionType::between(own.kind, theirs.kind) else {
                continue;
            };
            let Some(their_world) = WorldShape::from_shape(theirs, &other_pose) else {
                continue;
            };

            if geometry::intersects(&own_world, &their_world) {
                hits.push(CollisionData {
                    other: other_id.clone(),
                    this_shape,
                    other_shape,
                    kind,
                });
            }
        }
    }
}

/// The other side of a hit: either something immovable (infinite mass,
/// never touched) or a live entity that can receive an impulse.
enum Counterpart<'a> {
    Static(&'a dyn Collidable),
    Entity(&'a mut Entity),
}

impl Counterpart<'_> {
    fn collidable(&self) -> &dyn Collidable {
        match self {
            Counterpart::Static(c) => *c,
            Counterpart::Entity(e) => &**e,
        }
    }
}

/// Applies the physical response for every hit in `collisions`.
///
/// Shapes are re-evaluated against live positions, so earlier corrections in
/// the same pass are taken into account. Does nothing for owners that do not
/// react to collisions, and skips counterparts that do not react either.
pub fn resolve_collisions(
    owner: &mut Entity,
    collisions: &[CollisionData],
    entities: &mut EntityStore,
    blocks: &BlockStore,
    dt: f64,
) {
    if !owner.reacts_to_collision {
        return;
    }

    for hit in collisions {
        match &hit.other {
            CollidableId::Block(pos) => {
                if let Some(block) = blocks.get(*pos) {
                    resolve_hit(owner, hit, Counterpart::Static(block), dt);
                }
            }
            CollidableId::Entity(id) => {
                let Some(other) = entities.get_mut(id) else {
                    continue;
                };
                if !other.reacts_to_collision {
                    continue;
                }
                resolve_hit(owner, hit, Counterpart::Entity(other), dt);
            }
        }
    }
}

/// Like [`resolve_collisions`], but every counterpart is an immovable
/// obstacle: only `owner` is pushed and only its velocity changes.
pub fn resolve_collisions_static(
    owner: &mut Entity,
    collisions: &[CollisionData],
    entities: &EntityStore,
    blocks: &BlockStore,
    dt: f64,
) {
    if !owner.reacts_to_collision {
        return;
    }

    for hit in collisions {
        let other: &dyn Collidable = match &hit.other {
            CollidableId::Block(pos) => match blocks.get(*pos) {
                Some(block) => block,
                None => continue,
            },
            CollidableId::Entity(id) => match entities.get(id) {
                Some(entity) if entity.reacts_to_collision => entity,
                _ => continue,
            },
        };
        resolve_hit(owner, hit, Counterpart::Static(other), dt);
    }
}

fn resolve_hit(owner: &mut Entity, hit: &CollisionData, mut other: Counterpart<'_>, dt: f64) {
    let Some(own) = owner.world_shape(hit.this_shape) else {
        return;
    };
    let Some(theirs) = other.collidable().world_shape(hit.other_shape) else {
        return;
    };

    trace!("{} resolving {} hit with {}", owner.id, hit.kind, hit.other);

    match (own, theirs) {
        (WorldShape::Rect(a), WorldShape::Rect(b)) => resolve_rect_rect(owner, &a, &b),
        (WorldShape::Circle(a), WorldShape::Circle(b)) => {
            resolve_circle_circle(owner, &mut other, &a, &b, dt)
        }
        (WorldShape::Circle(circle), WorldShape::Rect(rect)) => {
            resolve_rect_circle(owner, &rect, &circle, true)
        }
        (WorldShape::Rect(rect), WorldShape::Circle(circle)) => {
            resolve_rect_circle(owner, &rect, &circle, false)
        }
    }
}

/// Hard stop: full push-back, normal velocity removed, optional bounce.
fn resolve_rect_rect(owner: &mut Entity, a: &OrientedRect, b: &OrientedRect) {
    let Some(push) = geometry::rect_rect_mtv(a, b) else {
        return;
    };

    owner.translate(push);

    let normal = push.normalize();
    let along_normal = owner.body.velocity.dot(normal);
    if along_normal < 0.0 {
        owner.body.velocity -= normal * along_normal;
        if owner.body.bounciness > 0.0 {
            owner.body.velocity += normal * (-along_normal * owner.body.bounciness);
        }
    }
}

/// Impulse exchange, positional split by inverse mass and tangential friction.
fn resolve_circle_circle(
    owner: &mut Entity,
    other: &mut Counterpart<'_>,
    a: &Circle,
    b: &Circle,
    dt: f64,
) {
    let Some(push) = geometry::circle_circle_mtv(a, b) else {
        return;
    };
    let normal = push.normalize_or(Vector2::RIGHT);

    let other_body = *other.collidable().body();
    let inv_own = owner.body.inverse_mass();
    let inv_other = match other {
        Counterpart::Static(_) => 0.0,
        Counterpart::Entity(_) => other_body.inverse_mass(),
    };
    let inv_total = inv_own + inv_other;
    if inv_total <= 0.0 {
        return;
    }

    let relative = owner.body.velocity - other_body.velocity;
    let along_normal = relative.dot(normal);

    if along_normal < 0.0 {
        let restitution = owner.body.bounciness.min(other_body.bounciness);
        let j = -(1.0 + restitution) * along_normal / inv_total;
        let impulse = normal * j;

        owner.body.velocity += impulse * inv_own;
        if let Counterpart::Entity(entity) = other {
            entity.body.velocity -= impulse * inv_other;
            entity.mark_dirty();
        }
    }

    owner.translate(push * (inv_own / inv_total));
    if let Counterpart::Entity(entity) = other {
        if inv_other > 0.0 {
            entity.translate(-push * (inv_other / inv_total));
        }
    }

    if owner.body.velocity.length_squared() > 0.01 {
        let tangent = normal.perp_left();
        let along_tangent = owner.body.velocity.dot(tangent);
        let damping = (owner.body.friction * dt * 50.0).min(1.0);
        owner.body.velocity -= tangent * (along_tangent * damping);
    }
}

/// Circle owners slide along the rect, rect owners stop against the circle.
fn resolve_rect_circle(owner: &mut Entity, rect: &OrientedRect, circle: &Circle, owner_is_circle: bool) {
    let Some(contact) = geometry::rect_circle_contact(rect, circle) else {
        return;
    };

    // Contact normals point from the rect to the circle; flip so it always
    // points away from the other shape.
    let normal = if owner_is_circle {
        contact.normal
    } else {
        -contact.normal
    };

    owner.translate(normal * contact.penetration);

    let along_normal = owner.body.velocity.dot(normal);
    if along_normal >= 0.0 {
        return;
    }

    if owner_is_circle {
        let tangent = normal.perp_left();
        let along_tangent = owner.body.velocity.dot(tangent);
        owner.body.velocity = tangent * (along_tangent * (1.0 - owner.body.friction * 0.3));
        if owner.body.bounciness > 0.0 {
            owner.body.velocity += normal * (-along_normal * owner.body.bounciness);
        }
    } else {
        owner.body.velocity -= normal * along_normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Body;
    use crate::shape::{Shape, ShapeKind};
    use assert_approx_eq::assert_approx_eq;

    fn rect_entity(id: &str, x: f64, y: f64, half: f64) -> Entity {
        let mut e = Entity::new(id, id, Vector2::new(x, y));
        e.shapes = vec![Shape::rect(Vector2::ZERO, half, half)];
        e
    }

    fn circle_entity(id: &str, x: f64, y: f64, radius: f64) -> Entity {
        let mut e = Entity::new(id, id, Vector2::new(x, y));
        e.shapes = vec![Shape::circle(Vector2::ZERO, radius)];
        e
    }

    fn overlaps_anything(owner: &Entity, entities: &EntityStore, blocks: &BlockStore) -> bool {
        !find_collisions(owner, entities, blocks).is_empty()
    }

    #[test]
    fn test_find_collisions_records_shape_pairs() {
        let mut entities = EntityStore::new();
        let mut target = circle_entity("target", 15.0, 0.0, 10.0);
        target.shapes.push(Shape::rect(Vector2::new(100.0, 0.0), 5.0, 5.0));
        entities.insert(target);

        let owner = rect_entity("owner", 0.0, 0.0, 10.0);
        entities.insert(owner.clone());

        let hits = find_collisions(&owner, &entities, &BlockStore::new());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].other, CollidableId::Entity("target".into()));
        assert_eq!(hits[0].this_shape, 0);
        assert_eq!(hits[0].other_shape, 0);
        assert_eq!(hits[0].kind, CollisionType::RectCircle);
    }

    #[test]
    fn test_find_collisions_skips_exceptions_and_triangles() {
        let mut entities = EntityStore::new();
        entities.insert(circle_entity("friend", 0.0, 0.0, 10.0));

        let mut decoration = Entity::new("deco", "deco", Vector2::ZERO);
        decoration.shapes = vec![Shape::new(Vector2::ZERO, Vector2::new(50.0, 50.0), ShapeKind::Triangle)];
        entities.insert(decoration);

        let mut owner = circle_entity("owner", 1.0, 0.0, 10.0);
        owner.exceptions.push("friend".into());

        assert!(find_collisions(&owner, &entities, &BlockStore::new()).is_empty());
    }

    #[test]
    fn test_find_collisions_includes_blocks() {
        let mut blocks = BlockStore::new();
        blocks.add_block(Vector2::new(0.0, 0.0));
        let owner = circle_entity("owner", 30.0, 0.0, 10.0);

        let hits = find_collisions(&owner, &EntityStore::new(), &blocks);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, CollisionType::CircleRect);
        assert!(matches!(hits[0].other, CollidableId::Block(_)));
    }

    #[test]
    fn test_rect_hits_static_block() {
        let mut blocks = BlockStore::new();
        blocks.add_block(Vector2::new(0.0, 0.0));
        let mut entities = EntityStore::new();

        let mut owner = rect_entity("a", -34.0, 0.0, 10.0);
        owner.body = Body {
            velocity: Vector2::new(100.0, 0.0),
            mass: 1.0,
            friction: 0.8,
            bounciness: 0.5,
        };

        let hits = find_collisions(&owner, &entities, &blocks);
        assert_eq!(hits.len(), 1);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        assert!(owner.body.velocity.x <= 0.0);
        assert_approx_eq!(owner.body.velocity.x, -50.0, 1e-9);
        assert!(!overlaps_anything(&owner, &entities, &blocks));
        assert!(owner.is_dirty());
    }

    #[test]
    fn test_circle_hits_static_block() {
        let mut blocks = BlockStore::new();
        blocks.add_block(Vector2::new(0.0, 0.0));
        let mut entities = EntityStore::new();

        let mut owner = circle_entity("a", -34.0, 0.0, 10.0);
        owner.body.velocity = Vector2::new(100.0, 0.0);

        let hits = find_collisions(&owner, &entities, &blocks);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        assert!(owner.body.velocity.x <= 0.0);
        assert_approx_eq!(owner.position.x, -35.0, 1e-9);
        assert!(!overlaps_anything(&owner, &entities, &blocks));
    }

    #[test]
    fn test_rect_owner_pushed_away_from_circle() {
        let mut entities = EntityStore::new();
        entities.insert(circle_entity("ball", 16.0, 0.0, 8.0));
        let blocks = BlockStore::new();

        let mut owner = rect_entity("box", 0.0, 0.0, 10.0);
        owner.body.velocity = Vector2::new(20.0, 0.0);

        let hits = find_collisions(&owner, &entities, &blocks);
        assert_eq!(hits[0].kind, CollisionType::RectCircle);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        assert_approx_eq!(owner.position.x, -2.0, 1e-9);
        assert_approx_eq!(owner.body.velocity.x, 0.0, 1e-9);
        assert_eq!(entities.get("ball").unwrap().position, Vector2::new(16.0, 0.0));
    }

    #[test]
    fn test_circle_slides_along_rect() {
        let mut entities = EntityStore::new();
        entities.insert(rect_entity("wall", 0.0, 0.0, 10.0));
        let blocks = BlockStore::new();

        let mut owner = circle_entity("ball", 0.0, 14.0, 5.0);
        owner.body.velocity = Vector2::new(10.0, -10.0);
        owner.body.bounciness = 0.0;

        let hits = find_collisions(&owner, &entities, &blocks);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        assert_approx_eq!(owner.position.y, 15.0, 1e-9);
        assert_approx_eq!(owner.body.velocity.y, 0.0, 1e-9);
        assert_approx_eq!(owner.body.velocity.x, 10.0 * (1.0 - 0.8 * 0.3), 1e-9);
    }

    #[test]
    fn test_circle_momentum_conserved() {
        let mut entities = EntityStore::new();
        let blocks = BlockStore::new();

        let mut other = circle_entity("b", 8.0, 2.0, 5.0);
        other.body = Body {
            velocity: Vector2::new(-3.0, 1.0),
            mass: 1.0,
            friction: 0.0,
            bounciness: 1.0,
        };
        entities.insert(other);

        let mut owner = circle_entity("a", 0.0, 0.0, 5.0);
        owner.body = Body {
            velocity: Vector2::new(6.0, 0.5),
            mass: 1.0,
            friction: 0.0,
            bounciness: 1.0,
        };

        let before = owner.body.velocity + entities.get("b").unwrap().body.velocity;
        let hits = find_collisions(&owner, &entities, &blocks);
        assert_eq!(hits.len(), 1);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        let other = entities.get("b").unwrap();
        let after = owner.body.velocity + other.body.velocity;
        assert_approx_eq!(before.x, after.x, 1e-9);
        assert_approx_eq!(before.y, after.y, 1e-9);
        assert!(other.is_dirty());

        // Elastic: the relative normal velocity is reversed.
        let normal = (owner.position - other.position).normalize();
        let separating = (owner.body.velocity - other.body.velocity).dot(normal);
        assert!(separating > 0.0);
    }

    #[test]
    fn test_heavier_circle_moves_less() {
        let mut entities = EntityStore::new();
        let blocks = BlockStore::new();

        let mut heavy = circle_entity("heavy", 8.0, 0.0, 5.0);
        heavy.body.mass = 3.0;
        entities.insert(heavy);

        let mut owner = circle_entity("light", 0.0, 0.0, 5.0);
        let hits = find_collisions(&owner, &entities, &blocks);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);

        let heavy = entities.get("heavy").unwrap();
        // MTV of 2 split 3:1 towards the light owner.
        assert_approx_eq!(owner.position.x, -1.5, 1e-9);
        assert_approx_eq!(heavy.position.x, 8.5, 1e-9);
        assert!(owner.position.distance(heavy.position) >= 10.0 - 1e-9);
    }

    #[test]
    fn test_non_reacting_sides_are_ignored() {
        let mut entities = EntityStore::new();
        let blocks = BlockStore::new();

        let mut ghost = circle_entity("ghost", 5.0, 0.0, 5.0);
        ghost.reacts_to_collision = false;
        entities.insert(ghost);

        let mut owner = circle_entity("a", 0.0, 0.0, 5.0);
        let hits = find_collisions(&owner, &entities, &blocks);
        assert_eq!(hits.len(), 1);
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);
        assert_eq!(owner.position, Vector2::ZERO);

        let mut projectile = Entity::projectile("p", "p", Vector2::ZERO, Vector2::RIGHT);
        entities.insert(circle_entity("solid", 3.0, 0.0, 5.0));
        let hits = find_collisions(&projectile, &entities, &blocks);
        assert!(!hits.is_empty());
        resolve_collisions(&mut projectile, &hits, &mut entities, &blocks, 0.05);
        assert_eq!(projectile.position, Vector2::ZERO);
    }

    #[test]
    fn test_static_resolution_leaves_others_alone() {
        let blocks = BlockStore::new();
        let mut entities = EntityStore::new();
        entities.insert(circle_entity("remote", 15.0, 0.0, 10.0));

        let mut owner = circle_entity("owner", 0.0, 0.0, 10.0);
        owner.body.velocity = Vector2::new(100.0, 0.0);

        let hits = find_collisions(&owner, &entities, &blocks);
        assert_eq!(hits.len(), 1);
        resolve_collisions_static(&mut owner, &hits, &entities, &blocks, 0.05);

        let remote = entities.get("remote").unwrap();
        assert_eq!(remote.position, Vector2::new(15.0, 0.0));
        assert_eq!(remote.body.velocity, Vector2::ZERO);
        assert!(!remote.is_dirty());

        // The owner takes the whole correction and stops moving into it.
        assert_approx_eq!(owner.position.x, -5.0, 1e-9);
        assert!(owner.body.velocity.x <= 0.0);
        assert!(!overlaps_anything(&owner, &entities, &blocks));
    }

    #[test]
    fn test_stale_hit_is_harmless() {
        let mut entities = EntityStore::new();
        let blocks = BlockStore::new();
        entities.insert(circle_entity("b", 8.0, 0.0, 5.0));

        let mut owner = circle_entity("a", 0.0, 0.0, 5.0);
        let hits = find_collisions(&owner, &entities, &blocks);
        entities.get_mut("b").unwrap().set_position(Vector2::new(100.0, 0.0));

        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);
        assert_eq!(owner.position, Vector2::ZERO);

        entities.remove("b");
        resolve_collisions(&mut owner, &hits, &mut entities, &blocks, 0.05);
        assert_eq!(owner.position, Vector2::ZERO);
    }
}
