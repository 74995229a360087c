use crate::{EntityId, World, WorldError};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Health(u32);

#[derive(Debug, Clone, PartialEq)]
struct Name(String);

// Deliberately neither Clone nor Copy: the storage core must never need
// more than moves and drops.
#[derive(Debug, PartialEq)]
struct MoveOnly(Vec<u8>);

struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn spawn_and_get_round_trip() {
    let mut world = World::new();
    let e = world.spawn((
        Position { x: 1.0, y: 1.0 },
        Velocity { x: 2.0, y: 2.0 },
        Name("e".into()),
    ));

    assert_eq!(
        world.get::<&Position>(e).unwrap(),
        &Position { x: 1.0, y: 1.0 }
    );
    assert_eq!(
        world.get::<&Velocity>(e).unwrap(),
        &Velocity { x: 2.0, y: 2.0 }
    );
    assert_eq!(world.get::<&Name>(e).unwrap(), &Name("e".into()));

    let (p, v, n) = world.get::<(&Position, &Velocity, &Name)>(e).unwrap();
    assert_eq!(p, &Position { x: 1.0, y: 1.0 });
    assert_eq!(v, &Velocity { x: 2.0, y: 2.0 });
    assert_eq!(n, &Name("e".into()));
}

#[test]
fn despawn_leaves_other_entities_untouched() {
    let mut world = World::new();
    let e1 = world.spawn((Health(1),));
    let e2 = world.spawn((Health(2),));
    let e3 = world.spawn((Health(3),));

    world.despawn(e2).unwrap();

    assert_eq!(world.get::<&Health>(e1).unwrap(), &Health(1));
    assert_eq!(world.get::<&Health>(e3).unwrap(), &Health(3));
    assert_eq!(world.get::<&Health>(e2), Err(WorldError::NotFound(e2)));
    assert_eq!(world.len(), 2);

    // The survivors are still fully operational.
    world.add(e3, (Name("third".into()),)).unwrap();
    assert_eq!(world.get::<&Name>(e3).unwrap(), &Name("third".into()));
    world.despawn(e1).unwrap();
    assert_eq!(world.len(), 1);
}

#[test]
fn despawned_ids_stay_dead() {
    let mut world = World::new();
    let e = world.spawn((Health(1),));
    world.despawn(e).unwrap();

    assert_eq!(world.despawn(e), Err(WorldError::NotFound(e)));
    assert_eq!(world.get::<&Health>(e), Err(WorldError::NotFound(e)));
    assert_eq!(world.add(e, (Health(2),)), Err(WorldError::NotFound(e)));
    assert_eq!(world.remove::<(Health,)>(e), Err(WorldError::NotFound(e)));
}

#[test]
fn entity_ids_are_monotonic_and_never_reused() {
    let mut world = World::new();
    let mut seen: Vec<EntityId> = Vec::new();
    for i in 0..100u32 {
        let e = world.spawn((Health(i),));
        assert!(seen.iter().all(|&prev| prev < e));
        seen.push(e);
        if i % 3 == 0 {
            world.despawn(e).unwrap();
        }
    }
}

#[test]
fn equal_type_sets_share_an_archetype() {
    let mut world = World::new();
    let a = world.spawn((Position { x: 0.0, y: 0.0 }, Health(1)));
    let b = world.spawn((Health(2), Position { x: 1.0, y: 1.0 }));

    let (arch_a, _) = world.location(a).unwrap();
    let (arch_b, _) = world.location(b).unwrap();
    assert_eq!(arch_a, arch_b);
    assert_eq!(world.n_archetypes(), 1);

    assert_eq!(world.get::<&Health>(a).unwrap(), &Health(1));
    assert_eq!(world.get::<&Health>(b).unwrap(), &Health(2));
}

#[test]
fn add_with_overlap_only_overwrites() {
    let mut world = World::new();
    let e = world.spawn((Position { x: 0.0, y: 0.0 }, Health(10)));
    let (arch_before, _) = world.location(e).unwrap();
    let len_before = world.archetype(arch_before).unwrap().archetype().len();

    world.add(e, (Health(99),)).unwrap();

    let (arch_after, _) = world.location(e).unwrap();
    assert_eq!(arch_before, arch_after);
    assert_eq!(
        world.archetype(arch_after).unwrap().archetype().len(),
        len_before
    );
    assert_eq!(world.get::<&Health>(e).unwrap(), &Health(99));
    assert_eq!(
        world.get::<&Position>(e).unwrap(),
        &Position { x: 0.0, y: 0.0 }
    );
    assert_eq!(world.n_archetypes(), 1);
}

#[test]
fn add_new_component_migrates_between_archetypes() {
    let mut world = World::new();
    let e = world.spawn((Position { x: 1.0, y: 2.0 }, Health(5)));
    let other = world.spawn((Position { x: 9.0, y: 9.0 }, Health(7)));
    let (src_arch, _) = world.location(e).unwrap();
    assert_eq!(world.archetype(src_arch).unwrap().archetype().len(), 2);

    world.add(e, (Name("migrant".into()),)).unwrap();

    let (dst_arch, _) = world.location(e).unwrap();
    assert_ne!(src_arch, dst_arch);
    assert_eq!(world.archetype(src_arch).unwrap().archetype().len(), 1);
    assert_eq!(world.archetype(dst_arch).unwrap().archetype().len(), 1);

    // Carried-over values survive the migration; the overwrite target holds
    // the new value.
    let (p, h, n) = world.get::<(&Position, &Health, &Name)>(e).unwrap();
    assert_eq!(p, &Position { x: 1.0, y: 2.0 });
    assert_eq!(h, &Health(5));
    assert_eq!(n, &Name("migrant".into()));

    // The entity left behind is untouched.
    assert_eq!(world.get::<&Health>(other).unwrap(), &Health(7));
}

#[test]
fn add_can_simultaneously_extend_and_overwrite() {
    let mut world = World::new();
    let e = world.spawn((Health(1), Name("old".into())));

    world.add(e, (Name("new".into()), Position { x: 3.0, y: 4.0 })).unwrap();

    let (h, n, p) = world.get::<(&Health, &Name, &Position)>(e).unwrap();
    assert_eq!(h, &Health(1));
    assert_eq!(n, &Name("new".into()));
    assert_eq!(p, &Position { x: 3.0, y: 4.0 });
}

#[test]
fn remove_component_migrates_and_drops_it() {
    let mut world = World::new();
    let e = world.spawn((Position { x: 1.0, y: 1.0 }, Health(3), Name("e".into())));

    world.remove::<(Health,)>(e).unwrap();

    assert!(matches!(
        world.get::<&Health>(e),
        Err(WorldError::MissingComponent { .. })
    ));
    let (p, n) = world.get::<(&Position, &Name)>(e).unwrap();
    assert_eq!(p, &Position { x: 1.0, y: 1.0 });
    assert_eq!(n, &Name("e".into()));
}

#[test]
fn remove_missing_component_is_a_checked_error() {
    let mut world = World::new();
    let e = world.spawn((Position { x: 1.0, y: 1.0 },));
    let archetypes_before = world.n_archetypes();

    let err = world.remove::<(Health,)>(e).unwrap_err();
    assert!(matches!(err, WorldError::MissingComponent { entity, .. } if entity == e));

    // Nothing mutated: same archetype, same value, no new archetypes.
    assert_eq!(world.n_archetypes(), archetypes_before);
    assert_eq!(
        world.get::<&Position>(e).unwrap(),
        &Position { x: 1.0, y: 1.0 }
    );
}

#[test]
fn remove_of_no_types_is_a_noop() {
    let mut world = World::new();
    let e = world.spawn((Health(1),));
    let location = world.location(e).unwrap();

    world.remove::<()>(e).unwrap();
    assert_eq!(world.location(e).unwrap(), location);
}

#[test]
fn structural_lookup_is_idempotent() {
    let mut world = World::new();
    let a = world.spawn((Position { x: 0.0, y: 0.0 },));
    let b = world.spawn((Position { x: 1.0, y: 1.0 },));

    world.add(a, (Health(1),)).unwrap();
    world.add(b, (Health(2),)).unwrap();

    let (arch_a, _) = world.location(a).unwrap();
    let (arch_b, _) = world.location(b).unwrap();
    assert_eq!(arch_a, arch_b);

    // {Position} and {Position, Health}: exactly two archetypes ever.
    assert_eq!(world.n_archetypes(), 2);
}

#[test]
fn archetypes_are_never_pruned() {
    let mut world = World::new();
    let e = world.spawn((Health(1),));
    world.add(e, (Name("n".into()),)).unwrap();
    world.despawn(e).unwrap();

    // Both archetypes are empty but still present.
    assert_eq!(world.n_archetypes(), 2);
    assert!(world.archetypes().all(|rec| rec.archetype().is_empty()));
}

#[test]
fn get_mut_changes_are_visible_afterwards() {
    let mut world = World::new();
    let e = world.spawn((Name("before".into()), Health(1)));

    world.get_mut::<Name>(e).unwrap().0 = "after".into();
    assert_eq!(world.get::<&Name>(e).unwrap(), &Name("after".into()));

    let err = world.get_mut::<Velocity>(e).unwrap_err();
    assert!(matches!(err, WorldError::MissingComponent { entity, .. } if entity == e));
}

#[test]
fn move_only_components_survive_every_path() {
    let mut world = World::new();
    let e = world.spawn((MoveOnly(vec![1, 2, 3]),));
    world.add(e, (Health(1),)).unwrap();
    world.remove::<(Health,)>(e).unwrap();
    assert_eq!(world.get::<&MoveOnly>(e).unwrap(), &MoveOnly(vec![1, 2, 3]));
    world.despawn(e).unwrap();
}

#[test]
fn empty_component_set_spawns_into_empty_archetype() {
    let mut world = World::new();
    let e = world.spawn(());
    assert!(world.contains(e));
    assert_eq!(world.len(), 1);

    world.add(e, (Health(4),)).unwrap();
    assert_eq!(world.get::<&Health>(e).unwrap(), &Health(4));

    world.remove::<(Health,)>(e).unwrap();
    world.despawn(e).unwrap();
    assert!(world.is_empty());
}

#[test]
fn column_iteration_sees_every_live_entity() {
    let mut world = World::new();
    for i in 0..16u32 {
        world.spawn((Health(i), Position { x: i as f32, y: 0.0 }));
    }
    for i in 0..4u32 {
        world.spawn((Health(100 + i),));
    }

    let mut total = 0u32;
    let mut count = 0usize;
    for record in world.archetypes() {
        if let Some(col) = record.archetype().column::<Health>() {
            assert_eq!(col.len(), record.archetype().len());
            assert_eq!(record.entities().len(), record.archetype().len());
            count += col.len();
            total += col.iter().map(|h| h.0).sum::<u32>();
        }
    }
    assert_eq!(count, 20);
    assert_eq!(total, (0..16).sum::<u32>() + (100..104).sum::<u32>());
}

#[test]
fn drops_are_exact_across_migrations_and_world_drop() {
    let drops = Arc::new(AtomicUsize::new(0));
    {
        let mut world = World::new();
        let a = world.spawn((Counted(drops.clone()), Health(1)));
        let b = world.spawn((Counted(drops.clone()), Health(2)));
        let c = world.spawn((Counted(drops.clone()), Health(3)));

        // Migration relocates, it must not drop.
        world.add(a, (Name("a".into()),)).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // Overwrite drops exactly the replaced value.
        world.add(b, (Counted(drops.clone()),)).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // Removing the component drops it.
        world.remove::<(Counted,)>(c).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        // Despawn drops the whole row.
        world.despawn(a).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }
    // b's live value is released when the world goes away; c's was already
    // gone.
    assert_eq!(drops.load(Ordering::SeqCst), 4);
}

#[test]
fn add_rejects_duplicate_pack_types_before_mutating() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut world = World::new();
    let e = world.spawn((Counted(drops.clone()), Health(1)));

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        world
            .add(e, (Counted(drops.clone()), Name("a".into()), Name("b".into())))
            .unwrap();
    }))
    .is_err();
    assert!(panicked);

    // The rejected pack was dropped during unwind; the stored value was never
    // touched and is released exactly once when the world goes away.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(world.get::<&Health>(e).unwrap(), &Health(1));
    assert!(world.get::<&Counted>(e).is_ok());
    drop(world);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[test]
fn directory_stays_consistent_under_random_churn() {
    #[derive(Debug, Clone, PartialEq)]
    struct Model {
        health: u32,
        name: Option<String>,
    }

    let mut rng = rand::thread_rng();
    let mut world = World::new();
    let mut model: HashMap<EntityId, Model> = HashMap::new();

    for step in 0..2000u32 {
        let roll: u8 = rng.gen_range(0..10);
        let live: Vec<EntityId> = model.keys().copied().collect();

        if roll < 4 || live.is_empty() {
            let health = rng.gen::<u32>();
            let e = world.spawn((Health(health),));
            model.insert(
                e,
                Model {
                    health,
                    name: None,
                },
            );
        } else {
            let e = live[rng.gen_range(0..live.len())];
            match roll {
                4 | 5 => {
                    world.despawn(e).unwrap();
                    model.remove(&e);
                }
                6 | 7 => {
                    let name = format!("step{step}");
                    world.add(e, (Name(name.clone()),)).unwrap();
                    model.get_mut(&e).unwrap().name = Some(name);
                }
                8 => {
                    let m = model.get_mut(&e).unwrap();
                    if m.name.is_some() {
                        world.remove::<(Name,)>(e).unwrap();
                        m.name = None;
                    }
                }
                _ => {
                    let health = rng.gen::<u32>();
                    world.add(e, (Health(health),)).unwrap();
                    model.get_mut(&e).unwrap().health = health;
                }
            }
        }
    }

    assert_eq!(world.len(), model.len());
    for (&e, m) in &model {
        assert_eq!(world.get::<&Health>(e).unwrap(), &Health(m.health));
        match &m.name {
            Some(name) => assert_eq!(world.get::<&Name>(e).unwrap(), &Name(name.clone())),
            None => assert!(world.get::<&Name>(e).is_err()),
        }
    }

    // Storage invariants hold for every archetype ever created.
    for record in world.archetypes() {
        assert!(record.archetype().len() <= record.archetype().capacity());
        assert_eq!(record.entities().len(), record.archetype().len());
    }
}
