use std::collections::HashSet;

use proptest::prelude::*;

use kyroworld::{
    NodeClass, NodeId, RelationEntry, RelationKind, Tier, Value, World, WorldConfig, WorldResult,
};

const KIND: RelationKind = RelationKind::Attributes;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(usize, usize),
    Override(usize, usize),
    RemoveOverride(usize, usize),
    Remove(usize, usize),
    SetValue(usize, usize, i64),
}

fn op() -> impl Strategy<Value = Op> {
    let node = 0usize..4;
    let key = 0usize..3;
    prop_oneof![
        (node.clone(), key.clone()).prop_map(|(n, k)| Op::Add(n, k)),
        (node.clone(), key.clone()).prop_map(|(n, k)| Op::Override(n, k)),
        (node.clone(), key.clone()).prop_map(|(n, k)| Op::RemoveOverride(n, k)),
        (node.clone(), key.clone()).prop_map(|(n, k)| Op::Remove(n, k)),
        (node, key, -10i64..10).prop_map(|(n, k, v)| Op::SetValue(n, k, v)),
    ]
}

struct Diamond {
    world: World,
    nodes: [NodeId; 4],
    keys: [NodeId; 3],
}

/// a <- b, a <- c, {b, c} <- d
fn diamond(memoize: bool) -> Diamond {
    let config = WorldConfig {
        memoize_resolution: memoize,
        ..WorldConfig::default()
    };
    let mut world = World::new(config).unwrap();
    let keys = ["weight", "colour", "flammable"]
        .map(|name| world.create_node(NodeClass::Attribute, name).unwrap().id());
    let nodes = ["a", "b", "c", "d"]
        .map(|name| world.create_node(NodeClass::TangibleObject, name).unwrap().id());
    for (child, parent) in [(1, 0), (2, 0), (3, 1), (3, 2)] {
        assert!(world.add_parent(nodes[child], nodes[parent]).unwrap().is_success());
    }
    Diamond { world, nodes, keys }
}

/// A successful override, as (node, key, copy).
type Overridden = (NodeId, NodeId, NodeId);

fn apply(d: &mut Diamond, op: Op) -> Option<Overridden> {
    let w = &mut d.world;
    match op {
        Op::Add(n, k) => {
            let _ = w.add_relation(d.nodes[n], KIND, d.keys[k]).unwrap();
        }
        Op::Override(n, k) => {
            let (node, key) = (d.nodes[n], d.keys[k]);
            return w
                .override_relation(node, KIND, key)
                .unwrap()
                .success()
                .map(|copy| (node, key, copy));
        }
        Op::RemoveOverride(n, k) => {
            let _ = w.remove_override(d.nodes[n], KIND, d.keys[k]).unwrap();
        }
        Op::Remove(n, k) => {
            let _ = w.remove_relation(d.nodes[n], KIND, d.keys[k]).unwrap();
        }
        Op::SetValue(n, k, v) => {
            if let Some(entry) = w.find(d.nodes[n], KIND, d.keys[k]).unwrap() {
                let _ = w.set_value(entry.instance, Some(Value::Int(v))).unwrap();
            }
        }
    }
    None
}

type ViewFn = fn(&World, NodeId, RelationKind) -> WorldResult<Vec<RelationEntry>>;

fn keys_of(w: &World, node: NodeId, view: ViewFn) -> HashSet<NodeId> {
    view(w, node, KIND).unwrap().into_iter().map(|e| e.target).collect()
}

fn check_partition(d: &Diamond) -> Result<(), TestCaseError> {
    let w = &d.world;
    for &node in &d.nodes {
        let personal = keys_of(w, node, World::personal);
        let overridden = keys_of(w, node, World::overridden);
        let inherited = keys_of(w, node, World::inherited);
        prop_assert!(personal.is_disjoint(&overridden), "{node}: personal and overridden share a key");
        prop_assert!(inherited.is_disjoint(&overridden), "{node}: overridden key still inherited");

        let effective = w.effective(node, KIND).unwrap();
        let expected = w.personal(node, KIND).unwrap().len()
            + w.inherited(node, KIND).unwrap().len()
            + w.overridden(node, KIND).unwrap().len();
        prop_assert_eq!(effective.len(), expected);

        for key in &overridden {
            let hits = effective.iter().filter(|e| e.target == *key).count();
            prop_assert_eq!(hits, 1, "{}: overridden key {} seen {} times", node, key, hits);
        }
    }
    Ok(())
}

fn check_override(d: &Diamond, (node, key, copy): Overridden) -> Result<(), TestCaseError> {
    let effective = d.world.effective(node, KIND).unwrap();
    let hits: Vec<&RelationEntry> = effective.iter().filter(|e| e.target == key).collect();
    prop_assert_eq!(hits.len(), 1);
    prop_assert_eq!(hits[0].tier, Tier::Overridden);
    prop_assert_eq!(hits[0].instance, copy);
    prop_assert_eq!(hits[0].owner, node);
    Ok(())
}

proptest! {
    #[test]
    fn personal_and_overridden_never_share_a_key(ops in prop::collection::vec(op(), 0..40)) {
        let mut d = diamond(true);
        for op in ops {
            if let Some(done) = apply(&mut d, op) {
                check_override(&d, done)?;
            }
            check_partition(&d)?;
        }
    }

    #[test]
    fn removing_an_absent_key_leaves_effective_alone(
        ops in prop::collection::vec(op(), 0..30),
        node in 0usize..4,
        key in 0usize..3,
    ) {
        let mut d = diamond(true);
        for op in ops {
            apply(&mut d, op);
        }
        let (n, k) = (d.nodes[node], d.keys[key]);
        prop_assume!(!d.world.has_personal(n, KIND, k).unwrap());
        prop_assume!(!d.world.has_overridden(n, KIND, k).unwrap());
        let before = d.world.effective(n, KIND).unwrap();

        prop_assert!(d.world.remove_relation(n, KIND, k).unwrap().is_fail());
        prop_assert!(d.world.remove_override(n, KIND, k).unwrap().is_fail());
        prop_assert_eq!(d.world.effective(n, KIND).unwrap(), before);
    }

    #[test]
    fn memoization_does_not_change_results(ops in prop::collection::vec(op(), 0..30)) {
        let mut cached = diamond(true);
        let mut plain = diamond(false);
        for op in ops {
            apply(&mut cached, op);
            apply(&mut plain, op);
        }
        for i in 0..4 {
            prop_assert_eq!(
                cached.world.effective(cached.nodes[i], KIND).unwrap(),
                plain.world.effective(plain.nodes[i], KIND).unwrap()
            );
        }
    }
}
