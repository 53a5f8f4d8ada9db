use kyroworld::{NodeClass, RelationKind, RelationViews, Tier, Value, World, WorldConfig};

fn world() -> World {
    World::new(WorldConfig::default()).unwrap()
}

#[test]
fn removed_nodes_leave_no_rows_behind() {
    let mut w = world();
    let wood = w.create_node(NodeClass::Compound, "wood").unwrap();
    let cellulose = w.create_node(NodeClass::Substance, "cellulose").unwrap();
    let oak = w.create_node(NodeClass::Attribute, "oak").unwrap();
    let leg = w.create_node(NodeClass::TangibleObject, "leg").unwrap();
    let table = w.create_node(NodeClass::TangibleObject, "table").unwrap();
    let desk = w.create_node(NodeClass::TangibleObject, "desk").unwrap();
    assert!(desk.add_parent(&mut w, table).unwrap().is_success());

    let matter = table.add_matter(&mut w, wood).unwrap().success().unwrap();
    let substance = matter.add_substance(&mut w, cellulose).unwrap().success().unwrap();
    assert!(substance.set_value(&mut w, Some(Value::Float(0.4))).unwrap().is_success());
    let part = table.add_part(&mut w, leg).unwrap().success().unwrap();
    let finish = part.add_attribute(&mut w, oak).unwrap().success().unwrap();
    let desk_matter = desk.override_matter(&mut w, wood).unwrap().success().unwrap();

    let owned = [table.id(), matter.id(), substance.id(), part.id(), finish.id()];
    let types: Vec<_> = owned.iter().map(|id| w.node_type(*id).unwrap()).collect();

    let removed = table.remove(&mut w).unwrap().success().unwrap();
    assert_eq!(removed, owned.len());

    for (id, node_type) in owned.iter().zip(types) {
        assert!(!w.contains(*id));
        assert_eq!(w.store().owned_row_count(*id, node_type).unwrap(), 0, "{id} left rows");
    }

    // the child keeps its own override; only the parent edge goes
    assert!(w.contains(desk.id()));
    assert!(w.parents(desk.id()).is_empty());
    let matter_left = desk.matter(&w).unwrap();
    assert_eq!(matter_left.len(), 1);
    assert_eq!(matter_left[0].instance, desk_matter.id());
    assert_eq!(matter_left[0].tier, Tier::Overridden);
    assert!(desk.parts(&w).unwrap().is_empty());

    // targets are not owned
    for target in [wood.id(), cellulose.id(), oak.id(), leg.id()] {
        assert!(w.contains(target));
    }
}

#[test]
fn shared_targets_are_not_removed_twice() {
    let mut w = world();
    let weight = w.create_node(NodeClass::Attribute, "weight").unwrap();
    let house = w.create_node(NodeClass::TangibleObject, "house").unwrap();
    let door = w.create_node(NodeClass::TangibleObject, "door").unwrap();
    let window = w.create_node(NodeClass::TangibleObject, "window").unwrap();

    let door_part = house.add_part(&mut w, door).unwrap().success().unwrap();
    let window_part = house.add_part(&mut w, window).unwrap().success().unwrap();
    assert!(door_part.add_attribute(&mut w, weight).unwrap().is_success());
    assert!(window_part.add_attribute(&mut w, weight).unwrap().is_success());
    assert_eq!(w.referrers(weight.id()).unwrap().len(), 2);

    assert_eq!(house.remove(&mut w).unwrap().success(), Some(5));
    assert!(w.referrers(weight.id()).unwrap().is_empty());
    assert!(w.contains(door.id()));
}

#[test]
fn removing_absent_keys_changes_nothing() {
    let mut w = world();
    let weight = w.create_node(NodeClass::Attribute, "weight").unwrap();
    let colour = w.create_node(NodeClass::Attribute, "colour").unwrap();
    let rock = w.create_node(NodeClass::TangibleObject, "rock").unwrap();
    let pebble = w.create_node(NodeClass::TangibleObject, "pebble").unwrap();
    assert!(pebble.add_parent(&mut w, rock).unwrap().is_success());
    assert!(rock.add_attribute(&mut w, weight).unwrap().is_success());

    let before = pebble.attributes(&w).unwrap();
    assert!(pebble.remove_attribute(&mut w, colour).unwrap().is_fail());
    // inherited keys are not the child's to remove
    assert!(pebble.remove_attribute(&mut w, weight).unwrap().is_fail());
    assert!(pebble.remove_attribute_override(&mut w, weight).unwrap().is_fail());
    assert_eq!(pebble.attributes(&w).unwrap(), before);
}

#[test]
fn removing_a_node_twice_fails() {
    let mut w = world();
    let a = w.create_node(NodeClass::Entity, "a").unwrap();
    assert_eq!(a.remove(&mut w).unwrap().success(), Some(1));
    assert!(a.remove(&mut w).unwrap().is_fail());
    assert!(w.has(a.id(), RelationKind::Attributes, a.id()).is_err());
}
