//! Branch semantics: copy-on-write isolation, lifecycle rules, and
//! asynchronous reclamation.

use sediment::prelude::*;

fn db() -> Sediment {
    Sediment::ephemeral().unwrap()
}

#[test]
fn child_mirrors_parent_until_divergence() {
    let db = db();
    db.set("shared", Value::Int(1)).unwrap();

    db.create_branch("dev").unwrap();
    db.switch_branch("dev").unwrap();
    // Nothing was copied; the read walks up to the parent.
    assert_eq!(db.get("shared").unwrap(), Some(Value::Int(1)));

    db.set("shared", Value::Int(2)).unwrap();
    assert_eq!(db.get("shared").unwrap(), Some(Value::Int(2)));

    db.switch_branch("main").unwrap();
    assert_eq!(db.get("shared").unwrap(), Some(Value::Int(1)));
}

#[test]
fn parent_writes_after_fork_reach_undiverged_children() {
    let db = db();
    db.create_branch("dev").unwrap();

    // Written on main after the fork; dev has not diverged on this key.
    db.set("late", Value::Int(7)).unwrap();

    db.switch_branch("dev").unwrap();
    assert_eq!(db.get("late").unwrap(), Some(Value::Int(7)));
}

#[test]
fn sibling_branches_are_isolated() {
    let db = db();
    db.set("k", Value::from("base")).unwrap();
    db.create_branch("left").unwrap();
    db.create_branch("right").unwrap();

    db.switch_branch("left").unwrap();
    db.set("k", Value::from("left")).unwrap();

    db.switch_branch("right").unwrap();
    assert_eq!(db.get("k").unwrap(), Some(Value::from("base")));
    db.set("k", Value::from("right")).unwrap();

    db.switch_branch("left").unwrap();
    assert_eq!(db.get("k").unwrap(), Some(Value::from("left")));
}

#[test]
fn keys_are_namespaced_per_primitive() {
    let db = db();
    db.submit(PrimitiveTag::Kv, "x", Value::Int(1), DurabilityMode::NoDurability)
        .unwrap()
        .wait()
        .unwrap();
    db.submit(PrimitiveTag::Json, "x", Value::Int(2), DurabilityMode::NoDurability)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(db.get_tagged(PrimitiveTag::Kv, "x").unwrap(), Some(Value::Int(1)));
    assert_eq!(db.get_tagged(PrimitiveTag::Json, "x").unwrap(), Some(Value::Int(2)));
}

#[test]
fn switch_is_rejected_for_unknown_branch() {
    let db = db();
    let err = db.switch_branch("ghost").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn delete_active_branch_is_rejected() {
    let db = db();
    let err = db.delete_branch("main").unwrap_err();
    assert!(err.is_branch_error());
    // Still usable.
    db.set("k", Value::Int(1)).unwrap();
}

#[test]
fn delete_with_live_descendants_is_rejected() {
    let db = db();
    db.create_branch("dev").unwrap();
    db.switch_branch("dev").unwrap();
    db.create_branch("leaf").unwrap();
    db.switch_branch("main").unwrap();

    let err = db.delete_branch("dev").unwrap_err();
    assert!(err.is_branch_error());

    // Removing the leaf unblocks the parent.
    db.delete_branch("leaf").unwrap();
    db.delete_branch("dev").unwrap();
}

#[test]
fn deleted_branch_rejects_operations() {
    let db = db();
    db.create_branch("dev").unwrap();
    let dev = db.engine().branch("dev").unwrap().id;
    db.delete_branch("dev").unwrap();

    assert!(db.switch_branch("dev").is_err());
    assert!(db
        .engine()
        .get_on(dev, PrimitiveTag::Kv, &Key::from("k"))
        .is_err());
}

#[test]
fn delete_returns_before_reclamation_completes() {
    let db = db();
    db.create_branch("dev").unwrap();
    db.switch_branch("dev").unwrap();
    for i in 0..100 {
        db.set(format!("k{i}"), Value::Int(i)).unwrap();
    }
    db.switch_branch("main").unwrap();
    let dev = db.list_branches().into_iter().find(|b| b.name == "dev").unwrap().id;

    db.delete_branch("dev").unwrap();
    // Immediately observable as deleted, even if storage is still held.
    let status = db.reclamation_status(dev);
    assert!(matches!(
        status,
        ReclamationStatus::Pending | ReclamationStatus::Reclaimed
    ));

    db.engine().await_reclamation();
    assert_eq!(db.reclamation_status(dev), ReclamationStatus::Reclaimed);
}

#[test]
fn reclamation_spares_pages_shared_with_parent() {
    let db = db();
    db.set("keep", Value::from("still here")).unwrap();

    db.create_branch("doomed").unwrap();
    db.switch_branch("doomed").unwrap();
    db.set("own", Value::from("goes away")).unwrap();
    db.switch_branch("main").unwrap();

    db.delete_branch("doomed").unwrap();
    db.engine().await_reclamation();

    // The parent's data was only inherited, never owned by the child.
    assert_eq!(db.get("keep").unwrap(), Some(Value::from("still here")));
}

#[test]
fn pinned_read_survives_concurrent_delete() {
    let db = db();
    db.create_branch("dev").unwrap();
    db.switch_branch("dev").unwrap();
    db.set("held", Value::from("pinned")).unwrap();
    let dev = db.current_branch().unwrap().id;
    db.switch_branch("main").unwrap();

    let pin = db
        .engine()
        .get_pinned(dev, PrimitiveTag::Kv, &Key::from("held"))
        .unwrap()
        .unwrap();

    db.delete_branch("dev").unwrap();
    db.engine().await_reclamation();

    // The pin defers the page's release until dropped.
    assert_eq!(pin.value(), Some(Value::from("pinned")));
    drop(pin);
}

#[test]
fn branch_name_is_reusable_after_delete() {
    let db = db();
    db.create_branch("scratch").unwrap();
    db.delete_branch("scratch").unwrap();

    db.create_branch("scratch").unwrap();
    db.switch_branch("scratch").unwrap();
    db.set("k", Value::Int(1)).unwrap();
    assert_eq!(db.get("k").unwrap(), Some(Value::Int(1)));
}

#[test]
fn branch_from_named_base_without_switching() {
    let db = db();
    db.set("k", Value::Int(1)).unwrap();
    db.create_branch("dev").unwrap();
    let dev = db.engine().branch("dev").unwrap().id;

    // Fork off dev directly; the active pointer stays on main.
    db.create_branch_from("leaf", dev).unwrap();
    assert_eq!(db.current_branch().unwrap().name, "main");

    let leaf = db.engine().branch("leaf").unwrap();
    assert_eq!(leaf.parent, Some(dev));

    // The grandchild inherits through its lineage.
    db.switch_branch("leaf").unwrap();
    assert_eq!(db.get("k").unwrap(), Some(Value::Int(1)));
}

#[test]
fn branch_from_unknown_base_is_rejected() {
    let db = db();
    let err = db.create_branch_from("leaf", BranchId::new()).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn branch_from_deleted_base_is_rejected() {
    let db = db();
    db.create_branch("dead").unwrap();
    let dead = db.engine().branch("dead").unwrap().id;
    db.delete_branch("dead").unwrap();

    let err = db.create_branch_from("leaf", dead).unwrap_err();
    assert!(err.is_branch_error());
}

#[test]
fn lineage_is_recorded() {
    let db = db();
    let main = db.current_branch().unwrap();
    assert_eq!(main.parent, None);

    db.create_branch("dev").unwrap();
    let dev = db.engine().branch("dev").unwrap();
    assert_eq!(dev.parent, Some(main.id));
    assert_eq!(dev.state, BranchState::Inactive);
}
