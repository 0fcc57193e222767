//! End-to-end engine tests over the in-memory store
//!
//! Exercises the full create/link/query lifecycle: required-attribute
//! enforcement, cardinality shapes, mirrored entries, filter criteria and
//! candidate listings.

use std::collections::BTreeMap;

use mdt::assoc::{
    AssociationDefinition, AssociationEngine, AssociationRule, AttributeFilter, Cardinality,
    FilterPredicate, TargetQuery, ValidationRule,
};
use mdt::catalog::{AttributeDefinition, AttributeGroup};
use mdt::core::{AttributeKind, CoreError, EntityId};
use mdt::hierarchy::{CategoryNode, FamilyNode, ItemTypeNode};
use mdt::item::{ItemService, NewItem};
use mdt::store::Store;

/// Textile-trading fixture: orders, customers and fabrics under one
/// category/family pair
struct Fixture {
    store: Store,
}

impl Fixture {
    fn new() -> Self {
        let store = Store::in_memory();

        let name = AttributeDefinition::new("name".into(), AttributeKind::Text, true, "test");
        let name = store.attributes.insert(name).unwrap();
        let material =
            AttributeDefinition::new("material".into(), AttributeKind::Text, true, "test");
        let material = store.attributes.insert(material).unwrap();
        let mut price = AttributeDefinition::new("price".into(), AttributeKind::Number, true, "test");
        price.constraints.min_value = Some(0.0);
        let price = store.attributes.insert(price).unwrap();

        let mut core = AttributeGroup::new("core".into(), "test");
        core.add_attribute(name.id);
        let core = store.groups.insert(core).unwrap();

        let mut fabric_specs = AttributeGroup::new("fabric_specs".into(), "test");
        fabric_specs.add_attribute(material.id);
        fabric_specs.add_attribute(price.id);
        let fabric_specs = store.groups.insert(fabric_specs).unwrap();

        let mut sales = CategoryNode::new("sales".into(), None, "test");
        sales.groups = vec![core.id];
        let sales = store.categories.insert(sales).unwrap();

        let general = FamilyNode::new("general".into(), sales.id, None, "test");
        let general = store.families.insert(general).unwrap();

        for code in ["order", "customer"] {
            let node = ItemTypeNode::new(code.into(), sales.id, "test");
            store.item_types.insert(node).unwrap();
        }
        let mut fabric = ItemTypeNode::new("fabric".into(), sales.id, "test");
        fabric.groups = vec![fabric_specs.id];
        store.item_types.insert(fabric).unwrap();

        Self { store }
    }

    fn service(&self) -> ItemService<'_> {
        ItemService::new(&self.store)
    }

    fn engine(&self) -> AssociationEngine<'_> {
        AssociationEngine::new(&self.store)
    }

    fn create(&self, item_type: &str, attrs: &[(&str, serde_json::Value)]) -> EntityId {
        let mut attributes = BTreeMap::new();
        for (code, value) in attrs {
            attributes.insert(code.to_string(), value.clone());
        }
        self.service()
            .create_item(
                NewItem {
                    item_type: item_type.into(),
                    category: "sales".into(),
                    family: "general".into(),
                    attributes,
                    associations: Vec::new(),
                },
                "test",
            )
            .unwrap()
            .id
    }

    fn customer(&self, name: &str) -> EntityId {
        self.create("customer", &[("name", serde_json::json!(name))])
    }

    fn order(&self, name: &str) -> EntityId {
        self.create("order", &[("name", serde_json::json!(name))])
    }

    fn fabric(&self, name: &str, material: &str, price: f64) -> EntityId {
        self.create(
            "fabric",
            &[
                ("name", serde_json::json!(name)),
                ("material", serde_json::json!(material)),
                ("price", serde_json::json!(price)),
            ],
        )
    }

    fn definition(&self, code: &str, cardinality: Cardinality, target: &str) -> EntityId {
        let def = AssociationDefinition::new(
            code.into(),
            cardinality,
            vec!["order".into()],
            vec![target.into()],
            "test",
        );
        self.store.definitions.insert(def).unwrap().id
    }

    fn rule(&self, code: &str, def: EntityId, cardinality: Cardinality, target: &str) -> AssociationRule {
        let rule = AssociationRule::new(
            code.into(),
            def,
            "order".into(),
            target.into(),
            cardinality,
            "test",
        );
        self.engine().define_rule(rule).unwrap()
    }
}

#[test]
fn test_create_reports_every_missing_required_attribute() {
    let fx = Fixture::new();
    let err = fx
        .service()
        .create_item(
            NewItem {
                item_type: "fabric".into(),
                category: "sales".into(),
                family: "general".into(),
                attributes: BTreeMap::new(),
                associations: Vec::new(),
            },
            "test",
        )
        .unwrap_err();

    match err {
        CoreError::Validation(failure) => {
            let reasons = failure.reasons().join("\n");
            assert!(reasons.contains("name"));
            assert!(reasons.contains("material"));
            assert!(reasons.contains("price"));
        }
        other => panic!("expected validation failure, got {other}"),
    }
    assert!(fx.store.items.list().unwrap().is_empty());
}

#[test]
fn test_constraint_violation_blocks_creation() {
    let fx = Fixture::new();
    let err = fx
        .service()
        .create_item(
            NewItem {
                item_type: "fabric".into(),
                category: "sales".into(),
                family: "general".into(),
                attributes: BTreeMap::from([
                    ("name".to_string(), serde_json::json!("Linen")),
                    ("material".to_string(), serde_json::json!("linen")),
                    ("price".to_string(), serde_json::json!(-2.0)),
                ]),
                associations: Vec::new(),
            },
            "test",
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(fx.store.items.list().unwrap().is_empty());
}

#[test]
fn test_many_to_one_key_replaces_and_scrubs_old_mirror() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    fx.rule("ORDER_CUSTOMER", def, Cardinality::ManyToOne, "customer");

    let order = fx.order("SO-1001");
    let first = fx.customer("Jane");
    let second = fx.customer("Ravi");

    let engine = fx.engine();
    engine
        .add_association(order, &[first], "ORDER_CUSTOMER", "test")
        .unwrap();
    engine
        .add_association(order, &[second], "ORDER_CUSTOMER", "test")
        .unwrap();

    let stored = fx.store.must_item(order).unwrap();
    assert_eq!(stored.linked_ids("customer_many-to-one"), vec![second]);

    // Mirror moved with the replacement
    let old = fx.store.must_item(first).unwrap();
    assert!(old.linked_ids("order_one-to-many").is_empty());
    let new = fx.store.must_item(second).unwrap();
    assert_eq!(new.linked_ids("order_one-to-many"), vec![order]);
}

#[test]
fn test_single_cardinality_rejects_multi_target_batch() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    fx.rule("ORDER_CUSTOMER", def, Cardinality::ManyToOne, "customer");

    let order = fx.order("SO-1001");
    let a = fx.customer("Jane");
    let b = fx.customer("Ravi");

    let err = fx
        .engine()
        .add_association(order, &[a, b], "ORDER_CUSTOMER", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(fx.store.must_item(order).unwrap().associations.is_empty());
}

#[test]
fn test_remove_and_readd_restores_both_sides() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    fx.rule("ORDER_FABRIC", def, Cardinality::ManyToMany, "fabric");

    let order = fx.order("SO-1001");
    let cotton = fx.fabric("Cotton Twill", "cotton", 12.5);
    let silk = fx.fabric("Silk Plain", "silk", 48.0);

    let engine = fx.engine();
    engine
        .add_association(order, &[cotton, silk], "ORDER_FABRIC", "test")
        .unwrap();
    engine
        .remove_association(order, &[silk], "ORDER_FABRIC", "test")
        .unwrap();

    assert_eq!(
        fx.store.must_item(order).unwrap().linked_ids("fabric_many-to-many"),
        vec![cotton]
    );
    assert!(fx
        .store
        .must_item(silk)
        .unwrap()
        .linked_ids("order_many-to-many")
        .is_empty());

    engine
        .add_association(order, &[silk], "ORDER_FABRIC", "test")
        .unwrap();
    assert_eq!(
        fx.store.must_item(order).unwrap().linked_ids("fabric_many-to-many"),
        vec![cotton, silk]
    );
    assert_eq!(
        fx.store.must_item(silk).unwrap().linked_ids("order_many-to-many"),
        vec![order]
    );
}

#[test]
fn test_removing_absent_target_is_a_noop() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    fx.rule("ORDER_FABRIC", def, Cardinality::ManyToMany, "fabric");

    let order = fx.order("SO-1001");
    let cotton = fx.fabric("Cotton Twill", "cotton", 12.5);
    let never_linked = fx.fabric("Wool Felt", "wool", 30.0);

    let engine = fx.engine();
    engine
        .add_association(order, &[cotton], "ORDER_FABRIC", "test")
        .unwrap();
    engine
        .remove_association(order, &[never_linked], "ORDER_FABRIC", "test")
        .unwrap();
    assert_eq!(
        fx.store.must_item(order).unwrap().linked_ids("fabric_many-to-many"),
        vec![cotton]
    );
}

#[test]
fn test_criteria_gate_candidates_and_adds() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    let mut rule = AssociationRule::new(
        "ORDER_COTTON".into(),
        def,
        "order".into(),
        "fabric".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.criteria.attributes.push(AttributeFilter {
        attribute: "material".into(),
        predicate: FilterPredicate::Equals {
            value: serde_json::json!("cotton"),
        },
    });
    rule.searchable = vec!["name".into()];
    fx.engine().define_rule(rule).unwrap();

    let order = fx.order("SO-1001");
    let cotton = fx.fabric("Cotton Twill", "cotton", 12.5);
    let silk = fx.fabric("Silk Plain", "silk", 48.0);

    let engine = fx.engine();
    let page = engine
        .filtered_targets(order, "ORDER_COTTON", &TargetQuery::default())
        .unwrap();
    let ids: Vec<EntityId> = page.items.iter().map(|i| i.id).collect();
    assert!(ids.contains(&cotton));
    assert!(!ids.contains(&silk));

    let err = engine
        .add_association(order, &[silk], "ORDER_COTTON", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn test_candidate_search_and_pagination() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    let mut rule = AssociationRule::new(
        "ORDER_FABRIC".into(),
        def,
        "order".into(),
        "fabric".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.searchable = vec!["name".into(), "material".into()];
    fx.engine().define_rule(rule).unwrap();

    let order = fx.order("SO-1001");
    for i in 0..5 {
        fx.fabric(&format!("Cotton {i}"), "cotton", 10.0 + i as f64);
    }
    fx.fabric("Silk Plain", "silk", 48.0);

    let engine = fx.engine();
    let query = TargetQuery {
        search: Some("cotton".into()),
        page_size: 2,
        ..Default::default()
    };
    let page = engine.filtered_targets(order, "ORDER_FABRIC", &query).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);

    let last = TargetQuery {
        search: Some("cotton".into()),
        page: 2,
        page_size: 2,
        ..Default::default()
    };
    let page = engine.filtered_targets(order, "ORDER_FABRIC", &last).unwrap();
    assert_eq!(page.items.len(), 1);
}

#[test]
fn test_batch_over_max_count_applies_nothing() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    let mut rule = AssociationRule::new(
        "ORDER_FABRIC_SELECTION".into(),
        def,
        "order".into(),
        "fabric".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.validations = vec![
        ValidationRule::MinCount { count: 1 },
        ValidationRule::MaxCount { count: 3 },
        ValidationRule::Unique,
    ];
    fx.engine().define_rule(rule).unwrap();

    let order = fx.order("SO-1001");
    let fabrics: Vec<EntityId> = (0..4)
        .map(|i| fx.fabric(&format!("Fabric {i}"), "cotton", 10.0))
        .collect();

    let engine = fx.engine();
    let err = engine
        .add_association(order, &fabrics, "ORDER_FABRIC_SELECTION", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    // Nothing applied, on either side
    assert!(fx.store.must_item(order).unwrap().associations.is_empty());
    for fabric in &fabrics {
        assert!(fx.store.must_item(*fabric).unwrap().associations.is_empty());
    }

    engine
        .add_association(order, &fabrics[..3], "ORDER_FABRIC_SELECTION", "test")
        .unwrap();
    assert_eq!(
        fx.store
            .must_item(order)
            .unwrap()
            .linked_ids("fabric_many-to-many")
            .len(),
        3
    );
}

#[test]
fn test_create_with_failing_association_persists_nothing() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    fx.rule("ORDER_FABRIC", def, Cardinality::ManyToMany, "fabric");

    let customer = fx.customer("Jane");
    let before = fx.store.items.list().unwrap().len();

    // Customer is not a fabric, so the staged link must fail
    let err = fx
        .service()
        .create_item(
            NewItem {
                item_type: "order".into(),
                category: "sales".into(),
                family: "general".into(),
                attributes: BTreeMap::from([("name".to_string(), serde_json::json!("SO-1"))]),
                associations: vec![("ORDER_FABRIC".to_string(), vec![customer])],
            },
            "test",
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(fx.store.items.list().unwrap().len(), before);
}

#[test]
fn test_create_with_association_links_both_sides() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    fx.rule("ORDER_CUSTOMER", def, Cardinality::ManyToOne, "customer");

    let customer = fx.customer("Jane");
    let order = fx
        .service()
        .create_item(
            NewItem {
                item_type: "order".into(),
                category: "sales".into(),
                family: "general".into(),
                attributes: BTreeMap::from([("name".to_string(), serde_json::json!("SO-1"))]),
                associations: vec![("ORDER_CUSTOMER".to_string(), vec![customer])],
            },
            "test",
        )
        .unwrap();

    assert_eq!(order.linked_ids("customer_many-to-one"), vec![customer]);
    assert_eq!(
        fx.store.must_item(customer).unwrap().linked_ids("order_one-to-many"),
        vec![order.id]
    );
}

#[test]
fn test_metadata_reports_broken_and_capacity() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    fx.rule("ORDER_CUSTOMER", def, Cardinality::ManyToOne, "customer");

    let order = fx.order("SO-1001");
    let customer = fx.customer("Jane");
    fx.customer("Ravi");

    let engine = fx.engine();
    engine
        .add_association(order, &[customer], "ORDER_CUSTOMER", "test")
        .unwrap();

    let meta = engine.association_metadata(order, "ORDER_CUSTOMER").unwrap();
    assert_eq!(meta.selected, vec![customer]);
    assert!(meta.broken.is_empty());
    assert!(!meta.can_add_more);

    // Deactivating the linked customer breaks the link
    fx.service().deactivate_item(customer, "test").unwrap();
    let meta = engine.association_metadata(order, "ORDER_CUSTOMER").unwrap();
    assert_eq!(meta.broken, vec![customer]);
}

#[test]
fn test_delete_scrubs_own_mirrors_and_honors_cascade() {
    let fx = Fixture::new();
    let def = fx.definition("order_fabric", Cardinality::ManyToMany, "fabric");
    let mut rule = AssociationRule::new(
        "ORDER_FABRIC".into(),
        def,
        "order".into(),
        "fabric".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.cascade_delete = true;
    fx.engine().define_rule(rule).unwrap();

    let order = fx.order("SO-1001");
    let fabric = fx.fabric("Cotton Twill", "cotton", 12.5);

    let engine = fx.engine();
    engine
        .add_association(order, &[fabric], "ORDER_FABRIC", "test")
        .unwrap();

    // Deleting the target scrubs the owner's forward link (cascade)
    fx.service().delete_item(fabric, "test").unwrap();
    assert!(fx.store.must_item(order).unwrap().associations.is_empty());

    // Deleting a source always scrubs its mirrors from targets
    let fabric = fx.fabric("Silk Plain", "silk", 48.0);
    engine
        .add_association(order, &[fabric], "ORDER_FABRIC", "test")
        .unwrap();
    fx.service().delete_item(order, "test").unwrap();
    assert!(fx.store.must_item(fabric).unwrap().associations.is_empty());
}

#[test]
fn test_required_rule_blocks_emptying_removal() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    let mut rule = AssociationRule::new(
        "ORDER_CUSTOMER".into(),
        def,
        "order".into(),
        "customer".into(),
        Cardinality::ManyToOne,
        "test",
    );
    rule.required = true;
    fx.engine().define_rule(rule).unwrap();

    let order = fx.order("SO-1001");
    let customer = fx.customer("Jane");

    let engine = fx.engine();
    engine
        .add_association(order, &[customer], "ORDER_CUSTOMER", "test")
        .unwrap();
    let err = engine
        .remove_association(order, &[customer], "ORDER_CUSTOMER", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(
        fx.store.must_item(order).unwrap().linked_ids("customer_many-to-one"),
        vec![customer]
    );
}

#[test]
fn test_reverse_initiation_respects_directional_flag() {
    let fx = Fixture::new();

    // Non-directional: the customer side may initiate
    let def = fx.definition("order_customer", Cardinality::ManyToOne, "customer");
    fx.rule("ORDER_CUSTOMER", def, Cardinality::ManyToOne, "customer");

    let order = fx.order("SO-1001");
    let customer = fx.customer("Jane");

    let engine = fx.engine();
    engine
        .add_association(customer, &[order], "ORDER_CUSTOMER", "test")
        .unwrap();
    assert_eq!(
        fx.store.must_item(order).unwrap().linked_ids("customer_many-to-one"),
        vec![customer]
    );

    // Directional: only the order side may
    let mut directed = AssociationDefinition::new(
        "order_fabric".into(),
        Cardinality::ManyToMany,
        vec!["order".into()],
        vec!["fabric".into()],
        "test",
    );
    directed.directional = true;
    let directed = fx.store.definitions.insert(directed).unwrap();
    let rule = AssociationRule::new(
        "ORDER_FABRIC".into(),
        directed.id,
        "order".into(),
        "fabric".into(),
        Cardinality::ManyToMany,
        "test",
    );
    fx.engine().define_rule(rule).unwrap();

    let fabric = fx.fabric("Cotton Twill", "cotton", 12.5);
    let err = engine
        .add_association(fabric, &[order], "ORDER_FABRIC", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn test_reverse_batch_failure_applies_zero_links() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToMany, "customer");
    let mut rule = AssociationRule::new(
        "ORDER_CUSTOMER".into(),
        def,
        "order".into(),
        "customer".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.validations = vec![ValidationRule::Unique];
    fx.engine().define_rule(rule).unwrap();

    let order_a = fx.order("SO-1001");
    let order_b = fx.order("SO-1002");
    let customer = fx.customer("Jane");

    let engine = fx.engine();
    engine
        .add_association(order_a, &[customer], "ORDER_CUSTOMER", "test")
        .unwrap();

    // From the customer side, the second partner already holds the link;
    // the first partner must not keep a link from the failed batch.
    let err = engine
        .add_association(customer, &[order_b, order_a], "ORDER_CUSTOMER", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    assert!(fx
        .store
        .must_item(order_b)
        .unwrap()
        .linked_ids("customer_many-to-many")
        .is_empty());
    assert_eq!(
        fx.store
            .must_item(customer)
            .unwrap()
            .linked_ids("order_many-to-many"),
        vec![order_a]
    );
}

#[test]
fn test_reverse_batch_removal_failure_removes_nothing() {
    let fx = Fixture::new();
    let def = fx.definition("order_customer", Cardinality::ManyToMany, "customer");
    let mut rule = AssociationRule::new(
        "ORDER_CUSTOMER".into(),
        def,
        "order".into(),
        "customer".into(),
        Cardinality::ManyToMany,
        "test",
    );
    rule.validations = vec![ValidationRule::Required];
    fx.engine().define_rule(rule).unwrap();

    let order_a = fx.order("SO-1001");
    let order_b = fx.order("SO-1002");
    let jane = fx.customer("Jane");
    let rita = fx.customer("Rita");

    let engine = fx.engine();
    engine
        .add_association(order_a, &[jane], "ORDER_CUSTOMER", "test")
        .unwrap();
    engine
        .add_association(order_b, &[jane, rita], "ORDER_CUSTOMER", "test")
        .unwrap();

    // Removing Jane from order_a would empty a required key, so the batch
    // fails; order_b must keep both links.
    let err = engine
        .remove_association(jane, &[order_b, order_a], "ORDER_CUSTOMER", "test")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    assert_eq!(
        fx.store
            .must_item(order_b)
            .unwrap()
            .linked_ids("customer_many-to-many"),
        vec![jane, rita]
    );
    assert_eq!(
        fx.store
            .must_item(order_a)
            .unwrap()
            .linked_ids("customer_many-to-many"),
        vec![jane]
    );
}

#[test]
fn test_update_cannot_clear_required_attribute() {
    let fx = Fixture::new();
    let fabric = fx.fabric("Cotton Twill", "cotton", 12.5);

    let err = fx
        .service()
        .update_item(
            fabric,
            &mdt::item::ItemPatch {
                clear: vec!["material".into()],
                ..Default::default()
            },
            "test",
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let updated = fx
        .service()
        .update_item(
            fabric,
            &mdt::item::ItemPatch {
                set: BTreeMap::from([("price".to_string(), serde_json::json!(14.0))]),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
    assert_eq!(updated.revision, 2);
}
