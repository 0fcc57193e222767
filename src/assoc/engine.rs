//! Association engine
//!
//! Creates, removes and validates links between items, maintains the reverse
//! side of every link, and answers rule-lookup queries. All mutations are
//! optimistic read-modify-write: the store's revision check detects a
//! concurrent writer and the whole read-validate-write is retried a bounded
//! number of times before the conflict surfaces.

use std::collections::HashMap;

use crate::core::error::{CoreError, CoreResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::item::Item;
use crate::store::Store;

use super::definition::{AttributeFilter, FilterCriteria, FilterPredicate};
use super::rule::{AssociationRule, ValidationRule};

/// Retries for an optimistic save that hits a revision conflict
const SAVE_RETRIES: usize = 3;

/// Association key for the forward (source-side) entry of a rule.
///
/// Canonical scheme: `{target_type_code}_{cardinality}`.
pub fn association_key(rule: &AssociationRule) -> String {
    format!("{}_{}", rule.target_type, rule.cardinality)
}

/// Association key for the mirrored (target-side) entry of a rule
pub fn reverse_key(rule: &AssociationRule) -> String {
    format!("{}_{}", rule.source_type, rule.cardinality.mirror())
}

/// Which end of a rule a lookup result binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A rule bound to a lookup direction.
///
/// Reverse bindings describe the implicit mirror of a rule whose target type
/// matched the queried source type; their effective cardinality is the
/// mirror of the stored class.
#[derive(Debug, Clone)]
pub struct BoundRule {
    pub rule: AssociationRule,
    pub direction: Direction,
}

impl BoundRule {
    /// Cardinality as seen from the queried side
    pub fn effective_cardinality(&self) -> super::definition::Cardinality {
        match self.direction {
            Direction::Forward => self.rule.cardinality,
            Direction::Reverse => self.rule.cardinality.mirror(),
        }
    }

    /// The association key on the queried side
    pub fn effective_key(&self) -> String {
        match self.direction {
            Direction::Forward => association_key(&self.rule),
            Direction::Reverse => reverse_key(&self.rule),
        }
    }
}

/// The association engine over a store
pub struct AssociationEngine<'a> {
    store: &'a Store,
}

impl<'a> AssociationEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &'a Store {
        self.store
    }

    // ------------------------------------------------------------------
    // Rule definition & lookup
    // ------------------------------------------------------------------

    /// Register a rule, enforcing the compound-uniqueness invariant and the
    /// consistency of the rule against its definition.
    pub fn define_rule(&self, rule: AssociationRule) -> CoreResult<AssociationRule> {
        let def = self.store.must_definition(rule.definition)?;

        let mut reasons = Vec::new();
        if !def.source_types.contains(&rule.source_type) {
            reasons.push(format!(
                "source type '{}' is not allowed by definition '{}'",
                rule.source_type, def.code
            ));
        }
        if !def.target_types.contains(&rule.target_type) {
            reasons.push(format!(
                "target type '{}' is not allowed by definition '{}'",
                rule.target_type, def.code
            ));
        }
        if rule.cardinality != def.cardinality {
            reasons.push(format!(
                "rule cardinality {} does not match definition cardinality {}",
                rule.cardinality, def.cardinality
            ));
        }
        if !reasons.is_empty() {
            return Err(CoreError::validation(reasons));
        }

        let key = association_key(&rule);
        for existing in self.store.rules.list()? {
            if existing.definition == rule.definition
                && existing.source_type == rule.source_type
                && existing.target_type == rule.target_type
            {
                return Err(CoreError::Conflict(format!(
                    "a rule for ({}, {}, {}) already exists: {}",
                    def.code, rule.source_type, rule.target_type, existing.code
                )));
            }
            // The association key must stay unambiguous per source type.
            if existing.active
                && existing.source_type == rule.source_type
                && association_key(&existing) == key
            {
                return Err(CoreError::Conflict(format!(
                    "association key '{}' for source type '{}' is already taken by rule {}",
                    key, rule.source_type, existing.code
                )));
            }
        }

        Ok(self.store.rules.insert(rule)?)
    }

    /// All rules applicable to a source item type, ordered by priority
    /// descending then creation order, including the implicit reverse rules
    /// where the type appears as a target.
    pub fn rules_for_source_type(
        &self,
        item_type_code: &str,
        include_inactive: bool,
    ) -> CoreResult<Vec<BoundRule>> {
        let mut bound = Vec::new();
        for rule in self.store.rules.list()? {
            if !include_inactive && !rule.active {
                continue;
            }
            if rule.source_type == item_type_code {
                bound.push(BoundRule {
                    rule,
                    direction: Direction::Forward,
                });
            } else if rule.target_type == item_type_code {
                bound.push(BoundRule {
                    rule,
                    direction: Direction::Reverse,
                });
            }
        }
        // ULIDs are creation-ordered, so the id breaks priority ties.
        bound.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then_with(|| a.rule.id.ulid().cmp(&b.rule.id.ulid()))
        });
        Ok(bound)
    }

    // ------------------------------------------------------------------
    // Candidate validation
    // ------------------------------------------------------------------

    /// Map the attribute codes referenced by the given criteria to attribute
    /// ids, one store fetch per distinct code.
    pub(crate) fn attribute_index(
        &self,
        criteria: &[&FilterCriteria],
        extra_codes: &[String],
    ) -> CoreResult<HashMap<String, EntityId>> {
        let mut index = HashMap::new();
        let codes = criteria
            .iter()
            .flat_map(|c| c.attributes.iter().map(|f| f.attribute.clone()))
            .chain(extra_codes.iter().cloned());
        for code in codes {
            if index.contains_key(&code) {
                continue;
            }
            if let Some(def) = self.store.attributes.find_by_code(&code)? {
                index.insert(code, def.id);
            }
        }
        Ok(index)
    }

    /// Evaluate filter criteria against an item, returning one reason per
    /// failing check. Category and family membership pass when the
    /// respective set is empty.
    pub fn validate_candidate(
        &self,
        item: &Item,
        criteria: &FilterCriteria,
    ) -> CoreResult<Vec<String>> {
        let index = self.attribute_index(&[criteria], &[])?;
        Ok(evaluate_criteria(item, criteria, &index))
    }

    /// Evaluate cardinality validation rules for a proposed batch.
    ///
    /// `current` is the stored link set under the rule's key; `incoming` the
    /// proposed batch. All rules must pass for the batch to be accepted.
    pub fn validate_cardinality(
        &self,
        rule: &AssociationRule,
        current: &[EntityId],
        incoming: &[EntityId],
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if rule.cardinality.is_single() && incoming.len() > 1 {
            reasons.push(format!(
                "cardinality {} accepts a single target per call (got {})",
                rule.cardinality,
                incoming.len()
            ));
        }

        let new_total = if rule.cardinality.is_single() {
            incoming.len().min(1)
        } else {
            current.len() + incoming.len()
        };

        for validation in &rule.validations {
            match validation {
                ValidationRule::Required => {
                    if new_total == 0 {
                        reasons.push(format!("rule {} requires at least one link", rule.code));
                    }
                }
                ValidationRule::MinCount { count } => {
                    if new_total < *count {
                        reasons.push(format!(
                            "rule {} requires at least {} links (would have {})",
                            rule.code, count, new_total
                        ));
                    }
                }
                ValidationRule::MaxCount { count } => {
                    if new_total > *count {
                        reasons.push(format!(
                            "rule {} allows at most {} links (would have {})",
                            rule.code, count, new_total
                        ));
                    }
                }
                ValidationRule::Unique => {
                    for (i, id) in incoming.iter().enumerate() {
                        if current.contains(id) || incoming[..i].contains(id) {
                            reasons.push(format!("target {} is already linked", id));
                        }
                    }
                }
                // Custom checks are opaque to the core; recorded, not run.
                ValidationRule::Custom { .. } => {}
            }
        }

        reasons
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Validate a proposed batch for `rule` against an item that may not be
    /// persisted yet, and stage the links into its association map on
    /// success. Performs no store writes on the source.
    pub fn validate_and_stage(
        &self,
        source: &mut Item,
        rule: &AssociationRule,
        targets: &[EntityId],
    ) -> CoreResult<()> {
        let def = self.store.must_definition(rule.definition)?;
        if !rule.active {
            return Err(CoreError::validation(vec![format!(
                "rule {} is inactive",
                rule.code
            )]));
        }

        let source_type = self
            .store
            .item_types
            .get(source.item_type)?
            .ok_or_else(|| {
                CoreError::not_found(EntityPrefix::Type, source.item_type.to_string())
            })?;

        let mut reasons = Vec::new();
        if source_type.code != rule.source_type {
            reasons.push(format!(
                "source item is a '{}' but rule {} links from '{}'",
                source_type.code, rule.code, rule.source_type
            ));
        }

        let target_type = self.store.item_type_by_code(&rule.target_type)?;
        let index =
            self.attribute_index(&[&def.source_filter, &def.target_filter, &rule.criteria], &[])?;

        for reason in evaluate_criteria(source, &def.source_filter, &index) {
            reasons.push(format!("source item does not qualify: {reason}"));
        }

        let mut target_items = Vec::with_capacity(targets.len());
        for id in targets {
            match self.store.items.get(*id)? {
                Some(item) => target_items.push(item),
                None => {
                    return Err(CoreError::not_found(EntityPrefix::Item, id.to_string()));
                }
            }
        }

        for target in &target_items {
            if target.item_type != target_type.id {
                reasons.push(format!(
                    "target {} is not a '{}'",
                    target.id, rule.target_type
                ));
                continue;
            }
            if !target.active {
                reasons.push(format!("target {} is deactivated", target.id));
                continue;
            }
            // A single-shape mirror makes the link exclusive on the target
            // side; a target held by a different source is not stolen.
            if rule.cardinality.mirror().is_single() {
                let held_by = target.linked_ids(&reverse_key(rule));
                if held_by.iter().any(|id| *id != source.id) {
                    reasons.push(format!(
                        "target {} is already linked to another '{}'",
                        target.id, rule.source_type
                    ));
                }
            }
            // Layered criteria: the definition's target filter AND the
            // rule's own criteria must both pass.
            for criteria in [&def.target_filter, &rule.criteria] {
                for reason in evaluate_criteria(target, criteria, &index) {
                    reasons.push(format!("target {}: {}", target.id, reason));
                }
            }
        }

        let key = association_key(rule);
        let current = source.linked_ids(&key);
        reasons.extend(self.validate_cardinality(rule, &current, targets));

        if !reasons.is_empty() {
            return Err(CoreError::validation(reasons));
        }

        source.put_links(&key, targets, rule.cardinality.is_single());
        Ok(())
    }

    /// Which end of the rule the calling item sits on
    fn direction_for(&self, item: &Item, rule: &AssociationRule) -> CoreResult<Direction> {
        let item_type = self
            .store
            .item_types
            .get(item.item_type)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Type, item.item_type.to_string()))?;
        if item_type.code == rule.source_type {
            Ok(Direction::Forward)
        } else if item_type.code == rule.target_type {
            Ok(Direction::Reverse)
        } else {
            Err(CoreError::validation(vec![format!(
                "item is a '{}' but rule {} links '{}' to '{}'",
                item_type.code, rule.code, rule.source_type, rule.target_type
            )]))
        }
    }

    /// Add a batch of links from `source` under the named rule.
    ///
    /// All-or-nothing: any validation failure applies zero links. The
    /// source save is retried on revision conflicts with validation re-run
    /// against the fresh copy. An item sitting on the rule's target side
    /// may initiate the link only for non-directional definitions.
    pub fn add_association(
        &self,
        source_id: EntityId,
        targets: &[EntityId],
        rule_code: &str,
        actor: &str,
    ) -> CoreResult<()> {
        let rule = self.store.rule_by_code(rule_code)?;
        let source = self.store.must_item(source_id)?;
        match self.direction_for(&source, &rule)? {
            Direction::Forward => self.add_forward(source_id, targets, &rule, actor),
            Direction::Reverse => self.add_reverse(source_id, targets, &rule, actor),
        }
    }

    fn add_forward(
        &self,
        source_id: EntityId,
        targets: &[EntityId],
        rule: &AssociationRule,
        actor: &str,
    ) -> CoreResult<()> {
        let key = association_key(rule);
        let mut last_err = None;
        for _ in 0..SAVE_RETRIES {
            let mut source = self.store.must_item(source_id)?;
            let prior = source.linked_ids(&key);
            self.validate_and_stage(&mut source, rule, targets)?;
            source.audit.touch(actor);
            match self.store.items.save(source) {
                Ok(_) => {
                    // A single-shape key replaces: the displaced partner
                    // loses its mirrored entry.
                    if rule.cardinality.is_single() {
                        let rkey = reverse_key(rule);
                        for old in prior.iter().filter(|old| !targets.contains(old)) {
                            if self.store.items.get(*old)?.is_some() {
                                self.retry_item_update(*old, actor, |item| {
                                    item.drop_links(&rkey, &[source_id]);
                                })?;
                            }
                        }
                    }
                    self.mirror_add(source_id, rule, targets, actor)?;
                    return Ok(());
                }
                Err(crate::store::StoreError::RevisionConflict { .. }) => {
                    last_err = Some(CoreError::Conflict(format!(
                        "concurrent update on item {source_id}"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Conflict("save retries exhausted".into())))
    }

    /// Link from the target side of a non-directional rule. Each partner
    /// goes through the full forward path so every forward-side validation
    /// still applies.
    fn add_reverse(
        &self,
        initiator: EntityId,
        partners: &[EntityId],
        rule: &AssociationRule,
        actor: &str,
    ) -> CoreResult<()> {
        let def = self.store.must_definition(rule.definition)?;
        if def.directional {
            return Err(CoreError::validation(vec![format!(
                "definition '{}' is directional; links under rule {} are managed from '{}'",
                def.code, rule.code, rule.source_type
            )]));
        }
        if rule.cardinality.mirror().is_single() && partners.len() > 1 {
            return Err(CoreError::validation(vec![format!(
                "cardinality {} accepts a single partner per call from this side (got {})",
                rule.cardinality.mirror(),
                partners.len()
            )]));
        }
        for (i, partner) in partners.iter().enumerate() {
            if partners[..i].contains(partner) {
                return Err(CoreError::validation(vec![format!(
                    "partner {partner} appears more than once in the batch"
                )]));
            }
        }
        // Every partner's forward write is validated before any is
        // committed, so a failure on a later partner applies zero links.
        for partner in partners {
            let mut staged = self.store.must_item(*partner)?;
            self.validate_and_stage(&mut staged, rule, &[initiator])?;
        }
        for partner in partners {
            self.add_forward(*partner, &[initiator], rule, actor)?;
        }
        Ok(())
    }

    /// Write the mirrored entries on every target
    pub(crate) fn mirror_add(
        &self,
        source_id: EntityId,
        rule: &AssociationRule,
        targets: &[EntityId],
        actor: &str,
    ) -> CoreResult<()> {
        let key = reverse_key(rule);
        let single = rule.cardinality.mirror().is_single();
        for target_id in targets {
            self.retry_item_update(*target_id, actor, |item| {
                item.put_links(&key, &[source_id], single);
            })?;
        }
        Ok(())
    }

    /// Remove links from `source` under the named rule.
    ///
    /// Removing ids that are not linked is a no-op, but removing the last
    /// link under a rule that requires one fails.
    pub fn remove_association(
        &self,
        source_id: EntityId,
        targets: &[EntityId],
        rule_code: &str,
        actor: &str,
    ) -> CoreResult<()> {
        let rule = self.store.rule_by_code(rule_code)?;
        let source = self.store.must_item(source_id)?;
        match self.direction_for(&source, &rule)? {
            Direction::Forward => self.remove_forward(source_id, targets, &rule, actor),
            Direction::Reverse => {
                let def = self.store.must_definition(rule.definition)?;
                if def.directional {
                    return Err(CoreError::validation(vec![format!(
                        "definition '{}' is directional; links under rule {} are managed from '{}'",
                        def.code, rule.code, rule.source_type
                    )]));
                }
                // Check every partner before mutating any: a guard failure
                // on a later partner must not leave earlier removals applied.
                if rule.requires_link() {
                    let key = association_key(&rule);
                    for partner in targets {
                        let item = self.store.must_item(*partner)?;
                        let current = item.linked_ids(&key);
                        if !current.is_empty() && current.iter().all(|id| *id == source_id) {
                            return Err(CoreError::validation(vec![format!(
                                "rule {} requires at least one link",
                                rule.code
                            )]));
                        }
                    }
                }
                for partner in targets {
                    self.remove_forward(*partner, &[source_id], &rule, actor)?;
                }
                Ok(())
            }
        }
    }

    fn remove_forward(
        &self,
        source_id: EntityId,
        targets: &[EntityId],
        rule: &AssociationRule,
        actor: &str,
    ) -> CoreResult<()> {
        let key = association_key(rule);

        let mut last_err = None;
        for _ in 0..SAVE_RETRIES {
            let mut source = self.store.must_item(source_id)?;
            let current = source.linked_ids(&key);
            let remaining = current.iter().filter(|id| !targets.contains(id)).count();
            if remaining == 0 && !current.is_empty() && rule.requires_link() {
                return Err(CoreError::validation(vec![format!(
                    "rule {} requires at least one link",
                    rule.code
                )]));
            }

            source.drop_links(&key, targets);
            source.audit.touch(actor);
            match self.store.items.save(source) {
                Ok(_) => {
                    let rkey = reverse_key(rule);
                    for target_id in targets {
                        if self.store.items.get(*target_id)?.is_some() {
                            self.retry_item_update(*target_id, actor, |item| {
                                item.drop_links(&rkey, &[source_id]);
                            })?;
                        }
                    }
                    return Ok(());
                }
                Err(crate::store::StoreError::RevisionConflict { .. }) => {
                    last_err = Some(CoreError::Conflict(format!(
                        "concurrent update on item {source_id}"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Conflict("save retries exhausted".into())))
    }

    /// Read-modify-write an item with bounded retry on revision conflicts
    pub(crate) fn retry_item_update<F>(
        &self,
        id: EntityId,
        actor: &str,
        mutate: F,
    ) -> CoreResult<()>
    where
        F: Fn(&mut Item),
    {
        let mut last_err = None;
        for _ in 0..SAVE_RETRIES {
            let mut item = self.store.must_item(id)?;
            mutate(&mut item);
            item.audit.touch(actor);
            match self.store.items.save(item) {
                Ok(_) => return Ok(()),
                Err(crate::store::StoreError::RevisionConflict { .. }) => {
                    last_err = Some(CoreError::Conflict(format!("concurrent update on item {id}")));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Conflict("save retries exhausted".into())))
    }
}

/// Evaluate one criteria block against an item. `index` maps attribute codes
/// to ids; codes missing from the index refer to attributes the catalog does
/// not know, which only `exists: false` can pass.
pub(crate) fn evaluate_criteria(
    item: &Item,
    criteria: &FilterCriteria,
    index: &HashMap<String, EntityId>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if !criteria.categories.is_empty() && !criteria.categories.contains(&item.category) {
        reasons.push("category is outside the allowed set".to_string());
    }
    if !criteria.families.is_empty() && !criteria.families.contains(&item.family) {
        reasons.push("family is outside the allowed set".to_string());
    }
    for filter in &criteria.attributes {
        if let Some(reason) = evaluate_filter(item, filter, index) {
            reasons.push(reason);
        }
    }

    reasons
}

/// Evaluate a single attribute filter; None means pass
pub(crate) fn evaluate_filter(
    item: &Item,
    filter: &AttributeFilter,
    index: &HashMap<String, EntityId>,
) -> Option<String> {
    let value = index
        .get(&filter.attribute)
        .and_then(|id| item.attributes.get(id))
        .filter(|v| !v.is_empty());

    match &filter.predicate {
        FilterPredicate::Equals { value: operand } => match value {
            Some(v) if v.matches_json(operand) => None,
            _ => Some(format!("attribute '{}' does not equal {}", filter.attribute, operand)),
        },
        FilterPredicate::Contains { value: needle } => match value {
            Some(v)
                if v.search_text()
                    .to_lowercase()
                    .contains(&needle.to_lowercase()) =>
            {
                None
            }
            _ => Some(format!(
                "attribute '{}' does not contain '{}'",
                filter.attribute, needle
            )),
        },
        FilterPredicate::In { values } => match value {
            Some(v) if values.iter().any(|operand| v.matches_json(operand)) => None,
            _ => Some(format!(
                "attribute '{}' is not in the allowed values",
                filter.attribute
            )),
        },
        FilterPredicate::Range { min, max } => {
            let number = value.and_then(|v| v.as_number());
            match number {
                Some(n) if min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m) => None,
                _ => Some(format!(
                    "attribute '{}' is outside the range",
                    filter.attribute
                )),
            }
        }
        FilterPredicate::Exists { present } => {
            if value.is_some() == *present {
                None
            } else if *present {
                Some(format!("attribute '{}' is missing", filter.attribute))
            } else {
                Some(format!("attribute '{}' must be absent", filter.attribute))
            }
        }
    }
}
