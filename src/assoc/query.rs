//! Candidate queries
//!
//! Read-side companion to the engine: pages through the items that a given
//! rule would accept as link targets, and summarises the state of an item's
//! links for display.

use std::cmp::Ordering;

use serde::Serialize;

use crate::core::error::{CoreError, CoreResult};
use crate::core::identity::EntityId;
use crate::item::Item;

use super::definition::AttributeFilter;
use super::engine::{association_key, evaluate_criteria, AssociationEngine};
use super::rule::SortDirection;

/// Parameters for a paged candidate lookup
#[derive(Debug, Clone, Default)]
pub struct TargetQuery {
    /// Zero-based page number
    pub page: usize,
    /// Page size; zero means everything on one page
    pub page_size: usize,
    /// Free-text search applied across the rule's searchable attributes
    pub search: Option<String>,
    /// Extra attribute filters, all of which must pass
    pub extra: Vec<AttributeFilter>,
    pub include_inactive: bool,
}

/// One page of results plus the pre-pagination total
#[derive(Debug, Clone)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Link-state summary for one rule on one item
#[derive(Debug, Clone, Serialize)]
pub struct AssociationMetadata {
    /// Currently linked target ids
    pub selected: Vec<EntityId>,
    /// Linked ids whose targets no longer exist or no longer qualify
    pub broken: Vec<EntityId>,
    /// How many unlinked candidates currently qualify
    pub available: usize,
    pub can_add_more: bool,
}

impl<'a> AssociationEngine<'a> {
    /// Page through the items the named rule would accept as targets for
    /// `source_id`. The source must itself pass the definition's source
    /// filter or the lookup fails outright.
    pub fn filtered_targets(
        &self,
        source_id: EntityId,
        rule_code: &str,
        query: &TargetQuery,
    ) -> CoreResult<PageResult<Item>> {
        let rule = self.store().rule_by_code(rule_code)?;
        let def = self.store().must_definition(rule.definition)?;
        let source = self.store().must_item(source_id)?;

        let mut extra_codes: Vec<String> = rule.searchable.clone();
        if let Some(sort) = &rule.sort_by {
            extra_codes.push(sort.clone());
        }
        extra_codes.extend(query.extra.iter().map(|f| f.attribute.clone()));
        let index = self.attribute_index(
            &[&def.source_filter, &def.target_filter, &rule.criteria],
            &extra_codes,
        )?;

        let gate = evaluate_criteria(&source, &def.source_filter, &index);
        if !gate.is_empty() {
            return Err(CoreError::validation(
                gate.into_iter()
                    .map(|r| format!("source item does not qualify: {r}"))
                    .collect(),
            ));
        }

        let target_type = self.store().item_type_by_code(&rule.target_type)?;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());

        let mut matches: Vec<Item> = Vec::new();
        for item in self.store().items.list()? {
            if item.item_type != target_type.id {
                continue;
            }
            if !item.active && !query.include_inactive {
                continue;
            }
            if !evaluate_criteria(&item, &def.target_filter, &index).is_empty()
                || !evaluate_criteria(&item, &rule.criteria, &index).is_empty()
            {
                continue;
            }
            if let Some(needle) = &needle {
                let hit = rule.searchable.iter().any(|code| {
                    index
                        .get(code)
                        .and_then(|id| item.attributes.get(id))
                        .map(|v| v.search_text().to_lowercase().contains(needle))
                        .unwrap_or(false)
                });
                if !hit {
                    continue;
                }
            }
            if query
                .extra
                .iter()
                .any(|f| super::engine::evaluate_filter(&item, f, &index).is_some())
            {
                continue;
            }
            matches.push(item);
        }

        sort_candidates(&mut matches, &rule, &index);

        let total = matches.len();
        let items = if query.page_size == 0 {
            matches
        } else {
            matches
                .into_iter()
                .skip(query.page * query.page_size)
                .take(query.page_size)
                .collect()
        };

        Ok(PageResult { items, total })
    }

    /// Summarise the current links under a rule for one item
    pub fn association_metadata(
        &self,
        source_id: EntityId,
        rule_code: &str,
    ) -> CoreResult<AssociationMetadata> {
        let rule = self.store().rule_by_code(rule_code)?;
        let def = self.store().must_definition(rule.definition)?;
        let source = self.store().must_item(source_id)?;

        let key = association_key(&rule);
        let selected = source.linked_ids(&key);

        let index = self.attribute_index(&[&def.target_filter, &rule.criteria], &[])?;
        let mut broken = Vec::new();
        for id in &selected {
            match self.store().items.get(*id)? {
                Some(target)
                    if target.active
                        && evaluate_criteria(&target, &def.target_filter, &index).is_empty()
                        && evaluate_criteria(&target, &rule.criteria, &index).is_empty() => {}
                _ => broken.push(*id),
            }
        }

        let page = self.filtered_targets(source_id, rule_code, &TargetQuery::default())?;
        let available = page
            .items
            .iter()
            .filter(|item| !selected.contains(&item.id))
            .count();

        let at_capacity = match rule.max_count() {
            Some(max) => selected.len() >= max,
            None => rule.cardinality.is_single() && !selected.is_empty(),
        };

        Ok(AssociationMetadata {
            selected,
            broken,
            available,
            can_add_more: !at_capacity && available > 0,
        })
    }
}

/// Order candidates by the rule's sort attribute, falling back to newest
/// first. Numeric values compare numerically, everything else as text.
fn sort_candidates(
    items: &mut [Item],
    rule: &super::rule::AssociationRule,
    index: &std::collections::HashMap<String, EntityId>,
) {
    let sort_attr = rule.sort_by.as_ref().and_then(|code| index.get(code));

    items.sort_by(|a, b| {
        let ord = match sort_attr {
            Some(attr_id) => compare_values(a.attributes.get(attr_id), b.attributes.get(attr_id)),
            None => a.audit.created.cmp(&b.audit.created),
        };
        match rule.sort_direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

fn compare_values(
    a: Option<&crate::core::value::AttributeValue>,
    b: Option<&crate::core::value::AttributeValue>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.search_text().cmp(&b.search_text()),
        },
    }
}
