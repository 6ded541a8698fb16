//! Query evaluation.
//!
//! Evaluation folds the query tree into an ordered id set, touching one
//! container or node lock at a time, then resolves each id through the
//! record store. Records deleted between the two phases are skipped.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::node::{IdNode, ValuesNode};
use crate::query::{Operator, Query, Selection, ValueQuery};
use crate::record::Record;
use crate::tracing_helpers::trace_log;
use crate::tree::AssociativeTree;
use crate::tuple::ASSOCIATED_ID_KEY;
use crate::value::Value;

type IdSet = BTreeSet<String>;

/// What one key condition contributes to its selection.
enum Hits {
    /// Ids satisfying a positive condition; intersected.
    Matching(IdSet),
    /// Ids ruled out by a negative condition; subtracted at the end.
    Excluded(IdSet),
}

impl<T> AssociativeTree<T> {
    /// Visit every record matching `query`, in id order, until `on_match`
    /// returns false.
    ///
    /// The empty query visits every record.
    ///
    /// # Errors
    ///
    /// - [`TreeError::InvalidQuery`](crate::TreeError::InvalidQuery) or
    ///   [`TreeError::EmptyKey`](crate::TreeError::EmptyKey) for a malformed
    ///   query
    /// - [`TreeError::TreeDestroying`](crate::TreeError::TreeDestroying)
    ///   while a destroy runs
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn query<F>(&self, query: &Query, mut on_match: F) -> Result<()>
    where
        F: FnMut(&Record<T>) -> bool,
    {
        let _op = self.enter()?;
        query.validate()?;

        if query.is_empty() {
            self.store().iterate(|_, record| on_match(record));
            return Ok(());
        }

        let ids = Evaluator { tree: self }.query(query);
        trace_log!(matches = ids.len(), "query evaluated");

        for id in ids {
            let Some(record) = self.store().find(&id) else {
                continue;
            };
            if !on_match(&record) {
                break;
            }
        }
        Ok(())
    }
}

struct Evaluator<'a, T> {
    tree: &'a AssociativeTree<T>,
}

impl<T> Evaluator<'_, T> {
    fn query(&self, query: &Query) -> IdSet {
        let mut running = query.selection.as_ref().map(|s| self.selection(s));

        for child in &query.and {
            if running.as_ref().is_some_and(IdSet::is_empty) {
                break;
            }
            let ids = self.query(child);
            running = Some(match running {
                None => ids,
                Some(mut current) => {
                    current.retain(|id| ids.contains(id));
                    current
                }
            });
        }

        for child in &query.or {
            let mut current = running.unwrap_or_default();
            current.extend(self.query(child));
            running = Some(current);
        }

        running.unwrap_or_default()
    }

    fn selection(&self, selection: &Selection) -> IdSet {
        let limit = selection.max_arity();
        let mut positive: Option<IdSet> = None;
        let mut excluded = IdSet::new();

        for (key, condition) in &selection.key_values {
            let hits = if key == ASSOCIATED_ID_KEY {
                self.associated_id(condition, limit)
            } else {
                self.key(key, condition, limit)
            };

            match hits {
                Hits::Matching(ids) => {
                    let narrowed = match positive {
                        None => ids,
                        Some(mut current) => {
                            current.retain(|id| ids.contains(id));
                            current
                        }
                    };
                    if narrowed.is_empty() {
                        return IdSet::new();
                    }
                    positive = Some(narrowed);
                }
                Hits::Excluded(ids) => excluded.extend(ids),
            }
        }

        let mut base = positive.unwrap_or_else(|| self.all_ids(limit));
        base.retain(|id| !excluded.contains(id));
        base
    }

    fn key(&self, key: &str, condition: &ValueQuery, limit: Option<usize>) -> Hits {
        let values = self.tree.index().find(key);
        let collect = |keep: &dyn Fn(&Value) -> bool| {
            values
                .as_deref()
                .map(|values| collect_where(values, limit, keep))
                .unwrap_or_default()
        };

        match condition {
            ValueQuery::Exists { exists, value_type } => {
                let ids = collect(&|stored: &Value| {
                    value_type.is_none_or(|wanted| wanted.accepts(stored.value_type()))
                });
                if *exists {
                    Hits::Matching(ids)
                } else {
                    Hits::Excluded(ids)
                }
            }

            // Stored values are never `Any`, so equality already implies
            // equal types and a direct lookup is exact.
            ValueQuery::Value {
                value,
                operator: operator @ (Operator::Equals | Operator::NotEquals),
                ..
            } if !value.is_any() => {
                let ids = values
                    .as_deref()
                    .and_then(|values| values.find(value))
                    .map(|node| node_ids(&node, limit))
                    .unwrap_or_default();
                if operator.is_negative() {
                    Hits::Excluded(ids)
                } else {
                    Hits::Matching(ids)
                }
            }

            ValueQuery::Value {
                value,
                operator,
                match_type,
            } => {
                let target = if operator.is_negative() {
                    Operator::Equals
                } else {
                    *operator
                };
                let ids = collect(&|stored: &Value| {
                    (!match_type || stored.same_type(value)) && target.matches(stored.cmp(value))
                });
                if operator.is_negative() {
                    Hits::Excluded(ids)
                } else {
                    Hits::Matching(ids)
                }
            }
        }
    }

    fn associated_id(&self, condition: &ValueQuery, limit: Option<usize>) -> Hits {
        let store = self.tree.store();

        let (target, operator) = match condition {
            ValueQuery::Exists { exists: true, .. } => return Hits::Matching(self.all_ids(limit)),
            ValueQuery::Exists { exists: false, .. } => return Hits::Excluded(self.all_ids(limit)),
            ValueQuery::Value {
                value, operator, ..
            } => match value.as_str() {
                Some(target) => (target, *operator),
                None => return Hits::Matching(IdSet::new()),
            },
        };

        match operator {
            Operator::Equals => Hits::Matching(
                store
                    .find(target)
                    .filter(|record| within_limit(record, limit))
                    .map(|record| record.id().to_owned())
                    .into_iter()
                    .collect(),
            ),
            Operator::NotEquals => Hits::Excluded(IdSet::from([target.to_owned()])),
            _ => {
                let mut ids = IdSet::new();
                store.iterate(|id, record| {
                    if within_limit(record, limit) && operator.matches(id.as_str().cmp(target)) {
                        ids.insert(id.clone());
                    }
                    true
                });
                Hits::Matching(ids)
            }
        }
    }

    fn all_ids(&self, limit: Option<usize>) -> IdSet {
        let mut ids = IdSet::new();
        self.tree.store().iterate(|id, record| {
            if within_limit(record, limit) {
                ids.insert(id.clone());
            }
            true
        });
        ids
    }
}

fn collect_where(values: &ValuesNode, limit: Option<usize>, keep: &dyn Fn(&Value) -> bool) -> IdSet {
    let mut ids = IdSet::new();
    values.iterate(|stored, node| {
        if keep(stored) {
            ids.extend(node_ids(node, limit));
        }
        true
    });
    ids
}

fn node_ids(node: &IdNode, limit: Option<usize>) -> IdSet {
    node.read().ids_up_to(limit).cloned().collect()
}

fn within_limit<T>(record: &Record<T>, limit: Option<usize>) -> bool {
    limit.is_none_or(|max| record.tuple().len() <= max)
}
