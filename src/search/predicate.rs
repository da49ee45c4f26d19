//! Composable WHERE-clause fragments for article search.
//!
//! Each [`Predicate`] renders one parenthesised condition into a
//! `sqlx::QueryBuilder`; [`push_where`] ANDs them after the live-row filter.
//! [`compose`] fixes the evaluation order and leaves out any clause whose
//! request field is absent.

use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::cursor::CursorPosition;
use crate::storage::fold_case;
use super::{Direction, SearchRequest, SortKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Substring match against the case-folded title OR summary; the
    /// keyword is folded by [`compose`]
    Keyword(String),
    Interest(Uuid),
    SourceIn(Vec<String>),
    /// Inclusive lower bound, epoch milliseconds
    PublishedFrom(i64),
    /// Inclusive upper bound, epoch milliseconds
    PublishedTo(i64),
    /// Rows strictly after `(value, id)` in `key` order
    AfterPosition {
        key: SortKey,
        value: i64,
        id: Uuid,
        direction: Direction,
    },
    /// Rows strictly after `id`; an approximation for count-based orderings
    AfterId { id: Uuid, direction: Direction },
}

impl Predicate {
    pub(crate) fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::Keyword(keyword) => {
                let pattern = format!("%{}%", escape_like(keyword));
                builder.push("(title_folded LIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" ESCAPE '\\' OR summary_folded LIKE ");
                builder.push_bind(pattern);
                builder.push(" ESCAPE '\\')");
            }
            Predicate::Interest(id) => {
                builder.push("interest_id = ");
                builder.push_bind(id.to_string());
            }
            Predicate::SourceIn(sources) => {
                builder.push("source IN (");
                let mut separated = builder.separated(", ");
                for source in sources {
                    separated.push_bind(source.clone());
                }
                separated.push_unseparated(")");
            }
            Predicate::PublishedFrom(ms) => {
                builder.push("publish_date >= ");
                builder.push_bind(*ms);
            }
            Predicate::PublishedTo(ms) => {
                builder.push("publish_date <= ");
                builder.push_bind(*ms);
            }
            Predicate::AfterPosition {
                key,
                value,
                id,
                direction,
            } => {
                let column = key.column();
                let op = direction.comparator();
                builder.push(format!("({column} {op} "));
                builder.push_bind(*value);
                builder.push(format!(" OR ({column} = "));
                builder.push_bind(*value);
                builder.push(format!(" AND id {op} "));
                builder.push_bind(id.to_string());
                builder.push("))");
            }
            Predicate::AfterId { id, direction } => {
                builder.push(format!("id {} ", direction.comparator()));
                builder.push_bind(id.to_string());
            }
        }
    }
}

/// Build the predicate list for `request`, in fixed order: keyword,
/// interest, sources, date range, cursor.
pub fn compose(
    request: &SearchRequest,
    cursor: Option<&CursorPosition>,
    direction: Direction,
) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    if let Some(keyword) = request
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        predicates.push(Predicate::Keyword(fold_case(keyword)));
    }

    if let Some(interest_id) = request.interest_id {
        predicates.push(Predicate::Interest(interest_id));
    }

    let sources: Vec<String> = request
        .source_in
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if !sources.is_empty() {
        predicates.push(Predicate::SourceIn(sources));
    }

    if let Some(from) = request.publish_date_from {
        predicates.push(Predicate::PublishedFrom(from.timestamp_millis()));
    }
    if let Some(to) = request.publish_date_to {
        predicates.push(Predicate::PublishedTo(to.timestamp_millis()));
    }

    if let Some(position) = cursor {
        predicates.push(match position.after {
            Some(value) => Predicate::AfterPosition {
                key: request.order_by,
                value,
                id: position.id,
                direction,
            },
            None => Predicate::AfterId {
                id: position.id,
                direction,
            },
        });
    }

    predicates
}

/// Append `WHERE deleted = 0 AND p1 AND p2 ...`
pub(crate) fn push_where(builder: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    builder.push(" WHERE deleted = 0");
    for predicate in predicates {
        builder.push(" AND ");
        predicate.push_sql(builder);
    }
}

/// Escape LIKE wildcards so user input matches literally (escape char `\`)
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
