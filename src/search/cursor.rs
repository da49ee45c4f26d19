//! Cursor tokens for keyset pagination.
//!
//! The client echoes back `cursor` (the last row's id) and `after` (the
//! last row's sort value). Both are validated here; anything unparseable is
//! rejected instead of silently restarting from the first page.

use chrono::{DateTime, SecondsFormat};
use uuid::Uuid;

use super::{SearchError, SortKey};
use crate::storage::Article;

/// Decoded position of the last row of the previous page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub id: Uuid,
    /// Sort-column value in storage units (epoch millis or a count)
    pub after: Option<i64>,
}

/// Decode a `(cursor, after)` pair for ordering by `key`.
///
/// Blank strings count as absent.
pub fn decode(
    cursor: Option<&str>,
    after: Option<&str>,
    key: SortKey,
) -> Result<Option<CursorPosition>, SearchError> {
    let cursor = cursor.map(str::trim).filter(|c| !c.is_empty());
    let after = after.map(str::trim).filter(|a| !a.is_empty());

    let Some(raw_id) = cursor else {
        return match after {
            Some(_) => Err(SearchError::InvalidCursor(
                "`after` given without `cursor`".to_string(),
            )),
            None => Ok(None),
        };
    };

    let id = Uuid::parse_str(raw_id)
        .map_err(|_| SearchError::InvalidCursor(format!("not an article id: {raw_id:?}")))?;

    let after = match (key, after) {
        (SortKey::PublishDate, None) => {
            return Err(SearchError::InvalidCursor(
                "ordering by publishDate needs `after` alongside `cursor`".to_string(),
            ))
        }
        (_, None) => None,
        (SortKey::PublishDate, Some(raw)) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| {
                    SearchError::InvalidCursor(format!("`after` is not an RFC 3339 time: {raw:?}"))
                })?
                .timestamp_millis(),
        ),
        (_, Some(raw)) => Some(raw.parse::<i64>().map_err(|_| {
            SearchError::InvalidCursor(format!("`after` is not an integer: {raw:?}"))
        })?),
    };

    Ok(Some(CursorPosition { id, after }))
}

/// The `nextAfter` token for a page ending at `last`
pub fn encode_after(key: SortKey, last: &Article) -> String {
    match key {
        SortKey::PublishDate => last
            .publish_date
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        SortKey::CommentCount => last.comment_count.to_string(),
        SortKey::ViewCount => last.view_count.to_string(),
    }
}
