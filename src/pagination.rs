//! Deterministic, opaque-cursor pagination over a sorted registry snapshot.

use base64::Engine as _;

use crate::error::PaginationError;

/// An opaque page cursor: base64 of the last returned entry's sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn encode(key: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
    }

    pub fn decode(raw: &str) -> Result<String, PaginationError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(|e| PaginationError::InvalidCursor(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| PaginationError::InvalidCursor(e.to_string()))
    }
}

/// Result of paginating a sorted snapshot: the page slice plus an optional
/// cursor for the next page.
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub next_cursor: Option<String>,
}

/// Apply the paging algorithm to a key-sorted snapshot.
///
/// `keys` must be the same length as `items` and sorted ascending — the
/// caller is expected to have produced both from
/// [`crate::registry::ConcurrentRegistry::snapshot_sorted`].
pub fn paginate<'a, T>(
    keys: &[String],
    items: &'a [T],
    cursor: Option<&str>,
    limit: Option<usize>,
) -> Result<Page<'a, T>, PaginationError> {
    debug_assert_eq!(keys.len(), items.len());

    let start = match cursor {
        None => 0,
        Some(raw) => {
            let decoded = Cursor::decode(raw)?;
            // Scan forward to the first entry strictly greater than the
            // decoded key; if the cursor named a deleted entry, this still
            // lands on the next surviving key.
            keys.iter()
                .position(|k| k.as_str() > decoded.as_str())
                .unwrap_or(keys.len())
        }
    };

    let end = match limit {
        Some(limit) => std::cmp::min(keys.len(), start + limit),
        None => keys.len(),
    };

    let items = &items[start.min(items.len())..end.min(items.len())];

    let next_cursor = match limit {
        Some(limit) if items.len() == limit => {
            keys.get(end - 1).map(|k| Cursor::encode(k))
        }
        _ => None,
    };

    Ok(Page { items, next_cursor })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> (Vec<String>, Vec<String>) {
        let keys: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let items = keys.clone();
        (keys, items)
    }

    #[test]
    fn empty_registry_returns_empty_page() {
        let keys: Vec<String> = vec![];
        let items: Vec<String> = vec![];
        let page = paginate(&keys, &items, None, Some(2)).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn paginates_with_limit() {
        let (keys, items) = sample();

        let page1 = paginate(&keys, &items, None, Some(2)).unwrap();
        assert_eq!(page1.items, &["a".to_string(), "b".to_string()]);
        assert_eq!(page1.next_cursor, Some(Cursor::encode("b")));

        let page2 = paginate(&keys, &items, page1.next_cursor.as_deref(), Some(2)).unwrap();
        assert_eq!(page2.items, &["c".to_string(), "d".to_string()]);
        assert!(page2.next_cursor.is_none());
    }

    #[test]
    fn no_limit_returns_everything() {
        let (keys, items) = sample();
        let page = paginate(&keys, &items, None, None).unwrap();
        assert_eq!(page.items.len(), 4);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn monotonic_concatenation_covers_full_sequence_exactly_once() {
        let (keys, items) = sample();
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = paginate(&keys, &items, cursor.as_deref(), Some(1)).unwrap();
            if page.items.is_empty() {
                break;
            }
            seen.extend_from_slice(page.items);
            match &page.next_cursor {
                Some(c) => cursor = Some(c.clone()),
                None => break,
            }
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn deletion_between_pages_does_not_repeat_or_skip() {
        // Cursor names "b"; simulate "b" being deleted between pages by
        // pointing the second paginate() call at a snapshot without it.
        let keys_before: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let items_before = keys_before.clone();
        let page1 = paginate(&keys_before, &items_before, None, Some(2)).unwrap();
        assert_eq!(page1.next_cursor, Some(Cursor::encode("b")));

        let keys_after: Vec<String> = ["a", "c", "d"].iter().map(|s| s.to_string()).collect();
        let items_after = keys_after.clone();
        let page2 = paginate(&keys_after, &items_after, page1.next_cursor.as_deref(), Some(2)).unwrap();
        assert_eq!(page2.items, &["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn cursor_past_last_entry_returns_empty_page() {
        let (keys, items) = sample();
        let cursor = Cursor::encode("z");
        let page = paginate(&keys, &items, Some(&cursor), Some(2)).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn bad_cursor_is_an_error() {
        let (keys, items) = sample();
        let err = paginate(&keys, &items, Some("not-base64!!"), Some(2)).unwrap_err();
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }
}
