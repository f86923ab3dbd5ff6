//! Cursor pagination and first-wins deduplication

use async_trait::async_trait;
use mlokit_core::{Page, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A listing that is fetched one page at a time
#[async_trait]
pub trait PageSource<T: Send>: Send {
    /// Fetch the page at `cursor`; `None` requests the first page.
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<T>>;
}

/// Fetch pages until one arrives without a cursor, concatenating the items.
///
/// A page on which the server listed nothing ends the listing whatever its
/// cursor says, as does a cursor identical to the one just used. A page whose
/// records were all dropped as malformed still counts as listed and its cursor
/// is followed.
pub async fn collect_pages<T, S>(source: &mut S) -> Result<Vec<T>>
where
    T: Send,
    S: PageSource<T> + ?Sized,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(cursor.as_deref()).await?;
        pages += 1;
        if page.listed == 0 {
            break;
        }
        items.extend(page.items);

        match page.next_cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                warn!(pages, "Listing returned the same cursor twice; stopping");
                break;
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(pages, items = items.len(), "Paginated listing complete");
    Ok(items)
}

/// Keep the first item for each key, preserving first-seen order. Items with
/// an empty key are dropped.
pub fn dedup_by_key<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        let id = key(&item);
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        unique.push(item);
    }
    unique
}

/// [`collect_pages`] followed by [`dedup_by_key`]
pub async fn collect_unique<T, S, F>(source: &mut S, key: F) -> Result<Vec<T>>
where
    T: Send,
    S: PageSource<T> + ?Sized,
    F: Fn(&T) -> &str,
{
    let items = collect_pages(source).await?;
    Ok(dedup_by_key(items, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        pages: VecDeque<Page<String>>,
        cursors: Vec<Option<String>>,
    }

    impl Scripted {
        fn new(pages: Vec<Page<String>>) -> Self {
            Self {
                pages: pages.into(),
                cursors: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageSource<String> for Scripted {
        async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page<String>> {
            self.cursors.push(cursor.map(str::to_string));
            Ok(self.pages.pop_front().unwrap_or_else(Page::empty))
        }
    }

    fn page(items: &[&str], next: Option<&str>) -> Page<String> {
        Page::new(
            items.iter().map(|s| s.to_string()).collect(),
            next.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_follows_cursors_in_order() {
        let mut source = Scripted::new(vec![
            page(&["a", "b"], Some("p2")),
            page(&["c"], None),
            page(&["never"], None),
        ]);
        let items = collect_pages(&mut source).await.unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
        assert_eq!(source.cursors, vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_listing_despite_cursor() {
        let mut source = Scripted::new(vec![
            page(&["a"], Some("p2")),
            page(&[], Some("p3")),
            page(&["unreachable"], None),
        ]);
        let items = collect_pages(&mut source).await.unwrap();
        assert_eq!(items, vec!["a"]);
        assert_eq!(source.cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_page_of_dropped_records_keeps_cursor() {
        let mut source = Scripted::new(vec![
            page(&["a"], Some("p2")),
            Page::decoded(Vec::new(), 2, Some("p3".to_string())),
            page(&["b"], None),
        ]);
        let items = collect_pages(&mut source).await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
        assert_eq!(
            source.cursors,
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops() {
        let mut source = Scripted::new(vec![
            page(&["a"], Some("same")),
            page(&["b"], Some("same")),
            page(&["c"], None),
        ]);
        let items = collect_pages(&mut source).await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_three_pages_with_repeat_yield_four_unique() {
        let mut source = Scripted::new(vec![
            page(&["m1", "m2"], Some("p2")),
            page(&["m3", "m1"], Some("p3")),
            page(&["m4"], None),
        ]);
        let unique = collect_unique(&mut source, |s: &String| s.as_str())
            .await
            .unwrap();
        assert_eq!(unique, vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_dedup_drops_empty_keys() {
        let items = vec![
            ("", 1),
            ("a", 2),
            ("a", 3),
            ("b", 4),
        ];
        let unique = dedup_by_key(items, |item| item.0);
        assert_eq!(unique, vec![("a", 2), ("b", 4)]);
    }

    proptest::proptest! {
        #[test]
        fn prop_dedup_keeps_first_of_each_key(keys in proptest::collection::vec("[a-c]{0,1}", 0..20)) {
            let items: Vec<(String, usize)> = keys.into_iter().enumerate().map(|(i, k)| (k, i)).collect();
            let unique = dedup_by_key(items.clone(), |item| item.0.as_str());

            let mut seen = std::collections::HashSet::new();
            let expected: Vec<_> = items
                .into_iter()
                .filter(|(k, _)| !k.is_empty() && seen.insert(k.clone()))
                .collect();
            proptest::prop_assert_eq!(unique, expected);
        }
    }
}
