//! Cursor-paginated listings.

use std::future::Future;

use async_stream::try_stream;
use futures::Stream;
use lexvault_core::Result;
use serde::Deserialize;

/// One page of names plus the cursor of the next page, if any.
///
/// `fetched` counts what the server returned before filtering, which is
/// what `maxResults` caps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Page {
    pub entries: Vec<String>,
    pub fetched: usize,
    pub next_cursor: Option<String>,
}

impl Page {
    #[cfg(test)]
    fn unfiltered(entries: Vec<String>, next_cursor: Option<String>) -> Self {
        Self {
            fetched: entries.len(),
            entries,
            next_cursor,
        }
    }
}

/// Walks pages lazily until a page comes back short of `page_size` or
/// carries no continuation cursor.
pub(crate) fn paginate<'a, F, Fut>(page_size: usize, mut fetch: F) -> impl Stream<Item = Result<String>> + Send + 'a
where
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page>> + Send + 'a,
{
    try_stream! {
        let mut cursor = None;
        loop {
            let page = fetch(cursor.take()).await?;
            let full = page.fetched >= page_size;
            for entry in page.entries {
                yield entry;
            }
            match page.next_cursor {
                Some(next) if full => cursor = Some(next),
                _ => break,
            }
        }
    }
}

/// Objects listing response of the JSON API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectList {
    #[serde(default)]
    pub items: Vec<ObjectResource>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectResource {
    pub name: String,
}

/// Which part of a listing response a stream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    /// Objects directly below the prefix.
    Files,
    /// Common prefixes one level below the prefix.
    Folders,
    /// Every object below the prefix.
    Recursive,
}

impl ListKind {
    pub fn delimiter(self) -> Option<&'static str> {
        match self {
            Self::Files | Self::Folders => Some("/"),
            Self::Recursive => None,
        }
    }

    /// Converts a raw response into names relative to `prefix`.
    pub fn page(self, prefix: &str, list: ObjectList) -> Page {
        let fetched = list.items.len() + list.prefixes.len();
        let entries = match self {
            Self::Files | Self::Recursive => list
                .items
                .into_iter()
                .filter_map(|item| item.name.strip_prefix(prefix).map(str::to_string))
                .filter(|name| !name.is_empty())
                .collect(),
            Self::Folders => list
                .prefixes
                .into_iter()
                .filter_map(|folder| {
                    folder
                        .strip_prefix(prefix)
                        .and_then(|rest| rest.strip_suffix('/'))
                        .map(str::to_string)
                })
                .filter(|name| !name.is_empty())
                .collect(),
        };

        Page {
            entries,
            fetched,
            next_cursor: list.next_page_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::TryStreamExt;

    use super::*;

    fn names(range: std::ops::Range<u32>) -> Vec<String> {
        range.map(|i| format!("doc-{i:03}")).collect()
    }

    #[tokio::test]
    async fn follows_cursors_across_pages() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let all: Vec<String> = paginate(2, move |cursor: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let page = match cursor.as_deref() {
                    None => Page::unfiltered(names(0..2), Some("p2".into())),
                    Some("p2") => Page::unfiltered(names(2..4), Some("p3".into())),
                    Some(_) => Page::unfiltered(names(4..5), None),
                };
                Ok(page)
            }
        })
        .try_collect()
        .await
        .unwrap();

        assert_eq!(all, names(0..5));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn short_page_ends_listing_even_with_cursor() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let all: Vec<String> = paginate(10, move |_cursor| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(Page::unfiltered(names(0..3), Some("more".into())))
            }
        })
        .try_collect()
        .await
        .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filtered_entries_do_not_shorten_a_full_page() {
        let responses = [
            serde_json::json!({
                "items": [{"name": "p/"}, {"name": "p/a"}],
                "nextPageToken": "p2"
            }),
            serde_json::json!({ "items": [{"name": "p/b"}] }),
        ];

        let all: Vec<String> = paginate(2, move |cursor: Option<String>| {
            let response = responses[usize::from(cursor.is_some())].clone();
            let list: ObjectList = serde_json::from_value(response).unwrap();
            let page = ListKind::Files.page("p/", list);
            async move { Ok(page) }
        })
        .try_collect()
        .await
        .unwrap();

        assert_eq!(all, ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_first_page_yields_nothing() {
        let all: Vec<String> = paginate(10, |_cursor| async { Ok(Page::default()) })
            .try_collect()
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn names_are_relative_to_prefix() {
        let list: ObjectList = serde_json::from_value(serde_json::json!({
            "items": [{"name": "base/lib/a.json"}, {"name": "base/lib/b.pdf"}],
            "prefixes": ["base/lib/doc1/", "base/lib/doc2/"],
            "nextPageToken": "tok"
        }))
        .unwrap();

        let files = ListKind::Files.page("base/lib/", ObjectList {
            items: list.items,
            prefixes: Vec::new(),
            next_page_token: list.next_page_token,
        });
        assert_eq!(files.entries, vec!["a.json", "b.pdf"]);
        assert_eq!(files.next_cursor.as_deref(), Some("tok"));

        let folders = ListKind::Folders.page("base/lib/", ObjectList {
            prefixes: list.prefixes,
            ..ObjectList::default()
        });
        assert_eq!(folders.entries, vec!["doc1", "doc2"]);
    }
}
