//! Typed tree search over parsed markup.
//!
//! The snapshot scraper only needs one primitive: "first descendant matching a
//! predicate", searched depth-first in document order. [`MarkupNode`] is the
//! minimal view of an element that search needs, implemented here for
//! `scraper`'s [`ElementRef`].

use scraper::ElementRef;

/// An element in a parsed markup tree.
pub trait MarkupNode: Sized {
    /// Lower-case element name.
    fn tag(&self) -> &str;

    fn attr(&self, name: &str) -> Option<&str>;

    /// Child elements in document order (text and comment nodes skipped).
    fn children(&self) -> impl Iterator<Item = Self>;

    /// Concatenated text of every descendant text node.
    fn text(&self) -> String;
}

impl<'a> MarkupNode for ElementRef<'a> {
    fn tag(&self) -> &str {
        self.value().name()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn children(&self) -> impl Iterator<Item = Self> {
        (**self).children().filter_map(ElementRef::wrap)
    }

    fn text(&self) -> String {
        ElementRef::text(self).collect()
    }
}

/// First descendant of `root` (not `root` itself) satisfying `predicate`,
/// in pre-order.
///
/// The walk keeps its own stack, so arbitrarily deep markup cannot exhaust
/// the thread's stack.
///
/// # Arguments
///
/// * `root` - Node whose descendants are searched
/// * `predicate` - Match test, usually built with [`class_contains`]
///
/// # Returns
///
/// The first match in document order, or `None`.
pub fn find_descendant<N, P>(root: &N, predicate: &P) -> Option<N>
where
    N: MarkupNode,
    P: Fn(&N) -> bool,
{
    let mut pending: Vec<N> = root.children().collect();
    pending.reverse();

    while let Some(node) = pending.pop() {
        if predicate(&node) {
            return Some(node);
        }
        let first = pending.len();
        pending.extend(node.children());
        pending[first..].reverse();
    }
    None
}

/// Matches elements whose `class` attribute contains `fragment` anywhere.
///
/// This is a substring test on the raw attribute, not a class-list test:
/// `permalink-tweet` also matches `permalink-tweet-container`.
pub fn class_contains<N: MarkupNode>(fragment: &str) -> impl Fn(&N) -> bool + '_ {
    move |node| node.attr("class").is_some_and(|class| class.contains(fragment))
}
