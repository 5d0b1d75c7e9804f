//! Pagination utilities.
//!
//! The strategy here is intentionally simple: split the text into paragraphs
//! at line breaks, then pack them greedily into pages of roughly
//! `budget_chars` characters. Paragraphs are never split; one that alone
//! exceeds the budget gets a page to itself. Every page remembers its byte
//! range in the source text so a spoken token can be mapped back to the page
//! that shows it.

use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

/// Default page size in characters.
pub const DEFAULT_PAGE_BUDGET_CHARS: usize = 1200;
/// Smallest accepted page budget.
pub const MIN_PAGE_BUDGET_CHARS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Page {
    pub content: String,
    pub start: usize,
    pub end: usize,
}

impl Page {
    fn from_range(text: &str, start: usize, end: usize) -> Self {
        Self {
            content: text[start..end].to_string(),
            start,
            end,
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Split `text` into contiguous, paragraph-aligned pages.
///
/// Concatenating the returned contents reproduces `text` exactly. Empty text
/// produces no pages; any other text produces at least one.
pub fn repaginate(text: &str, budget_chars: usize) -> Vec<Page> {
    let budget = budget_chars.max(MIN_PAGE_BUDGET_CHARS);
    let mut pages = Vec::new();
    let mut page_start = 0usize;
    let mut page_end = 0usize;
    let mut page_weight = 0usize;

    for paragraph in text.split_inclusive('\n') {
        let weight = paragraph_weight(paragraph);
        if page_end > page_start && page_weight + weight > budget {
            pages.push(Page::from_range(text, page_start, page_end));
            page_start = page_end;
            page_weight = 0;
        }
        page_end += paragraph.len();
        page_weight += weight;
    }

    if page_end > page_start {
        pages.push(Page::from_range(text, page_start, page_end));
    }

    debug!(
        chars = text.chars().count(),
        budget,
        pages = pages.len(),
        "Repaginated text"
    );
    pages
}

/// Characters a paragraph contributes to the page budget. Line terminators
/// are kept in the page content but not counted.
fn paragraph_weight(paragraph: &str) -> usize {
    paragraph
        .trim_end_matches(['\n', '\r'])
        .chars()
        .count()
}

/// Index of the page whose `[start, end)` range holds `offset`.
pub fn page_for_offset(pages: &[Page], offset: usize) -> Option<usize> {
    let idx = pages.partition_point(|page| page.end <= offset);
    pages
        .get(idx)
        .filter(|page| page.contains(offset))
        .map(|_| idx)
}

/// Result of a manual page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Moved(usize),
    /// Already on the last page (or there are no pages).
    PastEnd,
    /// Already on the first page (or there are no pages).
    BeforeStart,
}

/// The page list plus the index currently on screen.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pages: Vec<Page>,
    current: usize,
}

impl PageView {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages, current: 0 }
    }

    pub fn reset(&mut self, pages: Vec<Page>) {
        self.pages = pages;
        self.current = 0;
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.current)
    }

    pub fn next(&mut self) -> PageTurn {
        if self.current + 1 >= self.pages.len() {
            return PageTurn::PastEnd;
        }
        self.current += 1;
        PageTurn::Moved(self.current)
    }

    pub fn prev(&mut self) -> PageTurn {
        if self.current == 0 || self.pages.is_empty() {
            return PageTurn::BeforeStart;
        }
        self.current -= 1;
        PageTurn::Moved(self.current)
    }

    pub fn set_page(&mut self, page: usize) -> Option<usize> {
        if self.pages.is_empty() {
            self.current = 0;
            return None;
        }
        let clamped = page.min(self.pages.len() - 1);
        if clamped == self.current {
            return None;
        }
        self.current = clamped;
        Some(clamped)
    }

    /// Turn to the page showing `offset`. Returns the new index when the
    /// view actually moved; single-page views never move.
    pub fn follow_offset(&mut self, offset: usize) -> Option<usize> {
        if self.pages.len() <= 1 {
            return None;
        }
        let target = page_for_offset(&self.pages, offset)?;
        if target == self.current {
            return None;
        }
        self.current = target;
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.content.as_str()).collect()
    }

    #[test]
    fn packs_paragraphs_up_to_budget() {
        let pages = repaginate("AAAAA\nBBBBB\nCCCCC", 10);
        assert_eq!(contents(&pages), vec!["AAAAA\nBBBBB\n", "CCCCC"]);
        assert_eq!((pages[0].start, pages[0].end), (0, 12));
        assert_eq!((pages[1].start, pages[1].end), (12, 17));
    }

    #[test]
    fn concatenation_reproduces_text() {
        let text = "First paragraph here.\n\nSecond one, a bit longer than the first.\r\nThird\n\n\nLast line without newline";
        for budget in [1, 5, 20, 40, 1000] {
            let pages = repaginate(text, budget);
            let joined: String = pages.iter().map(|p| p.content.as_str()).collect();
            assert_eq!(joined, text, "budget {budget}");
            let mut expected_start = 0;
            for page in &pages {
                assert_eq!(page.start, expected_start);
                assert_eq!(&text[page.start..page.end], page.content);
                expected_start = page.end;
            }
            assert_eq!(expected_start, text.len());
        }
    }

    #[test]
    fn oversized_paragraph_stays_whole() {
        let pages = repaginate("short\nthis paragraph is far too long\nend", 8);
        assert_eq!(
            contents(&pages),
            vec!["short\n", "this paragraph is far too long\n", "end"]
        );
    }

    #[test]
    fn empty_text_has_no_pages() {
        assert!(repaginate("", 100).is_empty());
        assert_eq!(repaginate("\n\n", 100).len(), 1);
    }

    #[test]
    fn zero_budget_is_clamped() {
        let pages = repaginate("a\nb", 0);
        assert_eq!(contents(&pages), vec!["a\n", "b"]);
    }

    #[test]
    fn locates_page_for_offset() {
        let pages = repaginate("AAAAA\nBBBBB\nCCCCC", 10);
        assert_eq!(page_for_offset(&pages, 0), Some(0));
        assert_eq!(page_for_offset(&pages, 11), Some(0));
        assert_eq!(page_for_offset(&pages, 12), Some(1));
        assert_eq!(page_for_offset(&pages, 16), Some(1));
        assert_eq!(page_for_offset(&pages, 17), None);
    }

    #[test]
    fn manual_turns_clamp_and_report_edges() {
        let mut view = PageView::new(repaginate("AAAAA\nBBBBB\nCCCCC", 5));
        assert_eq!(view.len(), 3);
        assert_eq!(view.prev(), PageTurn::BeforeStart);
        assert_eq!(view.next(), PageTurn::Moved(1));
        assert_eq!(view.next(), PageTurn::Moved(2));
        assert_eq!(view.next(), PageTurn::PastEnd);
        assert_eq!(view.current(), 2);
        assert_eq!(view.prev(), PageTurn::Moved(1));

        let mut empty = PageView::default();
        assert_eq!(empty.next(), PageTurn::PastEnd);
        assert_eq!(empty.prev(), PageTurn::BeforeStart);
    }

    #[test]
    fn follows_offsets_only_across_multiple_pages() {
        let mut view = PageView::new(repaginate("AAAAA\nBBBBB\nCCCCC", 10));
        assert_eq!(view.follow_offset(3), None);
        assert_eq!(view.follow_offset(13), Some(1));
        assert_eq!(view.follow_offset(14), None);

        let mut single = PageView::new(repaginate("only one page", 100));
        assert_eq!(single.follow_offset(5), None);
        assert_eq!(single.current(), 0);
    }

    #[test]
    fn reset_returns_to_first_page() {
        let mut view = PageView::new(repaginate("AAAAA\nBBBBB", 5));
        view.next();
        view.reset(repaginate("CCCCC\nDDDDD", 5));
        assert_eq!(view.current(), 0);
        assert_eq!(view.set_page(9), Some(1));
        assert_eq!(view.set_page(1), None);
    }
}
