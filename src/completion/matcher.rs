use itertools::Itertools;
use nucleo_matcher::{
    pattern::{self, Normalization},
    Matcher,
};
use tower_lsp::lsp_types::CompletionItem;

fn compute_match_score(
    matcher: &mut Matcher,
    pattern: &pattern::Pattern,
    item: CompletionItem,
) -> (u32, CompletionItem) {
    let mut buf = Vec::new();
    (
        pattern
            .score(
                nucleo_matcher::Utf32Str::new(item.label.as_str(), &mut buf),
                matcher,
            )
            .unwrap_or_default(),
        item,
    )
}

/// Order `items` by how well their labels fuzzy-match `query`, best first.
///
/// Items that do not match are dropped. An empty query keeps every item in
/// its original order.
pub fn rank(query: &str, items: Vec<CompletionItem>) -> Vec<CompletionItem> {
    if query.is_empty() {
        return items;
    }

    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let pattern =
        pattern::Pattern::parse(query, pattern::CaseMatching::Smart, Normalization::Smart);

    items
        .into_iter()
        .map(|item| compute_match_score(&mut matcher, &pattern, item))
        .filter(|(score, _)| *score > 0)
        // Stable, so equal scores keep their original order
        .sorted_by(|(a, _), (b, _)| Ord::cmp(b, a))
        .map(|(_score, item)| item)
        .collect_vec()
}
