//! Pure resolution of natural-language references against a session's
//! remembered result sets.
//!
//! Everything here is a function of `(phrase, snapshot)` only. A phrase that
//! does not carry a resolvable pattern, or that targets an empty slot, comes
//! back as `None`; callers treat that as "not an implicit reference" and fall
//! through to explicit identifiers. The resolver never guesses.

use crate::domain::product::{Product, ReferenceSet};
use crate::reference::store::ReferenceSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SingleReference {
    Rank(usize),
    Last,
    Cheapest,
    MostExpensive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CollectionReference {
    First(usize),
    Last(usize),
    All,
}

/// Resolve a phrase like "first", "the cheaper one" or "most expensive" to a
/// single product from the session's remembered sets.
///
/// Comparative phrases prefer the compared set and fall back to the search
/// results; ordinal phrases prefer the search results and fall back to the
/// compared set. When a phrase carries both cues the comparative reading
/// wins, mirroring that fallback order.
pub fn resolve_single(phrase: &str, snapshot: &ReferenceSnapshot) -> Option<Product> {
    let tokens = tokenize(phrase);
    if parse_collection(&tokens).is_some() {
        // "first two" and friends are collection references, not ordinals.
        return None;
    }

    match parse_single(&tokens)? {
        SingleReference::Cheapest => {
            comparative_candidates(snapshot).and_then(ReferenceSet::cheapest).cloned()
        }
        SingleReference::MostExpensive => {
            comparative_candidates(snapshot).and_then(ReferenceSet::most_expensive).cloned()
        }
        SingleReference::Rank(rank) => {
            ordinal_candidates(snapshot).and_then(|set| set.position(rank)).cloned()
        }
        SingleReference::Last => ordinal_candidates(snapshot)
            .and_then(|set| set.position(set.len()))
            .cloned(),
    }
}

/// Resolve a collection phrase ("first two", "top 3", "last two", "all") to
/// an ordered prefix, suffix or the whole remembered set.
///
/// A request for more products than the set holds returns the full set; the
/// caller learns about the shortfall from the returned length, not from an
/// error.
pub fn resolve_many(phrase: &str, snapshot: &ReferenceSnapshot) -> Option<Vec<Product>> {
    let tokens = tokenize(phrase);
    let reference = parse_collection(&tokens)?;
    let candidates = ordinal_candidates(snapshot)?;
    if candidates.is_empty() {
        return None;
    }

    let products = match reference {
        CollectionReference::First(n) => candidates.first_n(n),
        CollectionReference::Last(n) => candidates.last_n(n),
        CollectionReference::All => candidates.products().to_vec(),
    };
    Some(products)
}

/// Comparative cues read from the compared set first: "the cheaper one"
/// usually follows a comparison.
fn comparative_candidates(snapshot: &ReferenceSnapshot) -> Option<&ReferenceSet> {
    pick_slot(snapshot.last_compared_products.as_ref(), snapshot.last_search_results.as_ref())
}

/// Ordinal cues read from the search results first: "the first one" usually
/// points at the latest result list.
fn ordinal_candidates(snapshot: &ReferenceSnapshot) -> Option<&ReferenceSet> {
    pick_slot(snapshot.last_search_results.as_ref(), snapshot.last_compared_products.as_ref())
}

fn pick_slot<'a>(
    preferred: Option<&'a ReferenceSet>,
    fallback: Option<&'a ReferenceSet>,
) -> Option<&'a ReferenceSet> {
    preferred.filter(|set| !set.is_empty()).or_else(|| fallback.filter(|set| !set.is_empty()))
}

fn parse_single(tokens: &[String]) -> Option<SingleReference> {
    let has = |word: &str| tokens.iter().any(|token| token == word);

    if has("cheaper") || has("cheapest") || has("lowest") {
        return Some(SingleReference::Cheapest);
    }
    if has("expensive") || has("highest") || has("most") {
        return Some(SingleReference::MostExpensive);
    }

    for token in tokens {
        if let Some(rank) = ordinal_rank(token) {
            return Some(SingleReference::Rank(rank));
        }
    }
    if has("last") {
        return Some(SingleReference::Last);
    }

    None
}

fn parse_collection(tokens: &[String]) -> Option<CollectionReference> {
    if tokens.iter().any(|token| token == "all" || token == "everything") {
        return Some(CollectionReference::All);
    }

    for pair in tokens.windows(2) {
        let [keyword, count_token] = pair else { continue };
        let Some(count) = count_value(count_token) else { continue };
        match keyword.as_str() {
            "first" | "top" => return Some(CollectionReference::First(count)),
            "last" => return Some(CollectionReference::Last(count)),
            _ => {}
        }
    }

    None
}

fn ordinal_rank(token: &str) -> Option<usize> {
    match token {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        "fifth" => Some(5),
        _ => None,
    }
}

fn count_value(token: &str) -> Option<usize> {
    match token {
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        _ => token.parse::<usize>().ok().filter(|n| *n > 0),
    }
}

fn tokenize(phrase: &str) -> Vec<String> {
    phrase
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
