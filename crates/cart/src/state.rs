//! Pure cart reducers.
//!
//! Every function takes the current snapshot by reference and returns a new
//! collection; nothing here mutates in place or touches storage.

use std::collections::HashSet;

use marketplace_core::{CartEntry, NewCartEntry, ProductId};

use crate::error::{CartError, Result};

/// Result of applying one operation to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The cart changed; this is the new collection.
    Changed(Vec<CartEntry>),
    /// No line matched the requested product.
    Missing,
}

/// Add one unit of `product`.
///
/// An existing line keeps its position and gains one unit. A new product is
/// placed at the front with a quantity of one.
#[must_use]
pub fn with_added(entries: &[CartEntry], product: NewCartEntry) -> Vec<CartEntry> {
    if entries.iter().any(|entry| entry.id == product.id) {
        return map_entry(entries, &product.id, |entry| CartEntry {
            quantity: entry.quantity.incremented(),
            ..entry.clone()
        });
    }

    let mut next = Vec::with_capacity(entries.len() + 1);
    next.push(CartEntry::from_new(product));
    next.extend_from_slice(entries);
    next
}

/// Add one unit to the line for `id`.
#[must_use]
pub fn with_incremented(entries: &[CartEntry], id: &ProductId) -> Outcome {
    if !contains(entries, id) {
        return Outcome::Missing;
    }

    Outcome::Changed(map_entry(entries, id, |entry| CartEntry {
        quantity: entry.quantity.incremented(),
        ..entry.clone()
    }))
}

/// Remove one unit from the line for `id`, dropping the line at zero.
#[must_use]
pub fn with_decremented(entries: &[CartEntry], id: &ProductId) -> Outcome {
    let Some(current) = entries.iter().find(|entry| &entry.id == id) else {
        return Outcome::Missing;
    };

    let next = match current.quantity.decremented() {
        Some(quantity) => map_entry(entries, id, |entry| CartEntry {
            quantity,
            ..entry.clone()
        }),
        None => entries
            .iter()
            .filter(|entry| &entry.id != id)
            .cloned()
            .collect(),
    };

    Outcome::Changed(next)
}

/// Total units across all lines.
#[must_use]
pub fn item_count(entries: &[CartEntry]) -> u64 {
    entries
        .iter()
        .map(|entry| u64::from(entry.quantity.get()))
        .sum()
}

/// Check that a loaded snapshot holds at most one line per product.
///
/// # Errors
///
/// Returns [`CartError::CorruptSnapshot`] naming the first duplicated ID.
pub fn validate_snapshot(entries: &[CartEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(&entry.id) {
            return Err(CartError::CorruptSnapshot(format!(
                "duplicate product id {}",
                entry.id
            )));
        }
    }
    Ok(())
}

fn contains(entries: &[CartEntry], id: &ProductId) -> bool {
    entries.iter().any(|entry| &entry.id == id)
}

fn map_entry(
    entries: &[CartEntry],
    id: &ProductId,
    update: impl Fn(&CartEntry) -> CartEntry,
) -> Vec<CartEntry> {
    entries
        .iter()
        .map(|entry| {
            if &entry.id == id {
                update(entry)
            } else {
                entry.clone()
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use marketplace_core::{Price, Quantity};

    use super::*;

    fn product(id: &str) -> NewCartEntry {
        NewCartEntry {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            image_url: format!("https://cdn.example.com/{id}.png"),
            price: Price::from_cents(1000),
        }
    }

    fn quantities(entries: &[CartEntry]) -> Vec<(&str, u32)> {
        entries
            .iter()
            .map(|entry| (entry.id.as_str(), entry.quantity.get()))
            .collect()
    }

    fn changed(outcome: Outcome) -> Vec<CartEntry> {
        match outcome {
            Outcome::Changed(entries) => entries,
            Outcome::Missing => panic!("expected the cart to change"),
        }
    }

    #[test]
    fn test_new_products_go_to_front() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("b"));
        let cart = with_added(&cart, product("c"));
        assert_eq!(quantities(&cart), [("c", 1), ("b", 1), ("a", 1)]);
    }

    #[test]
    fn test_re_adding_keeps_position() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("b"));
        let cart = with_added(&cart, product("a"));
        assert_eq!(quantities(&cart), [("b", 1), ("a", 2)]);
    }

    #[test]
    fn test_distinct_adds_count_calls() {
        let calls = ["a", "b", "a", "c", "a", "b"];
        let cart = calls
            .iter()
            .fold(Vec::new(), |cart, id| with_added(&cart, product(id)));

        assert_eq!(cart.len(), 3);
        for entry in &cart {
            let expected = calls.iter().filter(|id| **id == entry.id.as_str()).count();
            assert_eq!(entry.quantity.get() as usize, expected);
        }
    }

    #[test]
    fn test_increment_touches_only_target() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("b"));

        let next = changed(with_incremented(&cart, &ProductId::new("a")));
        assert_eq!(quantities(&next), [("b", 1), ("a", 2)]);
        assert_eq!(next[0], cart[0]);
    }

    #[test]
    fn test_increment_missing() {
        let cart = with_added(&[], product("a"));
        assert_eq!(
            with_incremented(&cart, &ProductId::new("zzz")),
            Outcome::Missing
        );
    }

    #[test]
    fn test_decrement_above_one_keeps_line() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("a"));

        let next = changed(with_decremented(&cart, &ProductId::new("a")));
        assert_eq!(quantities(&next), [("a", 1)]);
    }

    #[test]
    fn test_decrement_at_one_removes_line() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("b"));

        let next = changed(with_decremented(&cart, &ProductId::new("b")));
        assert_eq!(quantities(&next), [("a", 1)]);
    }

    #[test]
    fn test_decrement_missing() {
        assert_eq!(
            with_decremented(&[], &ProductId::new("a")),
            Outcome::Missing
        );
    }

    #[test]
    fn test_input_snapshot_untouched() {
        let cart = with_added(&[], product("a"));
        let before = cart.clone();
        let _ = with_incremented(&cart, &ProductId::new("a"));
        let _ = with_decremented(&cart, &ProductId::new("a"));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_item_count() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("a"));
        let cart = with_added(&cart, product("b"));
        assert_eq!(item_count(&cart), 3);
        assert_eq!(item_count(&[]), 0);
    }

    #[test]
    fn test_validate_snapshot_duplicates() {
        let entry = CartEntry {
            quantity: Quantity::new(2).unwrap(),
            ..CartEntry::from_new(product("a"))
        };
        let result = validate_snapshot(&[entry.clone(), entry]);
        assert!(matches!(result, Err(CartError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_validate_snapshot_ok() {
        let cart = with_added(&[], product("a"));
        let cart = with_added(&cart, product("b"));
        assert!(validate_snapshot(&cart).is_ok());
    }
}
