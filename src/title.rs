//! Title normalization.
//!
//! Every page is stored under its normalized title: lowercase, with each run
//! of whitespace collapsed to a single `_` and no leading or trailing
//! separator. `prettify` turns a stored key back into something readable.

/// Separator used in place of whitespace in normalized titles.
pub const SEPARATOR: char = '_';

/// Returns the storage key for `title`.
///
/// `"  The  Sunken Ship "` becomes `"the_sunken_ship"`. Idempotent.
pub fn normalize(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Returns a display title for a stored key: `"the_sunken_ship"` becomes
/// `"The Sunken Ship"`. Display only, never stored.
///
/// A letter is uppercased when the character before it is not a letter and
/// lowercased otherwise, so `"o'neil"` reads `"O'Neil"` and `"3d_printing"`
/// reads `"3D Printing"`.
pub fn prettify(key: &str) -> String {
    key.split(SEPARATOR)
        .filter(|w| !w.is_empty())
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut prev_cased = false;
    for c in word.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if cased && !prev_cased {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        prev_cased = cased;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_lowercases_and_joins() {
        assert_eq!(normalize("My Page"), "my_page");
        assert_eq!(normalize("  The   Sunken\tShip \n"), "the_sunken_ship");
    }

    #[test]
    fn normalize_keeps_existing_separators() {
        assert_eq!(normalize("my_page"), "my_page");
        assert_eq!(normalize("Stock_Market"), "stock_market");
    }

    #[test]
    fn normalize_blank_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t\n "), "");
    }

    #[test]
    fn prettify_title_cases_words() {
        assert_eq!(prettify("the_sunken_ship"), "The Sunken Ship");
        assert_eq!(prettify("wiki"), "Wiki");
        assert_eq!(prettify("stock_MARKET"), "Stock Market");
    }

    #[test]
    fn prettify_capitalizes_after_non_letters() {
        assert_eq!(prettify("o'neil"), "O'Neil");
        assert_eq!(prettify("3d_printing"), "3D Printing");
        assert_eq!(prettify("rock-n-roll"), "Rock-N-Roll");
        assert_eq!(normalize(&prettify("o'neil")), "o'neil");
    }

    #[test]
    fn prettify_skips_empty_segments() {
        assert_eq!(prettify("__a__b_"), "A B");
        assert_eq!(prettify(""), "");
    }

    #[test]
    fn prettify_then_normalize_recovers_key() {
        assert_eq!(normalize(&prettify("the_sunken_ship")), "the_sunken_ship");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(title in "\\PC*") {
            let once = normalize(&title);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_title_has_no_whitespace(title in "\\PC*") {
            let key = normalize(&title);
            prop_assert!(!key.chars().any(char::is_whitespace));
            prop_assert_eq!(key.is_empty(), title.trim().is_empty());
        }
    }
}
