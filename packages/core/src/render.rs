// ABOUTME: Placeholder substitution for contract templates
// ABOUTME: Replaces [key] and {{key}} tokens case-insensitively from a value table

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*([A-Za-z0-9_.]+)\s*\]|\{\{\s*([A-Za-z0-9_.]+)\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Substitute every known placeholder. Keys in `values` must be lowercase.
/// Tokens whose key is not in the table are left as written.
pub fn render_placeholders(content: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures| {
            let key = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            match values.get(&key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn values() -> HashMap<String, String> {
        HashMap::from([
            ("seller.name".to_string(), "Ann Peeters".to_string()),
            ("property.price".to_string(), "350000".to_string()),
            ("buyer.vat".to_string(), String::new()),
        ])
    }

    #[rstest]
    #[case("Seller: [seller.name]", "Seller: Ann Peeters")]
    #[case("Seller: {{seller.name}}", "Seller: Ann Peeters")]
    #[case("Seller: {{ SELLER.NAME }}", "Seller: Ann Peeters")]
    #[case("Price [Property.Price] EUR", "Price 350000 EUR")]
    #[case("VAT: [buyer.vat].", "VAT: .")]
    #[case("Notary: [notary.name]", "Notary: [notary.name]")]
    #[case("no tokens here", "no tokens here")]
    fn test_render_placeholders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(render_placeholders(input, &values()), expected);
    }
}
