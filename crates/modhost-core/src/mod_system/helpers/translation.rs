use std::collections::HashMap;

use parking_lot::RwLock;

/// Translations keyed by locale (e.g. `pt-BR`, or `default`) then key.
pub type TranslationMap = HashMap<String, HashMap<String, String>>;

/// Bucket used when no locale-specific text exists
pub const DEFAULT_LOCALE: &str = "default";

/// Locale-aware text lookup for one mod.
///
/// Lookups fall back from the most specific locale to the default bucket:
/// `pt-BR` tries `pt-br`, then `pt`, then `default`.
#[derive(Debug)]
pub struct TranslationHelper {
    locale: String,
    data: RwLock<TranslationMap>,
}

impl TranslationHelper {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            data: RwLock::new(TranslationMap::new()),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Replace the translation data. Locale names are matched case-insensitively.
    pub fn set_translations(&self, translations: TranslationMap) {
        let normalized = translations
            .into_iter()
            .map(|(locale, entries)| (locale.to_lowercase(), entries))
            .collect();
        *self.data.write() = normalized;
    }

    /// Locales to try, most specific first.
    pub fn fallback_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut locale = self.locale.to_lowercase();
        while !locale.is_empty() {
            chain.push(locale.clone());
            match locale.rfind(['-', '_']) {
                Some(index) => locale.truncate(index),
                None => break,
            }
        }
        if !chain.iter().any(|l| l == DEFAULT_LOCALE) {
            chain.push(DEFAULT_LOCALE.to_string());
        }
        chain
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read();
        self.fallback_chain()
            .iter()
            .find_map(|locale| data.get(locale).and_then(|entries| entries.get(key)))
            .cloned()
    }

    /// Like [`get`](Self::get), replacing `{{token}}` placeholders
    /// (case-insensitive, surrounding spaces allowed). Unknown tokens are
    /// left as-is.
    pub fn get_with(&self, key: &str, tokens: &[(&str, &str)]) -> Option<String> {
        self.get(key).map(|text| substitute_tokens(&text, tokens))
    }

    /// Every key known in any locale of the chain.
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read();
        let mut keys: Vec<String> = self
            .fallback_chain()
            .iter()
            .filter_map(|locale| data.get(locale))
            .flat_map(|entries| entries.keys().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

fn substitute_tokens(text: &str, tokens: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };
        let name = after[..end].trim();
        match tokens.iter().find(|(token, _)| token.eq_ignore_ascii_case(name)) {
            Some((_, value)) => output.push_str(value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    output.push_str(rest);
    output
}
