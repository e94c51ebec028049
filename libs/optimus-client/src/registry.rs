// Language registry
// Resolves user/editor language identifiers against a fetched snapshot

use optimus_common::types::Language;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ClientError, ClientResult};

/// Vendor and editor aliases mapped to canonical codes.
/// Keys are lower-case; lookup lower-cases input first.
const ALIASES: &[(&str, &str)] = &[
    ("c++", "cpp"),
    ("cplusplus", "cpp"),
    ("py", "python"),
    ("python3", "python"),
    ("js", "javascript"),
    ("node", "javascript"),
    ("nodejs", "javascript"),
    ("ts", "typescript"),
    ("golang", "go"),
    ("rs", "rust"),
    ("c#", "csharp"),
    ("cs", "csharp"),
    ("kt", "kotlin"),
];

/// Canonical lookup code for an identifier: trimmed, lower-cased, de-aliased
pub fn canonical_code(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

/// Read-only snapshot of the languages offered by the backend
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
    /// canonical code -> index into `languages`, active entries only
    index: HashMap<String, usize>,
    default_code: String,
}

impl LanguageRegistry {
    pub fn from_snapshot(languages: Vec<Language>, default_code: &str) -> Self {
        let mut index = HashMap::new();

        for (position, language) in languages.iter().enumerate() {
            if !language.is_active {
                continue;
            }
            let code = canonical_code(&language.code);
            if index.contains_key(&code) {
                warn!(code = %language.code, "Duplicate language code in snapshot, keeping first");
                continue;
            }
            index.insert(code, position);
        }

        Self {
            languages,
            index,
            default_code: canonical_code(default_code),
        }
    }

    /// All languages in backend order, including inactive ones
    pub fn list_languages(&self) -> &[Language] {
        &self.languages
    }

    /// Active languages in backend order
    pub fn active(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter().filter(|l| l.is_active)
    }

    /// Case-insensitive, alias-aware lookup of an active language
    pub fn resolve(&self, code: &str) -> ClientResult<&Language> {
        self.index
            .get(&canonical_code(code))
            .map(|&position| &self.languages[position])
            .ok_or_else(|| ClientError::LanguageNotFound(code.to_string()))
    }

    /// Resolve, falling back to the default language and then the first
    /// active one. `None` only when nothing is active.
    pub fn resolve_or_default(&self, code: &str) -> Option<&Language> {
        self.resolve(code)
            .ok()
            .or_else(|| self.resolve(&self.default_code).ok())
            .or_else(|| self.active().next())
    }

    /// Editor (Monaco) identifier for a language
    pub fn monaco_id(language: &Language) -> String {
        canonical_code(&language.code)
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
