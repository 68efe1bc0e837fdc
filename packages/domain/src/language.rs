//! Language tag wrapped around normalized text (e.g. `<en>...</en>`).
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Language(pub &'static str);

impl Language {
    /// Create a new language tag.
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    /// Get the underlying language code.
    pub const fn code(&self) -> &'static str {
        self.0
    }

    /// English
    pub const ENGLISH: Self = Self("en");

    /// Korean
    pub const KOREAN: Self = Self("ko");

    /// Spanish
    pub const SPANISH: Self = Self("es");

    /// Portuguese
    pub const PORTUGUESE: Self = Self("pt");

    /// French
    pub const FRENCH: Self = Self("fr");

    /// Languages the text encoder was trained on.
    pub const SUPPORTED: [Language; 5] = [
        Self::ENGLISH,
        Self::KOREAN,
        Self::SPANISH,
        Self::PORTUGUESE,
        Self::FRENCH,
    ];

    /// Map a requested code to a supported language, falling back to
    /// `default` for anything outside the supported set.
    pub fn resolve(code: &str, default: Language) -> Language {
        Self::lookup(code).unwrap_or(default)
    }

    /// Whether `code` names a supported language (case-insensitive).
    pub fn is_supported(code: &str) -> bool {
        Self::lookup(code).is_some()
    }

    fn lookup(code: &str) -> Option<Language> {
        let code = code.trim().to_ascii_lowercase();
        Self::SUPPORTED.iter().copied().find(|lang| lang.0 == code)
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::ENGLISH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(Language::resolve("ko", Language::ENGLISH), Language::KOREAN);
        assert_eq!(Language::resolve("FR", Language::ENGLISH), Language::FRENCH);
        assert_eq!(Language::resolve("de", Language::ENGLISH), Language::ENGLISH);
        assert_eq!(Language::resolve("", Language::SPANISH), Language::SPANISH);
    }

    #[test]
    fn support_check_ignores_case_and_padding() {
        assert!(Language::is_supported(" PT "));
        assert!(!Language::is_supported("de"));
        assert!(!Language::is_supported(""));
    }
}
