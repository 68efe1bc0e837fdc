//! Raw text → language-tagged token ids.
//!
//! Cleaning runs in a fixed order: canonical decomposition, emoji removal,
//! the substitution table, diacritic stripping, symbol and expression
//! rewrites, punctuation spacing, whitespace collapse, and finally a
//! terminal period if the text lacks one.
//!
//! Diacritic stripping is lossy for scripts that rely on combining marks.

use lazy_static::lazy_static;
use regex::Regex;
use supertonic_domain::Language;
use unicode_normalization::UnicodeNormalization;

use super::indexer::CodepointIndexer;
use crate::error::StageError;
use crate::tensor::Tensor;

lazy_static! {
    static ref EMOJI: Regex = Regex::new(concat!(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}",
        r"\x{1F700}-\x{1F77F}\x{1F780}-\x{1F7FF}\x{1F800}-\x{1F8FF}",
        r"\x{1F900}-\x{1F9FF}\x{1FA00}-\x{1FA6F}\x{1FA70}-\x{1FAFF}",
        r"\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{1F1E6}-\x{1F1FF}]+"
    ))
    .unwrap();
    static ref DIACRITICS: Regex = Regex::new(concat!(
        r"[\x{0302}\x{0303}\x{0304}\x{0305}\x{0306}\x{0307}\x{0308}\x{030A}",
        r"\x{030B}\x{030C}\x{0327}\x{0328}\x{0329}\x{032A}\x{032B}\x{032C}",
        r"\x{032D}\x{032E}\x{032F}]"
    ))
    .unwrap();
    static ref SPECIAL_SYMBOLS: Regex = Regex::new(r"[♥☆♡©\\]").unwrap();
    static ref CONTRACTION: Regex = Regex::new(r"(\w)'(\w)").unwrap();
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r" +([,.!?;:'])").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

const SUBSTITUTIONS: &[(char, &str)] = &[
    ('–', "-"),
    ('‑', "-"),
    ('—', "-"),
    ('¯', " "),
    ('_', " "),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('´', "'"),
    ('`', "'"),
    ('[', " "),
    (']', " "),
    ('|', " "),
    ('/', " "),
    ('#', " "),
    ('→', " "),
    ('←', " "),
];

const EXPRESSIONS: &[(&str, &str)] = &[
    ("@", " at "),
    ("e.g.,", "for example, "),
    ("i.e.,", "that is, "),
];

const DUPLICATE_QUOTES: &[(&str, &str)] = &[("\"\"", "\""), ("''", "'"), ("``", "`")];

const TERMINALS: &[char] = &[
    '.', '!', '?', ';', ':', ',', '\'', '"', '\u{2019}', '\u{201D}', ')', ']', '}', '…', '。',
    '」', '』', '】', '〉', '》', '›', '»',
];

/// Output of [`TextNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    /// Cleaned text including the language tags.
    pub text: String,
    pub ids: Vec<i64>,
    /// All ones, one entry per id.
    pub mask: Vec<f32>,
}

impl NormalizedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `text_ids` input, shape `[1, T]`.
    pub fn ids_tensor(&self) -> Result<Tensor, StageError> {
        Tensor::from_i64(&[1, self.ids.len()], self.ids.clone())
    }

    /// `text_mask` input, shape `[1, 1, T]`.
    pub fn mask_tensor(&self) -> Result<Tensor, StageError> {
        Tensor::from_f32(&[1, 1, self.mask.len()], self.mask.clone())
    }
}

/// Cleans text and maps it to model token ids.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    indexer: CodepointIndexer,
    default_language: Language,
}

impl TextNormalizer {
    pub fn new(indexer: CodepointIndexer, default_language: Language) -> Self {
        Self {
            indexer,
            default_language,
        }
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Clean, tag and index `text`. Unsupported language codes fall back to
    /// the default language; unknown codepoints map to the sentinel id.
    pub fn normalize(&self, text: &str, language: &str) -> NormalizedText {
        if !Language::is_supported(language) {
            tracing::debug!(
                requested = language,
                fallback = self.default_language.code(),
                "unsupported language"
            );
        }
        let language = Language::resolve(language, self.default_language);
        let tagged = wrap(&clean(text), language);
        let ids = self.indexer.encode(&tagged);
        let mask = vec![1.0; ids.len()];
        NormalizedText {
            text: tagged,
            ids,
            mask,
        }
    }
}

/// Wrap cleaned text in `<lang>...</lang>`.
pub fn wrap(cleaned: &str, language: Language) -> String {
    let code = language.code();
    format!("<{code}>{cleaned}</{code}>")
}

/// Every cleaning step short of language tagging.
pub fn clean(text: &str) -> String {
    let mut text: String = text.nfkd().collect();

    text = EMOJI.replace_all(&text, "").into_owned();

    let mut substituted = String::with_capacity(text.len());
    for ch in text.chars() {
        match SUBSTITUTIONS.iter().find(|(from, _)| *from == ch) {
            Some((_, to)) => substituted.push_str(to),
            None => substituted.push(ch),
        }
    }
    text = substituted;

    text = DIACRITICS.replace_all(&text, "").into_owned();
    text = SPECIAL_SYMBOLS.replace_all(&text, "").into_owned();
    text = CONTRACTION.replace_all(&text, "$1 $2").into_owned();
    for (from, to) in EXPRESSIONS {
        text = text.replace(from, to);
    }

    text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1").into_owned();
    for (double, single) in DUPLICATE_QUOTES {
        while text.contains(double) {
            text = text.replace(double, single);
        }
    }

    let mut text = WHITESPACE.replace_all(&text, " ").trim().to_string();
    if !text.is_empty() && !text.ends_with(TERMINALS) {
        text.push('.');
    }
    text
}
