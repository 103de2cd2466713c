//! Boilerplate stripping and length-bounded normalization of article bodies.
//!
//! Korean news pages wrap the story in ad markers, paywall prompts, bylines,
//! copyright notices and share buttons. [`NoiseStripper`] drops lines that
//! match any of those categories, skips leading fragments until the real
//! body starts, joins what is left into a single paragraph, and truncates it
//! without splitting a sentence where possible.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Marks that end a sentence for truncation purposes.
const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', '。', '…'];

/// Knobs for [`NoiseStripper::clean`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Maximum output length in characters.
    pub max_length: usize,
    /// Lines shorter than this (in characters) are discarded.
    pub min_line_length: usize,
    /// The body starts at the first surviving line at least this long.
    pub start_detection_length: usize,
    /// Back off to a sentence end when truncating.
    pub preserve_sentence: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_length: 800,
            min_line_length: 10,
            start_detection_length: 30,
            preserve_sentence: true,
        }
    }
}

/// A named category of boilerplate.
#[derive(Debug, Clone)]
pub struct NoisePattern {
    pub name: String,
    pub regex: Regex,
}

impl NoisePattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid `pattern`.
    pub fn new(name: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            regex: Regex::new(pattern)?,
        })
    }
}

static DEFAULT_PATTERNS: Lazy<Vec<NoisePattern>> = Lazy::new(|| {
    [
        ("advertisement", r"\[광고\]|\(광고\)|\bAD\b|(?i:\bsponsored\b)"),
        ("paywall", r"유료회원|구독하시면|프리미엄 회원|로그인 후|기사 전문"),
        ("copyright", r"ⓒ|©|저작권자|무단전재|무단 전재|재배포\s*금지"),
        ("byline", r"기자\s*=|작성자\s*:|글\s*:\s*\w+"),
        (
            "timestamp",
            r"^(입력|수정|승인|발행|등록)?\s*:?\s*(\d{4}년\s*\d{1,2}월\s*\d{1,2}일|\d{4}[-.]\d{2}[-.]\d{2})",
        ),
        ("markup", r"<[^>]*>|&nbsp;|&lt;|&gt;|&amp;"),
        ("email", r"[\w.-]+@[\w.-]+\.\w+"),
        ("social_share", r"페이스북|트위터|카카오톡|공유하기|좋아요"),
        ("footer", r"관련기사|이 기사|더보기|사진제공|출처\s*:"),
        ("decorative", r"[★☆■□▲▶◆●◇◎]{2,}"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| NoisePattern::new(name, pattern).ok())
    .collect()
});

/// The built-in boilerplate categories.
pub fn default_patterns() -> Vec<NoisePattern> {
    DEFAULT_PATTERNS.clone()
}

/// Line-oriented boilerplate remover.
#[derive(Debug, Clone)]
pub struct NoiseStripper {
    options: NormalizeOptions,
    patterns: Vec<NoisePattern>,
}

impl Default for NoiseStripper {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

impl NoiseStripper {
    /// A stripper using the built-in noise categories.
    pub fn new(options: NormalizeOptions) -> Self {
        Self::with_patterns(options, default_patterns())
    }

    pub fn with_patterns(options: NormalizeOptions, patterns: Vec<NoisePattern>) -> Self {
        Self { options, patterns }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    fn noise_category(&self, line: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(line))
            .map(|p| p.name.as_str())
    }

    /// Strip boilerplate from `raw` and bound its length.
    ///
    /// Returns an empty string when nothing but noise remains.
    pub fn clean(&self, raw: &str) -> String {
        let opts = &self.options;
        let lines: Vec<String> = raw
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| line.chars().count() >= opts.min_line_length)
            .filter(|line| match self.noise_category(line) {
                Some(category) => {
                    tracing::trace!(category, line = %crate::utils::truncate_for_log(line, 40), "Dropped noise line");
                    false
                }
                None => true,
            })
            .collect();

        let start = lines
            .iter()
            .position(|line| line.chars().count() >= opts.start_detection_length)
            .unwrap_or(0);

        let joined = lines[start.min(lines.len())..].join(" ");
        truncate_text(&joined, opts.max_length, opts.preserve_sentence)
    }
}

/// Strip noise from `raw` with the built-in categories and `options`.
pub fn extract_meaningful_content(raw: &str, options: &NormalizeOptions) -> String {
    NoiseStripper::new(options.clone()).clean(raw)
}

/// Cut `text` to at most `max_length` characters.
///
/// With `preserve_sentence`, the cut moves back to the last sentence
/// terminator inside the window when that terminator lies past the midpoint.
pub fn truncate_text(text: &str, max_length: usize, preserve_sentence: bool) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_length) else {
        return text.trim().to_string();
    };
    let window = &text[..cut];

    if preserve_sentence {
        if let Some(idx) = window.rfind(SENTENCE_TERMINATORS) {
            let kept_chars = window[..idx].chars().count() + 1;
            if kept_chars > max_length / 2 {
                let end = idx + window[idx..].chars().next().map_or(1, char::len_utf8);
                return window[..end].trim().to_string();
            }
        }
    }
    window.trim_end().to_string()
}
