//! Title normalisation and the required/banned word filter shared by the
//! channel, title, description and tag stages.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Settings;

fn emoji_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            "[",
            r"\x{1F600}-\x{1F64F}", // emoticons
            r"\x{1F300}-\x{1F5FF}", // symbols & pictographs
            r"\x{1F680}-\x{1F6FF}", // transport & map
            r"\x{1F700}-\x{1F77F}", // alchemical
            r"\x{1F780}-\x{1F7FF}", // geometric shapes extended
            r"\x{1F800}-\x{1F8FF}", // supplemental arrows-c
            r"\x{1F900}-\x{1F9FF}",
            r"\x{1FA00}-\x{1FA6F}", // chess
            r"\x{1FA70}-\x{1FAFF}",
            r"\x{2702}-\x{27B0}",
            r"\x{24C2}-\x{1F251}", // enclosed characters and everything between
            "]+",
        ))
        .expect("emoji pattern is valid")
    })
}

fn spaces_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(" +").expect("spaces pattern is valid"))
}

/// Removes emojis, then collapses the spaces they leave behind.
pub fn strip_emojis(text: &str) -> String {
    collapse_spaces(&emoji_pattern().replace_all(text, ""))
}

/// Replaces ASCII punctuation with spaces, then collapses them.
pub fn strip_punctuation(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect();
    collapse_spaces(&spaced)
}

/// Collapses runs of spaces into one space.
pub fn collapse_spaces(text: &str) -> String {
    spaces_pattern().replace_all(text, " ").into_owned()
}

/// Which title transforms are enabled. Applied in order: emojis, punctuation, case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleNormalisation {
    pub strip_emojis: bool,
    pub strip_punctuation: bool,
    pub fold_case: bool,
}

impl TitleNormalisation {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            strip_emojis: settings.ignore_title_emojis,
            strip_punctuation: settings.ignore_title_punctuation,
            fold_case: settings.ignore_title_case,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        if self.strip_emojis {
            out = strip_emojis(&out);
        }
        if self.strip_punctuation {
            out = strip_punctuation(&out);
        }
        if self.fold_case {
            out = out.to_lowercase();
        }
        out
    }
}

/// Optional required and banned word lists.
///
/// A value passes when it contains any required word (or there are none) and no
/// banned word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    required: Option<Vec<String>>,
    banned: Option<Vec<String>>,
}

impl WordFilter {
    pub fn new(required: Option<Vec<String>>, banned: Option<Vec<String>>) -> Self {
        Self { required, banned }
    }

    pub fn is_active(&self) -> bool {
        self.required.as_ref().map_or(false, |w| !w.is_empty())
            || self.banned.as_ref().map_or(false, |w| !w.is_empty())
    }

    /// The same filter with every word passed through `normalisation`.
    pub fn normalised(&self, normalisation: &TitleNormalisation) -> Self {
        let map = |words: &Option<Vec<String>>| {
            words
                .as_ref()
                .map(|w| w.iter().map(|word| normalisation.apply(word)).collect())
        };
        Self {
            required: map(&self.required),
            banned: map(&self.banned),
        }
    }

    /// Substring semantics over free text.
    pub fn accepts_text(&self, text: &str) -> bool {
        self.evaluate(|word| text.contains(word))
    }

    /// Exact membership semantics over a list of items.
    pub fn accepts_members(&self, items: &[String]) -> bool {
        self.evaluate(|word| items.iter().any(|item| item == word))
    }

    fn evaluate(&self, contains: impl Fn(&str) -> bool) -> bool {
        let required_ok = match self.required.as_deref() {
            Some(words) if !words.is_empty() => words.iter().any(|w| contains(w)),
            _ => true,
        };
        let banned_ok = self
            .banned
            .as_deref()
            .map_or(true, |words| !words.iter().any(|w| contains(w)));
        required_ok && banned_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn banned_word_wins_over_required() {
        let filter = WordFilter::new(words(&["foo"]), words(&["bar"]));
        assert!(!filter.accepts_text("foobar"));
        assert!(filter.accepts_text("food"));
        assert!(!filter.accepts_text("baz"));
    }

    #[test]
    fn no_lists_means_no_filtering() {
        let filter = WordFilter::default();
        assert!(!filter.is_active());
        assert!(filter.accepts_text(""));
        assert!(filter.accepts_members(&[]));
    }

    #[test]
    fn tags_match_exactly() {
        let filter = WordFilter::new(words(&["rust"]), None);
        assert!(filter.accepts_members(&["rust".into(), "async".into()]));
        assert!(!filter.accepts_members(&["rustlang".into()]));
    }

    #[test]
    fn transforms_run_in_order() {
        let all = TitleNormalisation {
            strip_emojis: true,
            strip_punctuation: true,
            fold_case: true,
        };
        assert_eq!(all.apply("Hello 🚀 World!!"), "hello world ");
        let case_only = TitleNormalisation {
            fold_case: true,
            ..TitleNormalisation::default()
        };
        assert_eq!(case_only.apply("Rust, Again"), "rust, again");
    }

    #[test]
    fn word_lists_follow_the_title_transform() {
        let normalisation = TitleNormalisation {
            fold_case: true,
            ..TitleNormalisation::default()
        };
        let filter = WordFilter::new(words(&["Rust"]), None).normalised(&normalisation);
        assert!(filter.accepts_text(&normalisation.apply("Learning RUST today")));
    }

    #[test]
    fn enclosed_and_extended_symbols_are_emojis() {
        assert_eq!(strip_emojis("🆕 NEW"), " NEW");
        assert_eq!(strip_emojis("🅰 A"), " A");
        assert_eq!(strip_emojis("🈁 x"), " x");
        assert_eq!(strip_emojis("🟠 dot"), " dot");
        assert_eq!(strip_emojis("Ⓜ M"), " M");
        assert_eq!(strip_emojis("play 🪀 yo-yo"), "play yo-yo");
        assert_eq!(strip_emojis("✂ cut"), " cut");
    }

    #[test]
    fn plain_text_survives_emoji_stripping() {
        assert_eq!(strip_emojis("Rust 1.80 - what's new?"), "Rust 1.80 - what's new?");
        assert_eq!(collapse_spaces("a   b  c"), "a b c");
    }
}
