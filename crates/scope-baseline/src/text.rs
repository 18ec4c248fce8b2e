//! Text normalization for explainable matching
//!
//! Latin text is split into case-folded words, stop words are dropped and a
//! light suffix stemmer is applied. Han text has no word boundaries, so each
//! run (split on common particles) is turned into character bigrams.

use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

const EN_STOP_WORDS: &[&str] = &[
    "a", "about", "able", "add", "all", "allow", "also", "an", "and", "any", "are", "as", "at",
    "be", "build", "by", "can", "could", "develop", "development", "each", "enable", "feature",
    "features", "for", "from", "function", "functionality", "has", "have", "implement",
    "implementation", "in", "into", "is", "it", "its", "may", "must", "need", "needs", "new",
    "of", "on", "or", "provide", "should", "so", "support", "system", "that", "the", "their",
    "them", "these", "this", "those", "to", "via", "was", "we", "were", "when", "which", "will",
    "with", "would",
];

/// Generic verbs and fillers that carry no scope signal
const HAN_STOP_TOKENS: &[&str] = &[
    "可以", "能够", "需要", "支持", "进行", "实现", "开发", "功能", "提供", "系统", "添加", "相关",
    "一个", "使用", "通过", "以及",
];

/// Particles treated as boundaries inside Han runs
const HAN_PARTICLES: &[char] = &['的', '和', '与', '及', '或', '了', '等', '并', '把', '被'];

#[inline]
pub(crate) fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// Reduce an English word to a comparable stem
#[must_use]
pub fn stem(word: &str) -> String {
    if !word.is_ascii() {
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix("ies") {
        if base.len() >= 3 {
            return format!("{base}y");
        }
    }
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.len() >= 3 && !(suffix == "s" && base.ends_with('s')) {
                return base.to_string();
            }
        }
    }
    word.to_string()
}

/// Tokenize text into normalized matching tokens, in order of appearance
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut latin = String::new();
    let mut han = String::new();

    for c in text.chars() {
        if is_han(c) {
            if !latin.is_empty() {
                push_latin(&latin, &mut tokens);
                latin.clear();
            }
            if HAN_PARTICLES.contains(&c) {
                push_han(&han, &mut tokens);
                han.clear();
            } else {
                han.push(c);
            }
        } else {
            if !han.is_empty() {
                push_han(&han, &mut tokens);
                han.clear();
            }
            latin.push(c);
        }
    }
    push_latin(&latin, &mut tokens);
    push_han(&han, &mut tokens);
    tokens
}

fn push_latin(run: &str, tokens: &mut Vec<String>) {
    for word in run.unicode_words() {
        let lower = word.to_lowercase();
        if lower.chars().count() < 2
            || lower.chars().all(|c| c.is_ascii_digit())
            || EN_STOP_WORDS.contains(&lower.as_str())
        {
            continue;
        }
        tokens.push(stem(&lower));
    }
}

fn push_han(run: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = run.chars().collect();
    match chars.len() {
        0 => {}
        1 => tokens.push(chars[0].to_string()),
        _ => {
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                if !HAN_STOP_TOKENS.contains(&bigram.as_str()) {
                    tokens.push(bigram);
                }
            }
        }
    }
}

/// Whether two tokens count as the same keyword.
///
/// Latin tokens of at least four characters also match by prefix, so
/// `creat` matches `creation`.
#[must_use]
pub fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if !a.is_ascii() || !b.is_ascii() {
        return false;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= 4 && long.starts_with(short)
}

/// Deduplicated token set of a text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: BTreeSet<String>,
}

impl TokenSet {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens: tokenize(text).into_iter().collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Tokens of `self` that have a match in `other`, in sorted order
    #[must_use]
    pub fn shared_with<'a>(&'a self, other: &TokenSet) -> Vec<&'a str> {
        self.iter()
            .filter(|t| other.contains_match(t))
            .collect()
    }

    /// Whether any token of `self` matches `token`
    #[must_use]
    pub fn contains_match(&self, token: &str) -> bool {
        self.tokens.contains(token) || self.iter().any(|t| tokens_match(t, token))
    }

    /// Union of two sets
    #[must_use]
    pub fn union(&self, other: &TokenSet) -> TokenSet {
        TokenSet {
            tokens: self.tokens.union(&other.tokens).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn han_runs_become_bigrams() {
        assert_eq!(tokenize("任务创建"), vec!["任务", "务创", "创建"]);
    }

    #[test]
    fn particles_and_punctuation_split_runs() {
        assert_eq!(
            tokenize("开发任务创建的API和界面"),
            vec!["发任", "任务", "务创", "创建", "api", "界面"]
        );
        assert_eq!(tokenize("登录和认证"), vec!["登录", "认证"]);
        assert_eq!(tokenize("注册、登录"), vec!["注册", "登录"]);
    }

    #[test]
    fn single_han_char_stays_unigram() {
        assert_eq!(tokenize("A 键"), vec!["键"]);
    }

    #[test]
    fn latin_words_are_folded_and_stemmed() {
        assert_eq!(
            tokenize("Users can create Tasks and filter by Categories"),
            vec!["user", "create", "task", "filter", "category"]
        );
        assert_eq!(stem("creating"), "creat");
        assert_eq!(stem("access"), "access");
        assert_eq!(stem("is"), "is");
    }

    #[test]
    fn stop_words_and_numbers_are_dropped() {
        assert!(tokenize("the 2 of 100").is_empty());
        assert!(tokenize("实现").is_empty());
    }

    #[test]
    fn prefix_matching_is_stem_insensitive() {
        assert!(tokens_match("creat", "creation"));
        assert!(tokens_match("notification", "notif"));
        assert!(!tokens_match("api", "apiary"));
        assert!(!tokens_match("任务", "任"));
    }

    #[test]
    fn shared_tokens() {
        let task = TokenSet::from_text("实现任务创建功能");
        let req = TokenSet::from_text("任务创建");
        assert_eq!(task.shared_with(&req), vec!["任务", "创建", "务创"]);
        assert_eq!(req.shared_with(&task).len(), 3);
    }
}
