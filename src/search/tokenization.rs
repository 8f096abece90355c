use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Static set of common English stop words
static ENGLISH_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did",
        "didn't", "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "few",
        "for", "from", "further", "had", "hadn't", "has", "hasn't", "have", "haven't", "having",
        "he", "he'd", "he'll", "he's", "her", "here", "here's", "hers", "herself", "him",
        "himself", "his", "how", "how's", "i", "i'd", "i'll", "i'm", "i've", "if", "in", "into",
        "is", "isn't", "it", "it's", "its", "itself", "let's", "me", "more", "most", "mustn't",
        "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other",
        "ought", "our", "ours", "ourselves", "out", "over", "own", "same", "shan't", "she",
        "she'd", "she'll", "she's", "should", "shouldn't", "so", "some", "such", "than", "that",
        "that's", "the", "their", "theirs", "them", "themselves", "then", "there", "there's",
        "these", "they", "they'd", "they'll", "they're", "they've", "this", "those", "through",
        "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "we'd", "we'll",
        "we're", "we've", "were", "weren't", "what", "what's", "when", "when's", "where",
        "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with", "won't",
        "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
        "yourself", "yourselves",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Static set of consumer-health terms that carry no signal in a corpus where
/// every document is about medicine
static MEDICAL_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "disease", "diseases", "disorder", "symptom", "symptoms", "drug", "drugs", "problems",
        "problem", "prob", "probs", "med", "meds", "pill", "pills", "medicine", "medicines",
        "medication", "medications", "treatment", "treatments", "caps", "capsules", "capsule",
        "tablet", "tablets", "tabs", "doctor", "dr", "doc", "physician", "physicians", "test",
        "tests", "testing", "specialist", "specialists", "side-effect", "side-effects",
        "pharmaceutical", "pharmaceuticals", "pharma", "diagnosis", "diagnose", "diagnosed",
        "exam", "challenge", "device", "condition", "conditions", "suffer", "suffering",
        "suffered", "feel", "feeling", "prescription", "prescribe", "prescribed",
        "over-the-counter", "otc",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Static set of clinical-literature stop words (abstract boilerplate, units,
/// reporting verbs)
static CLINICAL_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "almost", "also", "although", "always", "among", "another", "due", "either", "enough",
        "especially", "etc", "found", "however", "just", "kg", "km", "made", "mainly", "make",
        "may", "mg", "might", "ml", "mm", "mostly", "must", "nearly", "neither", "obtained",
        "often", "overall", "perhaps", "pmid", "quite", "rather", "really", "regarding", "seem",
        "seen", "several", "show", "showed", "shown", "shows", "significantly", "since", "thus",
        "upon", "various", "within", "without",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Static set of publisher boilerplate words
static BOILERPLATE_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "copyright", "journal", "review", "volume", "date", "none", "pdf", "facebook",
        "twitter", "email",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Returns a reference to the global stemmer instance
pub fn get_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Checks whether a token is in any of the stop word sets
pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(token)
        || MEDICAL_STOP_WORDS.contains(token)
        || CLINICAL_STOP_WORDS.contains(token)
        || BOILERPLATE_STOP_WORDS.contains(token)
}

/// Removes HTML tag substrings (`<...>`) from the input. Unterminated tags
/// are dropped to the end of the string.
fn strip_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Rewrites the lowercased input so that only alphanumeric runs remain,
/// separated by single spaces. Alpha->digit and digit->alpha transitions are
/// split as well, so `covid19` becomes `covid 19`.
fn split_non_letter_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    let mut prev_digit = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_digit {
                out.push(' ');
            }
            out.push(c);
            prev_alpha = true;
            prev_digit = false;
        } else if c.is_ascii_digit() {
            if prev_alpha {
                out.push(' ');
            }
            out.push(c);
            prev_alpha = false;
            prev_digit = true;
        } else {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
            prev_alpha = false;
            prev_digit = false;
        }
    }
    out
}

/// Tokenizes text into stemmed lowercase terms.
///
/// The pipeline, in order: case-fold, strip HTML tags, collapse punctuation
/// and other non-alphanumeric runs into spaces, split alpha/digit
/// transitions, drop pure-digit tokens, drop stop words, drop tokens shorter
/// than 3 characters, and stem what survives.
///
/// The same function is used for both indexed documents and queries, so both
/// sides of the cosine similarity agree on the term space.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = strip_html_tags(&lowered);
    let cleaned = split_non_letter_runs(&stripped);

    let stemmer = get_stemmer();
    cleaned
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !is_stop_word(token))
        .filter(|token| token.chars().count() >= 3)
        .map(|token| stemmer.stem(token).to_string())
        .collect()
}
