use regex::Regex;
use rust_stemmers::Stemmer;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

pub use rust_stemmers::Algorithm;

const WORD_PATTERN: &str = r"(?u)\p{L}+";

const ENGLISH_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
];

/// Text normalization for one run: word pattern, stopword set and optional stemmer.
///
/// Built once and shared read-only by every tokenization, so every document in a
/// run is normalized the same way.
pub struct Tokenizer {
    pattern: Regex,
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
}

impl Tokenizer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self {
            pattern: Regex::new(WORD_PATTERN).expect("valid regex"),
            stopwords,
            stemmer: None,
        }
    }

    /// Tokenizer with the built-in English stopword list.
    pub fn english() -> Self {
        Self::new(ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect())
    }

    /// Load stopwords from a file with one word per line. Blank lines are skipped.
    pub fn from_stopword_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let stopwords = text
            .lines()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        Ok(Self::new(stopwords))
    }

    pub fn with_stemming(mut self, algorithm: Algorithm) -> Self {
        self.stemmer = Some(Stemmer::create(algorithm));
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// NFKC-normalize, lowercase, split on the word pattern, drop stopwords and
    /// optionally stem. Token order follows the text.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in self.pattern.find_iter(&normalized) {
            let token = mat.as_str();
            if self.is_stopword(token) { continue; }
            match &self.stemmer {
                Some(stemmer) => tokens.push(stemmer.stem(token).into_owned()),
                None => tokens.push(token.to_string()),
            }
        }
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::english() }
}
