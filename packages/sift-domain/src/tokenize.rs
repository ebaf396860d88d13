use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 3;

pub const STOP_WORDS: &[&str] = &[
	"a", "about", "after", "again", "am", "an", "and", "any", "are", "as", "at", "be", "been",
	"before", "being", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "each",
	"few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
	"him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most",
	"my", "no", "nor", "not", "of", "off", "on", "once", "or", "other", "our", "ours", "own", "she",
	"should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
	"there", "these", "they", "this", "those", "through", "to", "too", "us", "very", "was", "we",
	"were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "would",
	"you", "your", "yours",
];

const STEP2_SUFFIXES: [(&str, &str); 8] = [
	("ational", "ate"),
	("tional", "tion"),
	("ization", "ize"),
	("fulness", "ful"),
	("ousness", "ous"),
	("iveness", "ive"),
	("ness", ""),
	("ment", ""),
];

/// Splits a raw query into lowercase word tokens.
///
/// Stop words, tokens shorter than `min_len` characters, and purely numeric tokens are dropped.
/// Order and duplicates are preserved.
pub fn normalize(query: &str, min_len: usize) -> Vec<String> {
	let folded = query.nfkc().collect::<String>().to_lowercase();

	folded
		.unicode_words()
		.filter(|word| word.chars().count() >= min_len)
		.filter(|word| !word.chars().all(|ch| ch.is_ascii_digit()))
		.filter(|word| !STOP_WORDS.contains(word))
		.map(str::to_string)
		.collect()
}

pub fn stems(tokens: &[String]) -> Vec<String> {
	tokens.iter().map(|token| stem(token)).collect()
}

/// Adjacent token pairs joined by a single space.
pub fn bigrams(tokens: &[String]) -> impl Iterator<Item = String> + '_ {
	tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1]))
}

/// Light suffix-stripping stemmer covering plurals, past tense, gerunds, and a few derivational
/// endings. Non-ASCII and very short tokens pass through unchanged.
pub fn stem(token: &str) -> String {
	if token.len() <= 3 || !token.is_ascii() {
		return token.to_string();
	}

	let mut word = token.to_string();

	if word.ends_with("sses") || word.ends_with("ies") {
		word.truncate(word.len() - 2);
	} else if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
		word.pop();
	}

	if word.ends_with("eed") {
		if word.len() > 4 {
			word.pop();
		}
	} else if let Some(base) = strip_with_vowel(&word, "ed").or_else(|| strip_with_vowel(&word, "ing"))
	{
		word = base;

		if word.ends_with("at") || word.ends_with("bl") || word.ends_with("iz") {
			word.push('e');
		} else if ends_with_double_consonant(&word) {
			word.pop();
		}
	}

	if word.len() > 2 && word.ends_with('y') && has_vowel(&word[..word.len() - 1]) {
		word.pop();
		word.push('i');
	}

	for (suffix, replacement) in STEP2_SUFFIXES {
		if let Some(base) = word.strip_suffix(suffix)
			&& base.len() > 2
		{
			word = format!("{base}{replacement}");

			break;
		}
	}

	word
}

fn strip_with_vowel(word: &str, suffix: &str) -> Option<String> {
	word.strip_suffix(suffix).filter(|base| has_vowel(base)).map(str::to_string)
}

fn has_vowel(word: &str) -> bool {
	word.chars().any(|ch| matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u'))
}

fn ends_with_double_consonant(word: &str) -> bool {
	let mut tail = word.chars().rev();
	let (Some(last), Some(prev)) = (tail.next(), tail.next()) else {
		return false;
	};

	last == prev && !matches!(last, 'a' | 'e' | 'i' | 'o' | 'u' | 'l' | 's' | 'z')
}
