//! Conda's component-wise version comparator: versions split into
//! dot/dash-delimited segments, each segment split further into
//! alternating numeric/alphabetic runs, with a handful of well-known
//! pre-/post-release tokens (`dev`, `alpha`/`a`, `beta`/`b`, `rc`, `post`)
//! ordered relative to a plain release.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Numeric(u64),
    Alpha(String),
}

impl Token {
    /// Rank used only to compare a [`Token::Alpha`] against a
    /// [`Token::Numeric`] — conda treats release-qualifier strings as
    /// ordered relative to a bare numeric release, not lexicographically
    /// against it.
    fn qualifier_rank(s: &str) -> i32 {
        match s.to_ascii_lowercase().as_str() {
            "dev" => -3,
            "a" | "alpha" => -2,
            "b" | "beta" => -1,
            "c" | "rc" => 0,
            "" => 1,
            "post" => 2,
            _ => 1,
        }
    }
}

fn tokenize(segment: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    for ch in segment.chars() {
        let is_digit = ch.is_ascii_digit();
        if current_is_digit.is_some() && current_is_digit != Some(is_digit) {
            tokens.push(finish_token(&current));
            current.clear();
        }
        current.push(ch);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        tokens.push(finish_token(&current));
    }
    tokens
}

fn finish_token(raw: &str) -> Token {
    if let Ok(n) = raw.parse::<u64>() {
        Token::Numeric(n)
    } else {
        Token::Alpha(raw.to_ascii_lowercase())
    }
}

fn split_segments(version: &str) -> Vec<Vec<Token>> {
    version
        .split(['.', '-'])
        .map(tokenize)
        .collect()
}

fn compare_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Numeric(x), Token::Numeric(y)) => x.cmp(y),
        (Token::Alpha(x), Token::Alpha(y)) => Token::qualifier_rank(x)
            .cmp(&Token::qualifier_rank(y))
            .then_with(|| x.cmp(y)),
        (Token::Numeric(_), Token::Alpha(y)) => 1i32.cmp(&Token::qualifier_rank(y)).then(Ordering::Greater),
        (Token::Alpha(x), Token::Numeric(_)) => Token::qualifier_rank(x).cmp(&1i32).then(Ordering::Less),
    }
}

/// Compares two conda version strings. `compare("2.0", "1.9") == Greater`.
pub fn compare(a: &str, b: &str) -> Ordering {
    let segs_a = split_segments(a);
    let segs_b = split_segments(b);

    for i in 0..segs_a.len().max(segs_b.len()) {
        let empty = Vec::new();
        let tokens_a = segs_a.get(i).unwrap_or(&empty);
        let tokens_b = segs_b.get(i).unwrap_or(&empty);

        for j in 0..tokens_a.len().max(tokens_b.len()) {
            let default_a = Token::Numeric(0);
            let default_b = Token::Numeric(0);
            let ta = tokens_a.get(j).unwrap_or(&default_a);
            let tb = tokens_b.get(j).unwrap_or(&default_b);
            match compare_tokens(ta, tb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
    }
    Ordering::Equal
}
