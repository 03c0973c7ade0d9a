//! Meme-y text transformations

use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

/// Discord markup such as `<@123>`, `<#456>` or `<:emoji:789>`.  Passed through untouched.
static DISCORD_MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\S*>").unwrap());

const CLAP: &str = "\u{1F44F}";

fn regional_indicator(c: char) -> Option<String> {
    match c {
        'a'..='z' => {
            // U+1F1E6 is REGIONAL INDICATOR SYMBOL LETTER A
            let offset = c as u32 - 'a' as u32;
            char::from_u32(0x1F1E6 + offset).map(String::from)
        }
        // Digit followed by COMBINING ENCLOSING KEYCAP
        '0'..='9' => Some(format!("{}\u{20E3}", c)),
        '!' => Some("\u{2757}".to_owned()),
        '?' => Some("\u{2753}".to_owned()),
        _ => None,
    }
}

fn regional_indicators_plain(text: &str, sep: &str) -> String {
    text.chars()
        .map(|c| {
            // Letters whose lowercase is several chars (such as `İ`) have no emoji
            let mut lower = c.to_lowercase();
            let emoji = match (lower.next(), lower.next()) {
                (Some(l), None) => regional_indicator(l),
                _ => None,
            };
            emoji.unwrap_or_else(|| c.to_string())
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Spell `text` out in regional indicator emojis.  `big` separates them with spaces so Discord
/// renders them at full size; otherwise a zero-width space keeps them from merging into flags.
pub fn regional_indicators(text: &str, big: bool) -> String {
    let sep = if big { " " } else { "\u{200B}" };

    let mut out = String::new();
    let mut last = 0;
    for markup in DISCORD_MARKUP.find_iter(text) {
        out.push_str(&regional_indicators_plain(&text[last..markup.start()], sep));
        out.push_str(markup.as_str());
        last = markup.end();
    }
    out.push_str(&regional_indicators_plain(&text[last..], sep));
    out
}

/// `hello world` -> `h e l l o . w o r l d`
pub fn space_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            word.chars()
                .map(String::from)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" . ")
}

/// The full upper-cased text, followed by every proper suffix of it, longest first.
pub fn crossword(text: &str) -> Vec<String> {
    let text = text.to_uppercase();
    let mut lines = vec![text.clone()];
    lines.extend(
        text.char_indices()
            .skip(1)
            .map(|(i, _)| text[i..].to_owned()),
    );
    lines
}

/// Group words into lines of one to three, then drop the very last character onto a line of its
/// own.
pub fn kerrhau<R: Rng + ?Sized>(words: &[&str], rng: &mut R) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = words;
    while !rest.is_empty() {
        let take = rng.gen_range(1..=3).min(rest.len());
        let (group, tail) = rest.split_at(take);
        lines.push(group.join(" "));
        rest = tail;
    }

    if let Some(last_line) = lines.last_mut() {
        if let Some(last_char) = last_line.pop() {
            lines.push(last_char.to_string());
        }
    }
    lines
}

/// `you are great` -> `YOU 👏 ARE 👏 GREAT`
pub fn clap(text: &str) -> String {
    text.to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&format!(" {} ", CLAP))
}

/// `you are great` -> `👏 YOU👏 ARE👏 GREAT 👏`
pub fn clap2(text: &str) -> String {
    let mut out: String = text
        .to_uppercase()
        .split_whitespace()
        .map(|word| format!("{} {}", CLAP, word))
        .collect();
    out.push(' ');
    out.push_str(CLAP);
    out
}

/// Last two digits match, e.g. `1233` or `100`.
pub fn is_dubs(n: u64) -> bool {
    (n % 100) % 11 == 0
}
