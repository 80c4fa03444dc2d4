//! Parses the action protocol the model is prompted to speak: free text
//! optionally carrying `SEARCH_ACTION:` / `SAVE_LEAD:` sentinel directives.
//! Detection is separated from text mutation: parsing yields tagged
//! directives plus the user-visible preamble.

use std::sync::OnceLock;

use regex::Regex;

pub const SEARCH_SENTINEL: &str = "SEARCH_ACTION";
pub const LEAD_SENTINEL: &str = "SAVE_LEAD";

/// Tokens that mean "same query, next page" rather than a topic change.
pub const CONTINUATION_TOKENS: &[&str] = &["MORE", "עוד", "נוספים"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Free-text catalog search.
    Search(String),
    /// Lead capture; carries the raw phone text as emitted by the model.
    SaveLead(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedReply {
    /// Descriptive text preceding any directive; may be empty.
    pub preamble: String,
    pub directives: Vec<Directive>,
}

impl ParsedReply {
    pub fn search_query(&self) -> Option<&str> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::Search(query) => Some(query.as_str()),
            _ => None,
        })
    }

    pub fn lead_phone(&self) -> Option<&str> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::SaveLead(phone) => Some(phone.as_str()),
            _ => None,
        })
    }
}

fn markup_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("hard-coded pattern"))
}

fn lead_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)SAVE_LEAD:?\s*([\d\-\s]+)").expect("hard-coded pattern"))
}

fn search_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"SEARCH_ACTION:\s*(.+)").expect("hard-coded pattern"))
}

/// Remove every markup tag from `text`.
pub fn strip_markup(text: &str) -> String {
    markup_tag_pattern().replace_all(text, "").into_owned()
}

/// Clean a raw query for resolution: drop anything from the first markup
/// bracket on, strip quote and dot characters, trim.
pub fn clean_query(raw: &str) -> String {
    let before_markup = raw.split('<').next().unwrap_or(raw);
    before_markup.replace(['`', '\'', '"', '.'], "").trim().to_string()
}

/// True when the query asks to continue the previous search instead of
/// starting a new one.
pub fn is_continuation(query: &str) -> bool {
    let upper = query.to_uppercase();
    CONTINUATION_TOKENS.iter().any(|token| upper.contains(token))
}

/// Parse raw model output into directives plus the user-visible preamble.
///
/// A reply containing markup tags but no search sentinel is a protocol
/// violation: the model tried to render results itself instead of delegating.
/// Recovery forces a search directive from `fallback_query` (the user's raw
/// message) and discards the model's text entirely, so raw markup never
/// reaches the user-visible channel.
pub fn parse_reply(raw: &str, fallback_query: &str) -> ParsedReply {
    if (raw.contains("<div") || raw.contains("<img")) && !raw.contains(SEARCH_SENTINEL) {
        return ParsedReply {
            preamble: String::new(),
            directives: vec![Directive::Search(clean_query(fallback_query))],
        };
    }

    let mut text = raw.replace("```html", "").replace("```", "").trim().to_string();
    let mut directives = Vec::new();

    if let Some(captures) = lead_pattern().captures(&text) {
        let phone = captures
            .get(1)
            .map(|digits| digits.as_str().trim().to_string())
            .unwrap_or_default();
        let matched = captures
            .get(0)
            .map(|whole| whole.as_str().to_string())
            .unwrap_or_default();
        text = text.replace(&matched, "").replace("SAVE_LEAD:", "").trim().to_string();
        directives.push(Directive::SaveLead(phone));
    }

    let preamble = match search_pattern().captures(&text) {
        Some(captures) => {
            let raw_query = captures.get(1).map(|q| q.as_str()).unwrap_or_default();
            // The query is the remainder of the sentinel line only.
            let first_line = raw_query.lines().next().unwrap_or_default();
            directives.push(Directive::Search(clean_query(first_line)));
            text.split(SEARCH_SENTINEL).next().unwrap_or_default().trim().to_string()
        }
        None => text,
    };

    ParsedReply { preamble, directives }
}
