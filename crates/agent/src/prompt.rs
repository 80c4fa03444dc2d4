//! Prompt assembly: the sales-assistant persona plus dynamic catalog context,
//! followed by a sanitized window of conversation history.

use serde::Deserialize;

use galleria_core::directive::strip_markup;
use galleria_core::search::concepts::IdentifierMap;
use galleria_catalog::CatalogSnapshot;

use crate::llm::ChatMessage;

/// One prior turn as the chat channel reports it.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryTurn {
    pub sender: String,
    pub content: String,
}

const PERSONA: &str = "\
אתה נציג מכירות בחנות אומנות לתמונות קיר. אתה חם, שירותי וקצר.

חוקים:
1. כשהלקוח מחפש מוצר, סגנון או נושא, ענה במשפט קצר ואז שורה חדשה עם:
SEARCH_ACTION: <מילות החיפוש>
2. כשהלקוח משאיר מספר טלפון או מבקש שיחזרו אליו, ענה ואז שורה חדשה עם:
SAVE_LEAD: <המספר>
3. אם הלקוח מבקש עוד תוצאות מאותו נושא, השתמש ב:
SEARCH_ACTION: MORE
4. לעולם אל תכתוב HTML או תמציא מוצרים. הצגת המוצרים נעשית עבורך.
5. ענה תמיד בעברית, בגובה העיניים, בלי הקדמות ארוכות.";

/// The persona plus what the catalog actually carries right now.
pub fn system_prompt(identifiers: &IdentifierMap, snapshot: &CatalogSnapshot) -> String {
    let mut prompt = String::from(PERSONA);

    let categories = identifiers.category_names();
    if !categories.is_empty() {
        prompt.push_str("\n\nקטגוריות בחנות: ");
        prompt.push_str(&categories.join(", "));
    }

    let tags = identifiers.tag_names();
    if !tags.is_empty() {
        prompt.push_str("\nתגיות בחנות: ");
        prompt.push_str(&tags.join(", "));
    }

    if !snapshot.best_seller_names.is_empty() {
        prompt.push_str("\nהנמכרים ביותר כרגע: ");
        prompt.push_str(&snapshot.best_seller_names.join(", "));
    }

    prompt
}

/// Full message list for one completion: system, then the last
/// `history_window` turns with markup stripped, then the current message.
pub fn build_messages(
    identifiers: &IdentifierMap,
    snapshot: &CatalogSnapshot,
    history: &[HistoryTurn],
    user_message: &str,
    history_window: usize,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt(identifiers, snapshot))];

    let start = history.len().saturating_sub(history_window);
    for turn in &history[start..] {
        let content = strip_markup(&turn.content);
        if content.trim().is_empty() {
            continue;
        }
        if turn.sender == "user" {
            messages.push(ChatMessage::user(content));
        } else {
            messages.push(ChatMessage::assistant(content));
        }
    }

    messages.push(ChatMessage::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use galleria_core::search::concepts::IdentifierMap;
    use galleria_catalog::CatalogSnapshot;

    use super::{build_messages, system_prompt, HistoryTurn};

    fn turn(sender: &str, content: &str) -> HistoryTurn {
        HistoryTurn { sender: sender.to_string(), content: content.to_string() }
    }

    fn identifiers() -> IdentifierMap {
        IdentifierMap::new(
            HashMap::from([("אנימה".to_string(), 17)]),
            HashMap::from([("נוער".to_string(), 3)]),
        )
    }

    #[test]
    fn system_prompt_carries_catalog_vocabulary_and_best_sellers() {
        let snapshot = CatalogSnapshot {
            best_seller_names: vec!["הדפס זכוכית דגם 7".to_string()],
            ..CatalogSnapshot::default()
        };

        let prompt = system_prompt(&identifiers(), &snapshot);

        assert!(prompt.contains("SEARCH_ACTION"));
        assert!(prompt.contains("אנימה"));
        assert!(prompt.contains("נוער"));
        assert!(prompt.contains("הדפס זכוכית דגם 7"));
    }

    #[test]
    fn history_window_keeps_only_the_most_recent_turns() {
        let history: Vec<HistoryTurn> =
            (0..6).map(|i| turn("user", &format!("הודעה {i}"))).collect();

        let messages =
            build_messages(&identifiers(), &CatalogSnapshot::default(), &history, "עכשיו", 3);

        // system + 3 history turns + the current message
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].content, "הודעה 3");
        assert_eq!(messages[4].content, "עכשיו");
    }

    #[test]
    fn history_markup_is_stripped_and_empty_turns_dropped() {
        let history = vec![
            turn("bot", "הנה:<br><div class='products-grid'><img src='x'></div>"),
            turn("bot", "<div></div>"),
            turn("user", "יפה"),
        ];

        let messages =
            build_messages(&identifiers(), &CatalogSnapshot::default(), &history, "עוד", 10);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content, "הנה:");
        assert_eq!(messages[2].content, "יפה");
    }

    #[test]
    fn non_user_senders_map_to_the_assistant_role() {
        let history = vec![turn("assistant", "שלום"), turn("user", "היי")];

        let messages =
            build_messages(&identifiers(), &CatalogSnapshot::default(), &history, "מה יש", 10);

        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
    }
}
