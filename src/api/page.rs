//! HTML rendering for the index page

use crate::types::{Character, Event, Turn};
use std::fmt::Write;

const STYLE: &str = "\
body{font-family:Georgia,serif;max-width:60rem;margin:2rem auto;padding:0 1rem;background:#faf7f0;color:#222}\
h1{margin-bottom:0}.turn{color:#777;margin-top:.25rem}\
.event{margin:.4rem 0}.event .who{font-weight:bold}.event .t{color:#999;font-size:.85em}\
.reflection{border-left:3px solid #c9b37e;padding-left:.75rem;margin:.75rem 0}";

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Full index page. `events` must already be oldest first.
pub fn render_index(events: &[Event], characters: &[Character], turn: Turn) -> String {
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"10\">\
         <title>Chronicle</title><style>{}</style></head><body>\
         <h1>Chronicle</h1><p class=\"turn\">Turn {}</p>",
        STYLE, turn
    );

    html.push_str("<h2>Residents</h2>");
    for character in characters {
        let _ = write!(
            html,
            "<div class=\"reflection\"><span class=\"who\">{}</span> \
             <span class=\"t\">(updated turn {})</span><p>{}</p></div>",
            escape_html(&character.name),
            character.last_updated_turn,
            escape_html(&character.reflection)
        );
    }

    html.push_str("<h2>Events</h2>");
    if events.is_empty() {
        html.push_str("<p>The world has just begun.</p>");
    }
    for event in events {
        let _ = write!(
            html,
            "<div class=\"event\"><span class=\"t\">[{}]</span> \
             <span class=\"who\">{}</span>: {}</div>",
            event.turn,
            escape_html(&event.character),
            escape_html(&event.narration)
        );
    }

    html.push_str("</body></html>");
    html
}
