//! HTML rendering for the heroes gallery.

use crate::db::HistoricalFigure;
use crate::image_search::is_usable_picture_url;
use std::fmt::Write;

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_card(out: &mut String, figure: &HistoricalFigure) {
    let name = escape_html(&figure.name);
    let _ = writeln!(out, "    <article class=\"hero\">");
    let _ = writeln!(
        out,
        "      <h2><a href=\"/chat?name={}\">{name}</a></h2>",
        urlencoding::encode(&figure.name)
    );

    if let Some(url) = figure
        .picture_url
        .as_deref()
        .filter(|url| is_usable_picture_url(url))
    {
        let _ = writeln!(
            out,
            "      <img src=\"{}\" alt=\"{name}\" loading=\"lazy\">",
            escape_html(url)
        );
    }

    match figure.description.as_deref() {
        Some(description) => {
            let _ = writeln!(out, "      <p>{}</p>", escape_html(description));
        }
        None => {
            let _ = writeln!(out, "      <p class=\"empty\">No description yet.</p>");
        }
    }

    let _ = writeln!(out, "    </article>");
}

/// Full page listing every figure.
pub fn render_heroes_page(figures: &[HistoricalFigure]) -> String {
    let mut out = String::new();
    out.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  \
         <title>Historical Heroes</title>\n  <link rel=\"stylesheet\" href=\"/static/style.css\">\n\
         </head>\n<body>\n  <h1>Historical Heroes</h1>\n  <main class=\"heroes\">\n",
    );

    if figures.is_empty() {
        out.push_str("    <p class=\"empty\">No heroes stored yet.</p>\n");
    }
    for figure in figures {
        render_card(&mut out, figure);
    }

    out.push_str("  </main>\n</body>\n</html>\n");
    out
}
