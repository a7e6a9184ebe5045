//! Cleanup applied to every unit before it becomes part of a task's outputs.

/// Removes a surrounding markdown code fence, keeping the fenced body.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.trim_matches('`').trim(),
    };
    body.trim_end().trim_end_matches("```").trim()
}

pub fn looks_like_html(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('<') && (trimmed.contains("</") || trimmed.contains("/>"))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Plain text becomes paragraphs inside a single container element.
pub fn wrap_plain_text(text: &str) -> String {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let lines: Vec<String> = p.lines().map(|l| escape(l.trim())).collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect();
    format!("<div class=\"unit\">{}</div>", paragraphs.join(""))
}

pub fn render_unit(raw: &str) -> String {
    let body = strip_code_fences(raw);
    if looks_like_html(body) {
        body.to_string()
    } else {
        wrap_plain_text(body)
    }
}
