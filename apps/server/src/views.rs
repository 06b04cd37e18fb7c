// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTML building blocks shared by the pages: layout, escaping, badges.

use axum::response::Html;
use bimfm_core::{condition_color, condition_text, severity_color, severity_label, ConditionStatus, Severity, ValidationErrors};
use std::fmt::Write;

/// Navigation entries: `(href, label)`.
const NAV: [(&str, &str); 4] = [
    ("/", "Dashboard"),
    ("/viewer", "Visualizador 3D"),
    ("/assets", "Ativos"),
    ("/inspections", "Inspeções"),
];

const STYLE: &str = "\
body{margin:0;font-family:system-ui,sans-serif;background:#f5f6fa;color:#2c3e50}\
.navbar{display:flex;align-items:center;justify-content:space-between;background:#2c3e50;padding:0 24px}\
.navbar h1{color:#fff;font-size:20px}\
.navbar ul{list-style:none;display:flex;gap:16px;margin:0;padding:0}\
.navbar a{color:#bdc3c7;text-decoration:none;padding:8px 12px;border-radius:4px}\
.navbar a.active{background:#3498db;color:#fff}\
.main-content{padding:24px}\
.stats-grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(180px,1fr));gap:16px}\
.stat-card,.card{background:#fff;border-radius:8px;padding:16px;box-shadow:0 1px 3px rgba(0,0,0,.1)}\
.stat-value{font-size:32px;font-weight:bold}\
.badge{display:inline-block;color:#fff;border-radius:12px;padding:2px 10px;font-size:12px}\
.condition-bar{background:#ecf0f1;border-radius:4px;height:12px;width:100%}\
.condition-fill{height:12px;border-radius:4px}\
.field-error{color:#e74c3c;font-size:12px}\
.error{color:#e74c3c}\
.loading{color:#7f8c8d}";

/// Escape text for HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Whether the nav entry `href` is active on `path`.
///
/// Dashboard only matches `/` exactly; the others match by prefix.
pub fn is_active(href: &str, path: &str) -> bool {
    if href == "/" {
        path == "/"
    } else {
        path.starts_with(href)
    }
}

/// Full page with the navigation chrome. `body` must already be escaped.
pub fn layout(title: &str, path: &str, body: &str) -> Html<String> {
    let mut nav = String::new();
    for (href, label) in NAV {
        let class = if is_active(href, path) { " class=\"active\"" } else { "" };
        let _ = write!(nav, "<li><a href=\"{}\"{}>{}</a></li>", href, class, label);
    }
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} | BIM-FM Platform</title>\n<style>{}</style>\n</head>\n<body>\n\
         <nav class=\"navbar\"><div class=\"navbar-brand\"><h1>BIM-FM Platform</h1></div>\
         <ul class=\"navbar-nav\">{}</ul></nav>\n<main class=\"main-content\">\n{}\n</main>\n</body>\n</html>\n",
        escape(title),
        STYLE,
        nav,
        body
    ))
}

pub fn badge(text: &str, color: &str) -> String {
    format!(
        "<span class=\"badge\" style=\"background-color:{}\">{}</span>",
        color,
        escape(text)
    )
}

pub fn severity_badge(severity: Option<Severity>) -> String {
    badge(severity_label(severity), severity_color(severity))
}

pub fn condition_badge(status: Option<ConditionStatus>) -> String {
    badge(condition_text(status), condition_color(status))
}

pub fn loading(what: &str) -> String {
    format!("<div class=\"loading\">Carregando {}...</div>", escape(what))
}

/// Inline message under a form field, empty when the field is valid.
pub fn field_error(errors: Option<&ValidationErrors>, field: &str) -> String {
    errors
        .and_then(|errors| errors.field(field))
        .map(|error| format!("<div class=\"field-error\">{}</div>", escape(&error.message)))
        .unwrap_or_default()
}

/// `<option>` list; the entry whose value equals `selected` is preselected.
pub fn options(entries: impl IntoIterator<Item = (String, String)>, selected: &str) -> String {
    let mut html = String::new();
    for (value, label) in entries {
        let flag = if value == selected { " selected" } else { "" };
        let _ = write!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            escape(&value),
            flag,
            escape(&label)
        );
    }
    html
}
