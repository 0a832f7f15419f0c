//! Server-rendered pages for `/qr` and `/logs`.

use super::handlers::{LevelFilter, LogSelection};
use crate::logging::LogLevel;
use crate::status::ConnectionStatus;
use std::fmt::Write as _;

/// Escape text for HTML element and attribute content.
pub(super) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

const CARD_STYLE: &str = "text-align:center;background:white;padding:30px;border-radius:10px;box-shadow:0 4px 6px rgba(0,0,0,0.1);";
const PAGE_STYLE: &str = "display:flex;justify-content:center;align-items:center;height:100vh;background:#f0f0f0;font-family:sans-serif;";

pub(super) fn qr_page(status: &ConnectionStatus) -> String {
    match status.qr_code.as_deref() {
        Some(url) => format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>WhatsApp QR Code</title></head>
<body style="{PAGE_STYLE}">
  <div style="{CARD_STYLE}">
    <h2>📱 Scan the QR code</h2>
    <p>Open WhatsApp → Linked devices → Link a device</p>
    <img src="{src}" style="max-width:400px;margin:20px 0;"/>
    <p style="color:#666;">Refresh the page if the QR code expires</p>
  </div>
</body>
</html>"#,
            src = escape_html(url),
        ),
        None => {
            let (icon, text) = if status.connected {
                ("✅", "Connected and running!")
            } else {
                ("⏳", "Waiting for connection...")
            };
            format!(
                r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>WhatsApp Status</title>
  <meta http-equiv="refresh" content="5">
</head>
<body style="{PAGE_STYLE}">
  <div style="{CARD_STYLE}">
    <h2>{icon} WhatsApp Status</h2>
    <p>{text}</p>
    <p style="color:#666;">This page refreshes automatically</p>
  </div>
</body>
</html>"#
            )
        }
    }
}

const LOGS_STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Courier New', monospace; background: #1e1e1e; color: #d4d4d4; padding: 20px; }
.header { background: #252526; padding: 20px; border-radius: 8px; margin-bottom: 20px; display: flex; justify-content: space-between; align-items: center; }
.header h1 { color: #fff; font-size: 24px; }
.filters { display: flex; gap: 10px; }
.filters a { padding: 8px 15px; background: #0e639c; color: white; text-decoration: none; border-radius: 4px; font-size: 14px; }
.filters a:hover { background: #1177bb; }
.filters a.active { background: #16825d; }
.log-container { background: #252526; padding: 20px; border-radius: 8px; max-height: 80vh; overflow-y: auto; }
.log-entry { padding: 8px 0; border-bottom: 1px solid #3e3e42; font-size: 13px; line-height: 1.6; }
.log-entry:last-child { border-bottom: none; }
.timestamp { color: #858585; margin-right: 10px; }
.level { display: inline-block; padding: 2px 8px; border-radius: 3px; font-weight: bold; margin-right: 10px; font-size: 11px; }
.level.INFO { background: #0e639c; color: white; }
.level.WARN { background: #d19a66; color: #1e1e1e; }
.level.ERROR { background: #e06c75; color: white; }
.auto-refresh { color: #858585; font-size: 12px; margin-top: 10px; }
.stats { display: flex; gap: 20px; margin-bottom: 10px; font-size: 14px; }
.stat { color: #858585; }
.stat strong { color: #fff; }
"#;

/// Quick-filter links as (href, label, active).
fn filter_links(selection: &LogSelection) -> Vec<(&'static str, &'static str, bool)> {
    let unfiltered = selection.level == LevelFilter::All;
    vec![
        ("/logs?limit=50", "Last 50", unfiltered && selection.limit == 50),
        ("/logs?limit=100", "Last 100", unfiltered && selection.limit == 100),
        ("/logs?limit=500", "Last 500", unfiltered && selection.limit == 500),
        (
            "/logs?level=ERROR&limit=100",
            "Errors only",
            selection.level == LevelFilter::Only(LogLevel::Error),
        ),
        (
            "/logs?level=WARN&limit=100",
            "Warnings only",
            selection.level == LevelFilter::Only(LogLevel::Warn),
        ),
    ]
}

pub(super) fn logs_page(selection: &LogSelection) -> String {
    let mut filters = String::new();
    for (href, label, active) in filter_links(selection) {
        let class = if active { r#" class="active""# } else { "" };
        let _ = writeln!(
            filters,
            r#"      <a href="{}"{}>{}</a>"#,
            escape_html(href),
            class,
            label
        );
    }

    let mut entries = String::new();
    for entry in &selection.entries {
        let local = entry.timestamp.with_timezone(&chrono::Local);
        let _ = writeln!(
            entries,
            r#"    <div class="log-entry">
      <span class="timestamp">{}</span>
      <span class="level {level}">{level}</span>
      <span class="message">{}</span>
    </div>"#,
            local.format("%d/%m/%Y %H:%M:%S"),
            escape_html(&entry.message),
            level = entry.level,
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Logs - WhatsApp Captador</title>
  <meta http-equiv="refresh" content="10">
  <style>{LOGS_STYLE}</style>
</head>
<body>
  <div class="header">
    <div>
      <h1>📊 Live Logs</h1>
      <div class="stats">
        <span class="stat">Total: <strong>{total}</strong></span>
        <span class="stat">Showing: <strong>{showing}</strong></span>
      </div>
    </div>
    <div class="filters">
{filters}    </div>
  </div>
  <div class="log-container">
{entries}  </div>
  <p class="auto-refresh">🔄 This page refreshes every 10 seconds</p>
</body>
</html>"#,
        total = selection.total,
        showing = selection.entries.len(),
    )
}
