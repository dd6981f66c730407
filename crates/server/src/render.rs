//! HTML pages: the rendered report, the polling progress page, and plain
//! status pages for the HTML routes.
//!
//! Collaborator text reaches the report verbatim, so raw HTML in the Markdown
//! is emitted as escaped text and `javascript:` links are neutralised.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use orchestrator::CompletedAnalysis;
use pipeline::TaskId;

const STYLE: &str = r#"<style>
body { font-family: system-ui, sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; color: #1f2933; }
table { border-collapse: collapse; margin: 1rem 0; }
th, td { border: 1px solid #cbd2d9; padding: 0.4rem 0.8rem; text-align: left; }
th { background: #f0f4f8; }
h1 { border-bottom: 2px solid #3e4c59; padding-bottom: 0.3rem; }
.progress { background: #e4e7eb; border-radius: 4px; height: 1.2rem; overflow: hidden; }
.progress > div { background: #2186eb; height: 100%; width: 0; transition: width 0.4s; }
.muted { color: #7b8794; }
</style>"#;

/// Renders Markdown to an HTML fragment with raw HTML escaped.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn is_safe_url(url: &str) -> bool {
    let scheme = url
        .split_once(':')
        .map(|(scheme, _)| scheme.trim().to_ascii_lowercase());
    match scheme {
        None => true,
        Some(scheme) => {
            // A colon after a path or query separator is not a scheme.
            scheme.contains(['/', '?', '#'])
                || matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
    }
}

/// Escapes text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
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

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n{STYLE}\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    )
}

/// Full report document for a completed analysis.
pub fn report_page(analysis: &CompletedAnalysis) -> String {
    let body = format!(
        "<p class=\"muted\">Task {} &middot; {}</p>\n{}",
        analysis.task_id,
        escape(&analysis.parcel.address),
        markdown_to_html(&analysis.result.markdown_report)
    );
    page(&format!("Land Analysis Report: {}", analysis.parcel.address), &body)
}

/// Progress page that polls the status endpoint and opens the report once
/// the task completes.
pub fn loading_page(task_id: TaskId) -> String {
    let body = format!(
        r#"<h1>Analysing parcel</h1>
<p id="message">Analysis queued</p>
<div class="progress"><div id="bar"></div></div>
<p class="muted"><span id="percent">0</span>% &middot; task {task_id}</p>
<script>
(function () {{
  const id = "{task_id}";
  async function poll() {{
    try {{
      const res = await fetch("/api/status/" + id);
      if (!res.ok) {{
        document.getElementById("message").textContent = "Task not found";
        return;
      }}
      const s = await res.json();
      document.getElementById("bar").style.width = s.progress + "%";
      document.getElementById("percent").textContent = s.progress;
      document.getElementById("message").textContent = s.message;
      if (s.status === "completed") {{
        window.location.href = "/result/" + id;
        return;
      }}
      if (s.status === "failed") {{
        return;
      }}
    }} catch (e) {{}}
    setTimeout(poll, 2000);
  }}
  poll();
}})();
</script>"#
    );
    page("Analysing parcel", &body)
}

/// Minimal page for the non-report outcomes of the HTML routes.
pub fn message_page(heading: &str, detail: &str) -> String {
    page(
        heading,
        &format!("<h1>{}</h1>\n<p>{}</p>", escape(heading), escape(detail)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_and_headings_render() {
        let out = markdown_to_html("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<table>"));
        assert!(out.contains("<td>1</td>"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let out = markdown_to_html("<script>alert(1)</script>\n\ntext <b>bold</b>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn script_links_are_neutralised() {
        let out = markdown_to_html("[click](javascript:alert(1)) [ok](https://example.org)");
        assert!(!out.contains("javascript:"));
        assert!(out.contains("href=\"#\""));
        assert!(out.contains("href=\"https://example.org\""));
    }

    #[test]
    fn message_page_escapes_detail() {
        let out = message_page("Analysis failed", "<oops>");
        assert!(out.contains("&lt;oops&gt;"));
    }
}
