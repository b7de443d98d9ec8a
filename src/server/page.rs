//! HTML rendering for the upload page.

use std::fmt::Write;

use crate::images::ProcessingResult;

const STYLE: &str = "body{font-family:sans-serif;max-width:1100px;margin:2rem auto;padding:0 1rem}\
.images{display:flex;gap:1.5rem;flex-wrap:wrap}\
figure{margin:0;flex:1 1 45%}\
figure img{max-width:100%;border:1px solid #ccc}\
.error{color:#b00020;border:1px solid #b00020;padding:.75rem;border-radius:4px}";

/// Render the upload page.
///
/// `result` is the outcome of a processed upload, `form_error` a rejection
/// from the form layer. Both absent renders the empty form.
pub fn render(result: Option<&ProcessingResult>, form_error: Option<&str>) -> String {
    let mut html = String::with_capacity(2048);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Image Upscaler</title>\n");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    html.push_str("</head>\n<body>\n<h1>Image Upscaler</h1>\n");

    html.push_str(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"image/*\" required>\n\
         <button type=\"submit\">Upscale</button>\n</form>\n",
    );

    if let Some(message) = form_error {
        let _ = writeln!(
            html,
            "<p class=\"error\" id=\"form-error\">{}</p>",
            escape(message)
        );
    }

    if let Some(result) = result {
        render_result(&mut html, result);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_result(html: &mut String, result: &ProcessingResult) {
    if let Some(ref error) = result.error {
        let _ = writeln!(html, "<p class=\"error\" id=\"error\">{}</p>", escape(error));
    }

    if result.original.is_none() && result.upscaled.is_none() {
        return;
    }

    html.push_str("<div class=\"images\">\n");
    if let Some(ref url) = result.original {
        render_figure(
            html,
            "original",
            "Original",
            url,
            result.original_width,
            result.original_height,
        );
    }
    if let Some(ref url) = result.upscaled {
        render_figure(
            html,
            "upscaled",
            "Upscaled",
            url,
            result.upscaled_width,
            result.upscaled_height,
        );
    }
    html.push_str("</div>\n");
}

fn render_figure(
    html: &mut String,
    id: &str,
    label: &str,
    url: &str,
    width: Option<u32>,
    height: Option<u32>,
) {
    let url = escape(url);
    let _ = writeln!(html, "<figure id=\"{id}\">");
    let _ = writeln!(html, "<img src=\"{url}\" alt=\"{label} image\">");
    let size = match (width, height) {
        (Some(w), Some(h)) => format!(" ({w} &times; {h})"),
        _ => String::new(),
    };
    let _ = writeln!(
        html,
        "<figcaption>{label}{size} <a href=\"{url}\" download>Download</a></figcaption>"
    );
    html.push_str("</figure>\n");
}

/// Escape text for use in HTML content and double-quoted attributes.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_form() {
        let html = render(None, None);
        assert!(html.contains("name=\"image\""));
        assert!(html.contains("multipart/form-data"));
        assert!(!html.contains("class=\"error\""));
        assert!(!html.contains("<figure"));
    }

    #[test]
    fn test_success_page() {
        let result = ProcessingResult {
            original: Some("/media/a.png".into()),
            upscaled: Some("/media/upscaled_a.png".into()),
            original_width: Some(10),
            original_height: Some(20),
            upscaled_width: Some(40),
            upscaled_height: Some(80),
            error: None,
        };
        let html = render(Some(&result), None);
        assert!(html.contains("src=\"/media/a.png\""));
        assert!(html.contains("src=\"/media/upscaled_a.png\""));
        assert!(html.contains("(10 &times; 20)"));
        assert!(html.contains("(40 &times; 80)"));
    }

    #[test]
    fn test_missing_dimensions_omitted() {
        let result = ProcessingResult {
            original: Some("/media/a.png".into()),
            upscaled: Some("/media/upscaled_a.png".into()),
            ..ProcessingResult::default()
        };
        let html = render(Some(&result), None);
        assert!(!html.contains("&times;"));
    }

    #[test]
    fn test_error_is_escaped() {
        let result = ProcessingResult {
            error: Some("<script>alert(1)</script>".into()),
            ..ProcessingResult::default()
        };
        let html = render(Some(&result), None);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<figure"));
    }

    #[test]
    fn test_form_error() {
        let html = render(None, Some("No image was uploaded"));
        assert!(html.contains("id=\"form-error\""));
        assert!(html.contains("No image was uploaded"));
    }
}
