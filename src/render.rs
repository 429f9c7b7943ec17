//! Compiles a template's blocks plus substitution values into one HTML document.
//!
//! Substituted values are inserted verbatim: nothing is HTML-escaped, so a
//! value can carry markup into the output. Callers that render untrusted
//! values must escape them first.

use std::collections::HashMap;

use crate::templates::model::{text_of, Block, BlockBody, Template};

pub type Values = HashMap<String, String>;

/// Replaces each `{{key}}` whose key is in `values`; unknown placeholders stay literal.
///
/// Keys are matched literally, so a key may contain any character including
/// `}`. When several keys match at one position the longest wins. One
/// left-to-right pass, so text coming from a value is never rescanned.
pub fn substitute(text: &str, values: &Values) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let hit = values
            .iter()
            .filter(|(key, _)| {
                tail.strip_prefix(key.as_str()).is_some_and(|after| after.starts_with("}}"))
            })
            .max_by_key(|(key, _)| key.len());
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 2..];
            }
            None => {
                // step one brace so "{{{key}}}" still matches the inner placeholder
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn opt(field: &Option<String>, values: &Values) -> String {
    field
        .as_deref()
        .map(|s| substitute(s, values))
        .unwrap_or_default()
}

pub fn render_block(block: &Block, values: &Values) -> String {
    match &block.body {
        BlockBody::Heading(text) => {
            format!(r#"<h2 class="text-2xl">{}</h2>"#, substitute(text, values))
        }
        BlockBody::Paragraph(text) => format!("<p>{}</p>", substitute(text, values)),
        BlockBody::MemberCard(card) => format!(
            r#"<div class="bg-gray-50 p-5 rounded-lg">
  <div class="flex items-center gap-4">
    <div class="w-12 h-12 bg-gray-200 rounded-full flex items-center justify-center">
      <span class="text-xl">{}</span>
    </div>
    <div>
      <h3 class="font-medium">{}</h3>
      <p class="text-sm text-gray-600">{}</p>
    </div>
  </div>
</div>"#,
            opt(&card.initials, values),
            opt(&card.name, values),
            opt(&card.status, values),
        ),
        BlockBody::Button(text) => format!(
            r#"<button class="px-6 py-3 rounded-md text-white">{}</button>"#,
            substitute(text, values)
        ),
        BlockBody::Image(img) => {
            let style = block
                .style
                .get("width")
                .map(|w| format!(r#" style="width: {w};""#))
                .unwrap_or_default();
            format!(
                r#"<img src="{}" alt="{}" class="max-w-full h-auto rounded"{} />"#,
                opt(&img.url, values),
                opt(&img.alt, values),
                style
            )
        }
        BlockBody::Other { content, .. } => {
            tracing::debug!(kind = block.kind(), "unknown block type rendered as text");
            format!("<p>{}</p>", substitute(&text_of(content), values))
        }
    }
}

const BASE_STYLE: &str = "    body {
      font-family: Arial, sans-serif;
      line-height: 1.6;
      margin: 0;
      padding: 20px;
    }";

/// Same template and values always give byte-identical output.
pub fn render_document(template: &Template, values: &Values) -> String {
    let body = template
        .blocks
        .iter()
        .map(|b| render_block(b, values))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com"></script>
  <style>
{BASE_STYLE}
  </style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = template.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::model::{parse_blocks, RawBlock};
    use serde_json::json;
    use uuid::Uuid;

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn template(name: &str, blocks: serde_json::Value) -> Template {
        let raw: Vec<RawBlock> = serde_json::from_value(blocks).unwrap();
        Template::new(Uuid::new_v4(), name.into(), parse_blocks(raw).unwrap(), false)
    }

    #[test]
    fn substitutes_every_occurrence() {
        let v = values(&[("name", "Sam")]);
        assert_eq!(substitute("{{name}} and {{name}}", &v), "Sam and Sam");
    }

    #[test]
    fn missing_keys_stay_literal() {
        assert_eq!(substitute("Hi {{name}}", &Values::new()), "Hi {{name}}");
        assert_eq!(substitute("open {{ only", &Values::new()), "open {{ only");
    }

    #[test]
    fn keys_are_matched_literally() {
        let v = values(&[("a.b", "x"), ("name", "Sam")]);
        assert_eq!(substitute("{{a.b}} {{aXb}} {{ name }}", &v), "x {{aXb}} {{ name }}");
        assert_eq!(substitute("{{{name}}}", &v), "{Sam}");
    }

    #[test]
    fn keys_may_contain_braces() {
        let v = values(&[("a}b", "x"), ("a", "short"), ("a}}b", "long")]);
        assert_eq!(substitute("{{a}b}}", &v), "x");
        assert_eq!(substitute("{{a}}b}}", &v), "long");
        assert_eq!(substitute("{{a}} {{a}b}}", &v), "short x");
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let v = values(&[("a", "{{b}}"), ("b", "nope")]);
        assert_eq!(substitute("{{a}}", &v), "{{b}}");
    }

    #[test]
    fn values_are_not_html_escaped() {
        let v = values(&[("name", "<script>alert(1)</script>")]);
        let t = template("T", json!([{"type": "paragraph", "content": "Hi {{name}}"}]));
        let html = render_document(&t, &v);
        assert!(html.contains("<p>Hi <script>alert(1)</script></p>"));
    }

    #[test]
    fn heading_round_trip() {
        let t = template("Greeting", json!([{"type": "heading", "content": "Hi {{name}}"}]));
        let html = render_document(&t, &values(&[("name", "Sam")]));
        assert_eq!(html.matches("Hi Sam").count(), 1);
        assert!(!html.contains("{{name}}"));
        assert!(html.contains(r#"<h2 class="text-2xl">Hi Sam</h2>"#));
        assert!(html.contains("<title>Greeting</title>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn member_card_degrades_missing_fields() {
        let t = template(
            "Card",
            json!([{"type": "member-card", "content": {"initials": "{{i}}", "status": "Active"}}]),
        );
        let html = render_document(&t, &values(&[("i", "SM")]));
        assert!(html.contains(r#"<span class="text-xl">SM</span>"#));
        assert!(html.contains(r#"<h3 class="font-medium"></h3>"#));
        assert!(html.contains(r#"<p class="text-sm text-gray-600">Active</p>"#));
    }

    #[test]
    fn image_width_is_optional() {
        let t = template(
            "Img",
            json!([
                {
                    "type": "image",
                    "content": {"url": "{{cdn}}/a.png", "alt": "logo"},
                    "style": {"width": "120px"}
                },
                {"type": "image", "content": {"url": "b.png", "alt": "{{alt}}"}}
            ]),
        );
        let html = render_document(&t, &values(&[("cdn", "https://cdn.test")]));
        let sized = concat!(
            r#"<img src="https://cdn.test/a.png" alt="logo" "#,
            r#"class="max-w-full h-auto rounded" style="width: 120px;" />"#,
        );
        assert!(html.contains(sized));
        assert!(html.contains(
            r#"<img src="b.png" alt="{{alt}}" class="max-w-full h-auto rounded" />"#
        ));
    }

    #[test]
    fn button_and_fallback() {
        let t = template(
            "Welcome",
            json!([
                {"type": "button", "content": "Join {{team}}"},
                {"type": "divider", "content": "-- {{team}} --"}
            ]),
        );
        let html = render_document(&t, &values(&[("team", "Acme")]));
        assert!(html.contains(
            r#"<button class="px-6 py-3 rounded-md text-white">Join Acme</button>"#
        ));
        assert!(html.contains("<p>-- Acme --</p>"));
    }

    #[test]
    fn fragments_keep_block_order_and_output_is_stable() {
        let t = template(
            "Order",
            json!([
                {"type": "paragraph", "content": "first {{x}}"},
                {"type": "heading", "content": "second {{y}}"}
            ]),
        );
        let v = values(&[("x", "1"), ("y", "2")]);
        let a = render_document(&t, &v);
        let b = render_document(&t, &v);
        assert_eq!(a, b);
        let first = a.find("first 1").unwrap();
        let second = a.find("second 2").unwrap();
        assert!(first < second);
    }
}
