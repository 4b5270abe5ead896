//! Email rendering of round notifications.

use rota_storage::OutboxMessage;

/// Rendered notification email.
pub struct NotificationEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl NotificationEmailContent {
    pub fn new(message: &OutboxMessage) -> Self {
        Self {
            subject: message.title.clone(),
            text: Self::text_template(&message.title, &message.body),
            html: Self::html_template(&escape_html(&message.title), &escape_html(&message.body)),
        }
    }

    fn text_template(title: &str, body: &str) -> String {
        format!(
            r#"{}

{}

You can answer or review this invite in the app.

--
Rota"#,
            title, body
        )
    }

    fn html_template(title: &str, body: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 24px; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #eee; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>{}</h1>
            <p>{}</p>
            <div class="footer">You can answer or review this invite in the app.</div>
        </div>
    </div>
</body>
</html>"#,
            title, body
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
