//! HTML pages of the web app.
use std::fmt::Write;

use axum::response::Html;

use crate::{
    report::rows,
    session::Flash,
    store::Measurement,
};

/// Escape text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, flashes: &[Flash], content: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
nav a {{ margin-right: 1em; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #444; padding: 0.3em 0.8em; }}
th {{ background: #888; color: #f5f5f5; }}
.flash {{ padding: 0.5em; margin: 0.5em 0; }}
.flash.success {{ background: #d4edda; }}
.flash.error {{ background: #f8d7da; }}
.flash.warning {{ background: #fff3cd; }}
</style>
</head>
<body>
<nav>
<a href="/">Home</a>
<a href="/face_detection">Face distance</a>
<a href="/body_detection">Body measurement</a>
<a href="/measurements">Measurements</a>
<a href="/email_form">E-mail results</a>
</nav>
{flashes}
<h1>{title}</h1>
{content}
</body>
</html>
"#,
        title = escape(title),
        flashes = render_flashes(flashes),
    ))
}

fn render_flashes(flashes: &[Flash]) -> String {
    let mut html = String::new();
    for flash in flashes {
        let _ = write!(
            html,
            r#"<div class="flash {}">{}"#,
            flash.category.as_str(),
            escape(&flash.message)
        );
        if let Some((href, label)) = &flash.link {
            let _ = write!(
                html,
                r#" <a href="{}" download>{}</a>"#,
                escape(href),
                escape(label)
            );
        }
        html.push_str("</div>\n");
    }
    html
}

fn measurement_table(measurement: &Measurement) -> String {
    let mut html = String::from("<table>\n<tr><th>Measurement</th><th>Value (cm)</th></tr>\n");
    for (label, value) in rows(measurement) {
        let _ = writeln!(html, "<tr><td>{label}</td><td>{value}</td></tr>");
    }
    let _ = writeln!(
        html,
        "</table>\n<p>Measured on: {}</p>",
        escape(&measurement.timestamp)
    );
    html
}

pub fn index(flashes: &[Flash]) -> Html<String> {
    layout(
        "Body Measurement System",
        flashes,
        r#"<p>Stand in front of the camera. First check your distance, then start the body measurement.</p>
<p><a href="/face_detection">Start with the distance check</a></p>"#,
    )
}

pub fn face_detection(flashes: &[Flash]) -> Html<String> {
    layout(
        "Distance Check",
        flashes,
        r#"<p>Move until the distance is shown as perfect.</p>
<img src="/video_feed_face" alt="Face distance stream">
<p><a href="/switch_to_body">Continue to body measurement</a></p>"#,
    )
}

pub fn body_detection(flashes: &[Flash], last: Option<&Measurement>) -> Html<String> {
    let mut content = String::from(
        r#"<p>Stand still until the countdown has finished.</p>
<img src="/video_feed_body" alt="Body measurement stream">
<p><a href="/switch_to_face">Back to the distance check</a></p>
"#,
    );
    if let Some(measurement) = last {
        content.push_str("<h2>Last measurement</h2>\n");
        content.push_str(&measurement_table(measurement));
    }
    layout("Body Measurement", flashes, &content)
}

pub fn measurements(
    flashes: &[Flash],
    all: &[Measurement],
    latest: Option<&Measurement>,
) -> Html<String> {
    let mut content = String::new();
    if let Some(measurement) = latest {
        content.push_str("<h2>Latest</h2>\n");
        content.push_str(&measurement_table(measurement));
    }

    content.push_str("<h2>History</h2>\n");
    if all.is_empty() {
        content.push_str("<p>No measurements yet.</p>\n");
    } else {
        content.push_str(
            "<table>\n<tr><th>ID</th><th>Timestamp</th><th>Height</th><th>Shoulder Width</th>\
             <th>Chest Circumference</th><th>Waist Circumference</th></tr>\n",
        );
        for m in all {
            let _ = writeln!(
                content,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                m.id,
                escape(&m.timestamp),
                m.height,
                m.shoulder_width,
                m.chest_circumference,
                m.waist_circumference
            );
        }
        content.push_str("</table>\n");
    }
    content.push_str(r#"<p><a href="/api/measurements.csv">Download CSV</a></p>"#);

    layout("Measurements", flashes, &content)
}

pub fn email_form(flashes: &[Flash], latest: &Measurement) -> Html<String> {
    let content = format!(
        r#"{table}
<form method="post" action="/send_measurements">
<p><label>Name <input type="text" name="name" placeholder="User"></label></p>
<p><label>E-mail <input type="email" name="email" required></label></p>
<p><button type="submit">Send results</button></p>
</form>"#,
        table = measurement_table(latest),
    );
    layout("E-mail Results", flashes, &content)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn markup_is_escaped() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn flashes_render_with_links() {
        let flashes = [
            Flash::warning("Email could not be sent: <timeout>")
                .with_link("/static/downloads/m.pdf", "Click here to download your PDF"),
        ];
        let Html(page) = index(&flashes);

        assert!(page.contains(r#"<div class="flash warning">Email could not be sent: &lt;timeout&gt;"#));
        assert!(page.contains(r#"<a href="/static/downloads/m.pdf" download>"#));
    }

    #[test]
    fn body_page_shows_last_measurement() {
        let last = Measurement {
            id: 1,
            timestamp: "2024-05-01 10:00:00".into(),
            height: 172.0,
            shoulder_width: 44.5,
            chest_circumference: 53.4,
            waist_circumference: 61.2,
        };
        let Html(page) = body_detection(&[], Some(&last));
        assert!(page.contains("<tr><td>Height</td><td>172</td></tr>"));
        assert!(page.contains("/video_feed_body"));

        let Html(page) = body_detection(&[], None);
        assert!(!page.contains("Last measurement"));
    }
}
