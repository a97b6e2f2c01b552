/// Rendered in place of an applet the host does not have installed.
pub fn not_installed_html(applet_name: &str) -> String {
    format!(
        concat!(
            "<div class=\"framelink-not-installed\" ",
            "style=\"display:flex;flex:1;align-items:center;justify-content:center;\">",
            "<p>The applet <b>{}</b> is not installed.</p>",
            "</div>"
        ),
        escape_html(applet_name)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
