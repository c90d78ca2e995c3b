//! HTML document generation from a template.

/// Inject stylesheet links before `</head>` and scripts before `</body>`.
///
/// `runtime_manifest` is published as `__tessel_manifest` ahead of the entry
/// scripts. Templates without a head or body get the tags prepended or
/// appended instead.
pub fn inject(template: &str, styles: &[String], scripts: &[String], runtime_manifest: &str) -> String {
    let mut head = String::new();
    for href in styles {
        head.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_attr(href)));
    }

    let mut body = format!(
        "<script>window.__tessel_manifest = {};</script>\n",
        // A literal `</script>` inside the JSON would end the tag early.
        runtime_manifest.replace("</", "<\\/")
    );
    for src in scripts {
        body.push_str(&format!("<script src=\"{}\"></script>\n", escape_attr(src)));
    }

    let with_head = match find_tag(template, "</head>") {
        Some(at) => format!("{}{}{}", &template[..at], head, &template[at..]),
        None => format!("{}{}", head, template),
    };

    match find_tag(&with_head, "</body>") {
        Some(at) => format!("{}{}{}", &with_head[..at], body, &with_head[at..]),
        None => format!("{}{}", with_head, body),
    }
}

/// Byte offset of the last case-insensitive occurrence of `tag`.
fn find_tag(html: &str, tag: &str) -> Option<usize> {
    html.to_ascii_lowercase().rfind(tag)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
