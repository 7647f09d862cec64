use leptos::{either::Either, prelude::*};

pub fn page_layout(title: &str, body_html: String) -> String {
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 16px; }}
table {{ width: 100%; border-collapse: collapse; }}
th {{ text-align: left; padding: 6px 8px; border-bottom: 1px solid #ccc; }}
td {{ padding: 6px 8px; border-bottom: 1px solid #eee; vertical-align: top; }}
pre {{ white-space: pre-wrap; word-break: break-word; }}
textarea {{ width: 100%; min-height: 80px; box-sizing: border-box; }}
.status-up {{ color: #1a7f37; font-weight: bold; }}
.status-down {{ color: #cf222e; font-weight: bold; }}
.message {{ border-bottom: 1px solid #eee; padding: 8px 0; }}
.message .role {{ color: #666; font-size: 0.85em; }}
.error {{ color: #cf222e; }}
.hidden {{ display: none; }}
</style>
</head>
<body>
{body_html}
</body>
</html>"#,
        title = title,
        body_html = body_html
    )
}

pub struct NavLink {
    pub label: String,
    pub href: String,
}

impl NavLink {
    pub fn new(label: impl ToString, href: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

/// Backend reachability as shown at the top of every page.
pub struct BackendBadge {
    pub available: bool,
    pub detail: Option<String>,
}

pub fn backend_badge(badge: &BackendBadge) -> AnyView {
    if badge.available {
        view! { <p>"Backend: "<span class="status-up">"running"</span></p> }.into_any()
    } else {
        let detail = badge
            .detail
            .clone()
            .unwrap_or_else(|| "not reachable".to_string());
        view! {
            <p>
                "Backend: "<span class="status-down">"not running"</span>
                " "<span class="error">{detail}</span>
            </p>
        }
        .into_any()
    }
}

pub struct Page<C: IntoView = ()> {
    pub title: String,
    pub heading: String,
    pub backend: Option<BackendBadge>,
    pub nav_links: Vec<NavLink>,
    pub content: C,
}

impl<C: IntoView> Page<C> {
    pub fn render(self) -> String {
        let Page {
            title,
            heading,
            backend,
            nav_links,
            content,
        } = self;

        let body = view! {
            <h1>{heading}</h1>

            {backend.map(|badge| backend_badge(&badge))}

            {if !nav_links.is_empty() {
                Either::Left(view! {
                    <p>
                        {nav_links.into_iter().enumerate().map(|(i, link)| {
                            let sep = if i > 0 { " | " } else { "" };
                            view! { {sep}<a href={link.href}>{link.label}</a> }
                        }).collect::<Vec<_>>()}
                    </p>
                })
            } else {
                Either::Right(())
            }}

            {content}
        };

        page_layout(&title, body.to_html())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(backend: Option<BackendBadge>) -> Page {
        Page {
            title: "Test".to_string(),
            heading: "Heading".to_string(),
            backend,
            nav_links: vec![],
            content: (),
        }
    }

    #[test]
    fn page_layout_wraps_body() {
        let result = page_layout("Test Title", "<p>body</p>".to_string());
        assert!(result.contains("<title>Test Title</title>"));
        assert!(result.contains("<p>body</p>"));
        assert!(result.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn page_layout_escapes_title() {
        let result = page_layout("<script>", "".to_string());
        assert!(result.contains("<title>&lt;script&gt;</title>"));
    }

    #[test]
    fn badge_running() {
        let html = backend_badge(&BackendBadge {
            available: true,
            detail: None,
        })
        .to_html();
        assert!(html.contains("status-up"));
        assert!(html.contains("running"));
    }

    #[test]
    fn badge_down_shows_escaped_detail() {
        let html = backend_badge(&BackendBadge {
            available: false,
            detail: Some("Cannot connect to <backend>".to_string()),
        })
        .to_html();
        assert!(html.contains("status-down"));
        assert!(html.contains("Cannot connect to &lt;backend&gt;"));
    }

    #[test]
    fn page_without_backend_or_links() {
        let html = page(None).render();
        assert!(html.contains("<h1>"));
        assert!(html.contains("Heading"));
        assert!(!html.contains("Backend:"));
        assert!(!html.contains(" | "));
    }

    #[test]
    fn page_with_links_and_content() {
        let html = Page {
            title: "Chat".to_string(),
            heading: "Chat".to_string(),
            backend: Some(BackendBadge {
                available: true,
                detail: None,
            }),
            nav_links: vec![NavLink::new("Models", "/"), NavLink::new("Chat", "/chat")],
            content: view! { <div id="messages"></div> },
        }
        .render();
        assert!(html.contains("Backend:"));
        assert!(html.contains(r#"<a href="/">"#));
        assert!(html.contains(" | "));
        assert!(html.contains(r#"id="messages""#));
    }
}
