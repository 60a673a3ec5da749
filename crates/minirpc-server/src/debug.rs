//! Debug page listing registered services and call counts.

use std::fmt::Write;

use crate::service::Service;
use std::sync::Arc;

/// Renders the debug page for `services`.
pub fn render(services: &[Arc<Service>]) -> String {
    let mut html = String::from("<html>\n<body>\n<title>MiniRPC Services</title>\n");
    for service in services {
        let _ = write!(
            html,
            "<hr>\nService {}\n<hr>\n<table>\n<th align=center>Method</th><th align=center>Calls</th>\n",
            escape(service.name())
        );
        for method in service.methods() {
            let _ = writeln!(
                html,
                "<tr>\n<td align=left font=fixed>{}({}, {}) error</td>\n<td align=center>{}</td>\n</tr>",
                escape(method.name()),
                escape(method.arg_type()),
                escape(method.reply_type()),
                method.num_calls()
            );
        }
        html.push_str("</table>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Foo;

    #[test]
    fn test_render_lists_methods_and_counts() {
        let service = Service::builder("Foo", Foo)
            .method("Sum", |_: &Foo, args: Vec<i32>, reply: &mut i32| {
                *reply = args.iter().sum();
                Ok::<(), String>(())
            })
            .build()
            .unwrap();

        let html = render(&[Arc::new(service)]);
        assert!(html.contains("Service Foo"));
        assert!(html.contains("Sum(alloc::vec::Vec&lt;i32&gt;, i32) error"));
        assert!(html.contains("<td align=center>0</td>"));
    }

    #[test]
    fn test_render_empty() {
        let html = render(&[]);
        assert!(html.contains("<title>MiniRPC Services</title>"));
        assert!(!html.contains("Service "));
    }
}
