use std::fmt::Write;

use htmlescape::encode_minimal;
use http::StatusCode;
use time::macros::format_description;

use super::reply::DavReply;
use super::DavRequest;
use crate::store::Entity;
use crate::util::systemtime_to_offsetdatetime;
use crate::DavResult;

const DEFAULT_STYLE: &str = r#"
table {
  border-collapse: separate;
  border-spacing: 1.5em 0.25em;
}
h1 {
  padding-left: 0.3em;
}
.mono {
  font-family: monospace;
}
"#;

impl crate::DavHandler {
    pub(crate) async fn handle_get(&self, dreq: &DavRequest) -> DavResult<DavReply> {
        let path = &dreq.path;
        let entity = match self.entity_opt(path).await? {
            Some(e) => e,
            None => return Ok(StatusCode::NOT_FOUND.into()),
        };

        if entity.is_collection() {
            if !self.config.autoindex {
                debug!("no index for collection {}", path);
                return Ok(StatusCode::FORBIDDEN.into());
            }
            let html = self.index(&entity).await?;
            return Ok(DavReply::Listing { entity, html });
        }

        let content_type = mime_guess::from_path(path.name())
            .first_or_octet_stream()
            .to_string();
        let stream = self.store().content(path).await?;
        Ok(DavReply::Content {
            entity,
            content_type,
            stream,
        })
    }

    // HTML listing of a collection.
    async fn index(&self, dir: &Entity) -> DavResult<String> {
        let prefix = self.prefix();
        let mut entries = Vec::new();
        for child in self.store().list(&dir.path).await? {
            entries.push(self.store().entity(&child).await?);
        }
        // collections first, then by name.
        entries.sort_by(|a, b| {
            b.is_collection()
                .cmp(&a.is_collection())
                .then_with(|| a.name().cmp(b.name()))
        });

        let title = encode_minimal(&dir.path.with_prefix(prefix, true));
        let style = match self.config.listing_css {
            Some(ref css) => format!(
                "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\">",
                encode_minimal(css)
            ),
            None => format!("<style>{}</style>", DEFAULT_STYLE),
        };

        let mut w = String::new();
        // writing to a String never fails.
        let _ = write!(
            w,
            "<!DOCTYPE html>\n<html><head>\n<title>Index of {}</title>\n{}\n</head>\n<body>\n",
            title, style
        );
        let _ = write!(w, "<h1>Index of {}</h1>\n<table>\n", title);
        let _ = writeln!(
            w,
            "<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>"
        );
        if !dir.path.is_root() {
            let parent = dir.path.parent().with_prefix(prefix, true);
            let _ = writeln!(
                w,
                "<tr><td><a href=\"{}\">Parent Directory</a></td><td>&nbsp;</td><td class=\"mono\" align=\"right\">[DIR]</td></tr>",
                encode_minimal(&parent)
            );
        }

        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
        for e in &entries {
            let href = e.path.with_prefix(prefix, e.is_collection());
            let mut name = encode_minimal(e.name());
            let size = if e.is_collection() {
                name.push('/');
                "[DIR]".to_string()
            } else {
                e.size.to_string()
            };
            let modified = systemtime_to_offsetdatetime(e.last_modified)
                .format(fmt)
                .unwrap_or_default();
            let _ = writeln!(
                w,
                "<tr><td><a href=\"{}\">{}</a></td><td class=\"mono\">{}</td><td class=\"mono\" align=\"right\">{}</td></tr>",
                encode_minimal(&href),
                name,
                modified,
                size
            );
        }
        let _ = write!(w, "</table>\n</body>\n</html>\n");
        Ok(w)
    }
}
