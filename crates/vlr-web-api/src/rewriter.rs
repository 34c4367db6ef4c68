//! Text substitutions applied to the generated documentation page.
//!
//! Every pass is literal and conditional, so running the rewriter over its own
//! output changes nothing.

use std::fmt;

use crate::config::API_TITLE;

/// Favicon linked by the FastAPI flavoured Swagger UI page.
pub const FASTAPI_FAVICON_URL: &str = "https://fastapi.tiangolo.com/img/favicon.png";

/// Favicons linked by the stock Swagger UI distribution.
pub const SWAGGER_UI_FAVICONS: [&str; 2] = ["./favicon-32x32.png", "./favicon-16x16.png"];

const HEAD_CLOSE: &str = "</head>";

/// Inter/JetBrains Mono fonts plus a dark theme that follows the OS preference.
pub const DOCS_STYLE: &str = r#"<style id="vlr-docs-theme">
@import url('https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&family=JetBrains+Mono:wght@400;500&display=swap');
body { margin: 0; }
.swagger-ui, .swagger-ui .info .title, .swagger-ui .opblock-tag, .swagger-ui .btn { font-family: 'Inter', system-ui, sans-serif; }
.swagger-ui .microlight, .swagger-ui code, .swagger-ui pre { font-family: 'JetBrains Mono', ui-monospace, monospace !important; }
.swagger-ui .topbar { display: none; }
.swagger-ui .info .title small.version-stamp { background-color: #ff4655; }
@media (prefers-color-scheme: dark) {
  html, body { background: #0f1923; color: #ece8e1; }
  .swagger-ui { filter: none; color: #ece8e1; }
  .swagger-ui .scheme-container { background: #1b2733; box-shadow: none; }
  .swagger-ui .info .title, .swagger-ui .info p, .swagger-ui .info li, .swagger-ui .info a,
  .swagger-ui .opblock-tag, .swagger-ui .opblock .opblock-summary-description,
  .swagger-ui .opblock .opblock-summary-path, .swagger-ui .opblock .opblock-summary-operation-id,
  .swagger-ui .parameter__name, .swagger-ui .parameter__type, .swagger-ui .response-col_status,
  .swagger-ui .response-col_links, .swagger-ui .tab li, .swagger-ui table thead tr th,
  .swagger-ui .model-title, .swagger-ui .model, .swagger-ui section.models h4,
  .swagger-ui .opblock-description-wrapper p, .swagger-ui .responses-inner h4,
  .swagger-ui .responses-inner h5, .swagger-ui label { color: #ece8e1; }
  .swagger-ui .opblock .opblock-section-header { background: #1b2733; box-shadow: none; }
  .swagger-ui .opblock .opblock-section-header h4 { color: #ece8e1; }
  .swagger-ui .opblock-tag { border-bottom-color: #2b3945; }
  .swagger-ui section.models { border-color: #2b3945; }
  .swagger-ui section.models .model-container { background: #1b2733; }
  .swagger-ui input[type=text], .swagger-ui textarea, .swagger-ui select {
    background: #1b2733; color: #ece8e1; border-color: #2b3945;
  }
  .swagger-ui .btn { color: #ece8e1; border-color: #768079; }
  .swagger-ui .btn.execute { background-color: #ff4655; border-color: #ff4655; }
  .swagger-ui svg:not(:root) { fill: #ece8e1; }
  .swagger-ui .arrow, .swagger-ui .expand-operation svg { fill: #ece8e1; }
  .swagger-ui a.nostyle, .swagger-ui a.nostyle:visited { color: #ece8e1; }
}
</style>
"#;

/// What to find and what to put in its place.
#[derive(Debug, Clone)]
pub struct RewriteRules {
    pub favicon_sources: Vec<String>,
    pub favicon_target: String,
    pub title_replacements: Vec<(String, String)>,
    pub head_style: String,
}

impl RewriteRules {
    pub fn new(title: &str, favicon_path: &str) -> Self {
        let favicon_sources = std::iter::once(FASTAPI_FAVICON_URL)
            .chain(SWAGGER_UI_FAVICONS)
            .map(str::to_string)
            .collect();

        Self {
            favicon_sources,
            favicon_target: favicon_path.to_string(),
            title_replacements: vec![
                (format!("{} - Swagger UI", title), title.to_string()),
                (
                    "<title>Swagger UI</title>".to_string(),
                    format!("<title>{}</title>", title),
                ),
            ],
            head_style: DOCS_STYLE.to_string(),
        }
    }
}

impl Default for RewriteRules {
    fn default() -> Self {
        Self::new(API_TITLE, "/favicon.svg")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    Favicon { source: String },
    Title { from: String },
    HeadStyle,
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitution::Favicon { source } => write!(f, "replaced favicon '{}'", source),
            Substitution::Title { from } => write!(f, "replaced title '{}'", from),
            Substitution::HeadStyle => write!(f, "injected style block before </head>"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub html: String,
    pub substitutions: Vec<Substitution>,
}

impl Rewrite {
    pub fn is_unchanged(&self) -> bool {
        self.substitutions.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocsRewriter {
    rules: RewriteRules,
}

impl DocsRewriter {
    pub fn new(rules: RewriteRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RewriteRules {
        &self.rules
    }

    /// Favicon, then title, then style injection.
    pub fn rewrite(&self, html: &str) -> Rewrite {
        let mut html = html.to_string();
        let mut substitutions = Vec::new();

        for source in self.rules.favicon_sources.iter().filter(|s| !s.is_empty()) {
            if html.contains(source.as_str()) {
                html = html.replace(source.as_str(), &self.rules.favicon_target);
                substitutions.push(Substitution::Favicon {
                    source: source.clone(),
                });
            }
        }

        for (from, to) in &self.rules.title_replacements {
            if !from.is_empty() && html.contains(from.as_str()) {
                html = html.replace(from.as_str(), to);
                substitutions.push(Substitution::Title { from: from.clone() });
            }
        }

        let style = &self.rules.head_style;
        if !style.is_empty()
            && !html.contains(style.as_str())
            && let Some(at) = html.find(HEAD_CLOSE)
        {
            html.insert_str(at, style);
            substitutions.push(Substitution::HeadStyle);
        }

        Rewrite {
            html,
            substitutions,
        }
    }
}
