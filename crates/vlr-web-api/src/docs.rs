use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{API_DESCRIPTION, DocsConfig};

#[derive(OpenApi)]
#[openapi(
    info(title = "Valorant Esports API"),
    tags(
        (name = "vlr", description = "Valorant esports match, team and news coverage")
    )
)]
pub struct ApiDoc;

/// The shell's OpenAPI document, with the data routes' document merged in when given.
pub fn openapi(
    config: &DocsConfig,
    data_routes: Option<utoipa::openapi::OpenApi>,
) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = config.title.clone();
    doc.info.description = Some(API_DESCRIPTION.to_string());

    if let Some(data_doc) = data_routes {
        doc.merge(data_doc);
    }
    doc
}

pub fn swagger_ui(config: &DocsConfig, doc: utoipa::openapi::OpenApi) -> SwaggerUi {
    SwaggerUi::new(config.docs_path.clone()).url(config.openapi_path.clone(), doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::{OpenApiBuilder, PathsBuilder, path::PathItem};

    #[test]
    fn test_openapi_uses_configured_title() {
        let doc = openapi(&DocsConfig::default(), None);
        assert_eq!(doc.info.title, "Valorant Esports API");
        assert!(
            doc.info
                .description
                .as_deref()
                .is_some_and(|d| d.contains("vlr.gg"))
        );
    }

    #[test]
    fn test_openapi_merges_data_routes() {
        let data_doc = OpenApiBuilder::new()
            .paths(PathsBuilder::new().path("/news", PathItem::default()))
            .build();

        let doc = openapi(&DocsConfig::default(), Some(data_doc));
        assert!(doc.paths.paths.contains_key("/news"));
    }

    #[test]
    fn test_favicon_routes_are_not_documented() {
        let doc = openapi(&DocsConfig::default(), None);
        assert!(!doc.paths.paths.contains_key("/favicon.ico"));
        assert!(!doc.paths.paths.contains_key("/favicon.svg"));
        assert!(!doc.paths.paths.contains_key("/"));
    }
}
