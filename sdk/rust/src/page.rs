//! Page and template metadata as served by the CMS GraphQL API.

use crate::error::{ErrorCode, ResultExt, SdkResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation fetching a single page by its URI.
pub const PAGE_BY_URI_QUERY: &str = r"query PageByUri($uri: ID!) {
  page(id: $uri, idType: URI) {
    __typename
    id
    databaseId
    uri
    slug
    title
    content
    template {
      templateName
    }
    featuredImage {
      node {
        __typename
        id
        sourceUrl
        altText
      }
    }
    seo {
      title
      metaDesc
      canonical
      opengraphImage {
        __typename
        id
        sourceUrl
        altText
      }
    }
  }
}";

/// Operation name of [`PAGE_BY_URI_QUERY`].
pub const PAGE_BY_URI_OPERATION: &str = "PageByUri";

/// Template applied when the CMS reports none.
pub const DEFAULT_TEMPLATE: &str = "Default";

/// Variables of [`PAGE_BY_URI_QUERY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageByUriVariables {
    pub uri: String,
}

impl PageByUriVariables {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// A CMS page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub database_id: Option<i64>,
    pub uri: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub template: Option<Template>,
    #[serde(default)]
    pub featured_image: Option<FeaturedImage>,
    #[serde(default)]
    pub seo: Option<Seo>,
}

/// Template assigned to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template_name: String,
}

/// Featured image edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedImage {
    pub node: MediaItem,
}

/// An uploaded media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub source_url: String,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// SEO fields attached to a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub meta_desc: Option<String>,
    #[serde(default)]
    pub canonical: Option<String>,
    #[serde(default)]
    pub opengraph_image: Option<MediaItem>,
}

/// Resolved `<head>` metadata for rendering a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadMeta {
    pub title: String,
    pub description: Option<String>,
    pub canonical: Option<String>,
    pub image: Option<String>,
}

impl Page {
    /// Extracts the page from the `data` of [`PAGE_BY_URI_QUERY`].
    ///
    /// A `null` page (unknown URI) yields `Ok(None)`.
    pub fn from_query_data(data: &Value) -> SdkResult<Option<Self>> {
        match data.get("page") {
            None | Some(Value::Null) => Ok(None),
            Some(page) => Self::deserialize(page)
                .map(Some)
                .map_sdk_err(ErrorCode::DeserializeError),
        }
    }

    /// Name of the template to render this page with.
    pub fn template_name(&self) -> &str {
        self.template
            .as_ref()
            .map_or(DEFAULT_TEMPLATE, |template| template.template_name.as_str())
    }

    /// Head metadata, preferring SEO fields over the page's own.
    pub fn head_meta(&self) -> HeadMeta {
        let seo = self.seo.clone().unwrap_or_default();
        HeadMeta {
            title: seo
                .title
                .filter(|title| !title.is_empty())
                .or_else(|| self.title.clone())
                .unwrap_or_default(),
            description: seo.meta_desc.filter(|desc| !desc.is_empty()),
            canonical: seo.canonical.filter(|url| !url.is_empty()),
            image: seo
                .opengraph_image
                .or_else(|| self.featured_image.as_ref().map(|image| image.node.clone()))
                .map(|image| image.source_url),
        }
    }
}
