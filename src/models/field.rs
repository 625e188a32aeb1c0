use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of product fields the extractor knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    WpId,
    Title,
    Price,
    Description,
    Sku,
    Oem,
    Tags,
    Categories,
    Images,
    Attributes,
    Url,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::WpId,
        Field::Title,
        Field::Price,
        Field::Description,
        Field::Sku,
        Field::Oem,
        Field::Tags,
        Field::Categories,
        Field::Images,
        Field::Attributes,
        Field::Url,
    ];

    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Field::Tags | Field::Categories | Field::Images | Field::Attributes
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::WpId => "wp_id",
            Field::Title => "title",
            Field::Price => "price",
            Field::Description => "description",
            Field::Sku => "sku",
            Field::Oem => "oem",
            Field::Tags => "tags",
            Field::Categories => "categories",
            Field::Images => "images",
            Field::Attributes => "attributes",
            Field::Url => "url",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate selector. `css@attr` reads an attribute, plain `css` reads the element text.
#[derive(Debug, Clone)]
pub struct SelectorSource {
    raw: String,
    selector: Selector,
    attribute: Option<String>,
}

impl SelectorSource {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (css, attribute) = match raw.rsplit_once('@') {
            Some((css, attr)) => {
                let attr = attr.trim();
                if attr.is_empty() {
                    return Err(format!("Selector '{}' has an empty attribute name", raw));
                }
                (css.trim(), Some(attr.to_string()))
            }
            None => (raw, None),
        };

        if css.is_empty() {
            return Err("Empty CSS selector".to_string());
        }

        let selector = Selector::parse(css)
            .map_err(|e| format!("Invalid CSS selector '{}': {:?}", css, e))?;

        Ok(Self {
            raw: raw.to_string(),
            selector,
            attribute,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorSpecRepr {
    One(String),
    Many(Vec<String>),
}

/// Ordered fallback chain for one field. Never empty; earlier entries win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SelectorSpecRepr", into = "Vec<String>")]
pub struct SelectorSpec {
    sources: Vec<SelectorSource>,
}

impl SelectorSpec {
    pub fn parse<S: AsRef<str>>(selectors: &[S]) -> Result<Self, String> {
        if selectors.is_empty() {
            return Err("Selector list must not be empty".to_string());
        }
        let sources = selectors
            .iter()
            .map(|s| SelectorSource::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sources })
    }

    // Built-in chains are covered by tests; an entry that somehow fails to parse is dropped.
    fn builtin(selectors: &[&str]) -> Self {
        Self {
            sources: selectors
                .iter()
                .filter_map(|s| SelectorSource::parse(s).ok())
                .collect(),
        }
    }

    pub fn sources(&self) -> &[SelectorSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl TryFrom<SelectorSpecRepr> for SelectorSpec {
    type Error = String;

    fn try_from(repr: SelectorSpecRepr) -> Result<Self, Self::Error> {
        match repr {
            SelectorSpecRepr::One(s) => SelectorSpec::parse(&[s]),
            SelectorSpecRepr::Many(v) => SelectorSpec::parse(&v),
        }
    }
}

impl From<SelectorSpec> for Vec<String> {
    fn from(spec: SelectorSpec) -> Self {
        spec.sources.into_iter().map(|s| s.raw).collect()
    }
}

/// Label/value row pattern for the product attributes table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSelectors {
    pub rows: SelectorSpec,
    pub label: SelectorSpec,
    pub value: SelectorSpec,
}

impl Default for AttributeSelectors {
    fn default() -> Self {
        Self {
            rows: SelectorSpec::builtin(&[
                "table.woocommerce-product-attributes tr",
                "table.shop_attributes tr",
            ]),
            label: SelectorSpec::builtin(&[".woocommerce-product-attributes-item__label", "th"]),
            value: SelectorSpec::builtin(&[".woocommerce-product-attributes-item__value", "td"]),
        }
    }
}

/// Selector chains for listing pages and every product field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub product_links: SelectorSpec,
    pub pagination_next: Option<SelectorSpec>,
    pub wp_id: SelectorSpec,
    pub title: SelectorSpec,
    pub price: SelectorSpec,
    pub description: SelectorSpec,
    pub sku: SelectorSpec,
    pub oem: SelectorSpec,
    pub tags: SelectorSpec,
    pub categories: SelectorSpec,
    pub images: SelectorSpec,
    pub attributes: AttributeSelectors,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product_links: SelectorSpec::builtin(&[
                ".products .product a.woocommerce-LoopProduct-link@href",
                "ul.products li.product > a@href",
            ]),
            pagination_next: Some(SelectorSpec::builtin(&[
                "a.next.page-numbers@href",
                ".woocommerce-pagination a.next@href",
            ])),
            wp_id: SelectorSpec::builtin(&[
                "button.single_add_to_cart_button[value]@value",
                "input[name='add-to-cart']@value",
                "input[name='product_id']@value",
                "[data-product_id]@data-product_id",
            ]),
            title: SelectorSpec::builtin(&["h1.product_title", ".product .entry-title", "h1"]),
            // Theme variance: themed amount, wrapped amount, sale price, bare amount, legacy <p>.
            // Direct children only, so a struck-through <del> amount never wins over <ins>.
            price: SelectorSpec::builtin(&[
                ".summary .price > span.woocommerce-Price-amount bdi",
                ".price > .woocommerce-Price-amount",
                ".price ins .amount",
                ".amount",
                "p.price",
            ]),
            description: SelectorSpec::builtin(&[
                ".woocommerce-product-details__short-description",
                "#tab-description",
                ".product .description",
            ]),
            sku: SelectorSpec::builtin(&[".product_meta .sku", ".sku"]),
            oem: SelectorSpec::builtin(&[".product_meta .oem", ".oem"]),
            tags: SelectorSpec::builtin(&[".product_meta .tagged_as a", ".tagged_as a"]),
            categories: SelectorSpec::builtin(&[".product_meta .posted_in a", ".posted_in a"]),
            images: SelectorSpec::builtin(&[
                ".woocommerce-product-gallery__image img@data-large_image",
                ".woocommerce-product-gallery__image img@src",
                ".woocommerce-product-gallery__image a@href",
                "img.wp-post-image@src",
            ]),
            attributes: AttributeSelectors::default(),
        }
    }
}

impl SelectorConfig {
    /// Chain for a single- or multi-valued text field. Attributes and the URL have none.
    pub fn spec_for(&self, field: Field) -> Option<&SelectorSpec> {
        match field {
            Field::WpId => Some(&self.wp_id),
            Field::Title => Some(&self.title),
            Field::Price => Some(&self.price),
            Field::Description => Some(&self.description),
            Field::Sku => Some(&self.sku),
            Field::Oem => Some(&self.oem),
            Field::Tags => Some(&self.tags),
            Field::Categories => Some(&self.categories),
            Field::Images => Some(&self.images),
            Field::Attributes | Field::Url => None,
        }
    }
}
