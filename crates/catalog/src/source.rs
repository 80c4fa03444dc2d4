//! HTTP implementation of the product source against a WooCommerce-style
//! REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use galleria_core::domain::product::{Product, ProductId};
use galleria_core::ports::{PageQuery, ProductFilter, ProductSource, SourceError};

const PRODUCTS_PATH: &str = "/wp-json/wc/v3/products";

pub struct HttpProductSource {
    client: Client,
    base_url: String,
    consumer_key: SecretString,
    consumer_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    categories: Vec<WireTerm>,
    #[serde(default)]
    tags: Vec<WireTerm>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireTerm {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    #[serde(default)]
    src: String,
}

impl From<WireProduct> for Product {
    fn from(wire: WireProduct) -> Self {
        let image_url = wire
            .images
            .into_iter()
            .map(|image| image.src)
            .find(|src| !src.trim().is_empty());
        Self {
            id: ProductId(wire.id),
            name: wire.name,
            categories: wire.categories.into_iter().map(|term| term.name).collect(),
            tags: wire.tags.into_iter().map(|term| term.name).collect(),
            price: wire.price,
            image_url,
            permalink: wire.permalink,
        }
    }
}

impl HttpProductSource {
    pub fn new(
        base_url: String,
        consumer_key: SecretString,
        consumer_secret: SecretString,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url, consumer_key, consumer_secret })
    }

    async fn get_products(
        &self,
        query: &[(&str, String)],
    ) -> Result<Vec<Product>, SourceError> {
        let url = format!("{}{}", self.base_url, PRODUCTS_PATH);
        let response = self
            .client
            .get(&url)
            .basic_auth(
                self.consumer_key.expose_secret(),
                Some(self.consumer_secret.expose_secret()),
            )
            .query(query)
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Transport(format!(
                "store api returned status {status} for {url}"
            )));
        }

        let wire: Vec<WireProduct> = response
            .json()
            .await
            .map_err(|err| SourceError::Decode(err.to_string()))?;

        debug!(event_name = "catalog.source.page_fetched", count = wire.len());
        Ok(wire.into_iter().map(Product::from).collect())
    }
}

#[async_trait]
impl ProductSource for HttpProductSource {
    async fn fetch_page(&self, query: PageQuery) -> Result<Vec<Product>, SourceError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.per_page.to_string()),
            ("status", "publish".to_string()),
        ];
        match query.filter {
            ProductFilter::None => {}
            ProductFilter::Category(id) => params.push(("category", id.to_string())),
            ProductFilter::Tag(id) => params.push(("tag", id.to_string())),
        }

        self.get_products(&params).await
    }

    async fn fetch_most_popular(&self, limit: u32) -> Result<Vec<Product>, SourceError> {
        let params = vec![
            ("per_page", limit.to_string()),
            ("orderby", "popularity".to_string()),
            ("status", "publish".to_string()),
        ];

        self.get_products(&params).await
    }
}
