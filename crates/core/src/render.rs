//! Display rendering: the product-card grid and the store's canned replies.

use crate::domain::product::Product;

pub const FALLBACK_IMAGE_URL: &str = "https://placehold.co/400x400?text=No+Image";
pub const FALLBACK_PRODUCT_NAME: &str = "יצירת אומנות";

pub mod replies {
    /// Oversized inbound message; nothing else happens on this turn.
    pub const TOO_LONG: &str = "ההודעה ארוכה מדי.";
    /// Acknowledgement when the model's reply was nothing but a lead capture.
    pub const LEAD_ACK: &str = "רשמתי, תודה!";
    /// Substituted when a search succeeds but the model gave no preamble.
    pub const DEFAULT_PREAMBLE: &str = "הנה מה שמצאתי:";
    /// Generic apology for oracle failures; never technical.
    pub const APOLOGY: &str = "סליחה, נתקלתי בבעיה רגעית. אפשר לנסות שוב?";

    pub fn no_results(query: &str) -> String {
        format!("חיפשתי '{query}' אך לא מצאתי תוצאות מדויקות. נסה סגנון אחר?")
    }
}

fn price_display(price: &str) -> String {
    if price.is_empty() {
        "מחיר באתר".to_string()
    } else {
        format!("החל מ-{price} ₪")
    }
}

fn render_card(product: &Product) -> String {
    let name = if product.name.is_empty() { FALLBACK_PRODUCT_NAME } else { &product.name };
    let image = product.image_url.as_deref().unwrap_or(FALLBACK_IMAGE_URL);
    format!(
        concat!(
            "<div class=\"product-card\">",
            "<img src='{image}' alt='{name}'>",
            "<div class=\"product-info\">",
            "<div class=\"product-title\">{name}</div>",
            "<div class=\"product-price\">{price}</div>",
            "<a href=\"{link}\" target=\"_blank\" class=\"buy-btn\">לרכישה מהירה 🛒</a>",
            "</div>",
            "</div>"
        ),
        image = image,
        name = name,
        price = price_display(&product.price),
        link = product.permalink,
    )
}

/// The grid of product cards shown under the preamble.
pub fn render_product_grid(products: &[Product]) -> String {
    let mut grid = String::from("<div class='products-grid'>");
    for product in products {
        grid.push_str(&render_card(product));
    }
    grid.push_str("</div>");
    grid
}

/// Compose the final reply: preamble, line break, cards.
pub fn render_reply(preamble: &str, grid: &str) -> String {
    format!("{preamble}<br>{grid}")
}

#[cfg(test)]
mod tests {
    use crate::domain::product::{Product, ProductId};

    use super::{render_product_grid, render_reply, replies, FALLBACK_IMAGE_URL};

    fn product(id: i64, name: &str, price: &str, image_url: Option<&str>) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            categories: Vec::new(),
            tags: Vec::new(),
            price: price.to_string(),
            image_url: image_url.map(str::to_string),
            permalink: format!("https://shop.example/p/{id}"),
        }
    }

    #[test]
    fn grid_contains_a_card_per_product() {
        let products = vec![
            product(1, "הדפס זכוכית דגם 1", "249", Some("https://cdn.example/1.jpg")),
            product(2, "קנבס דגם 2", "199", Some("https://cdn.example/2.jpg")),
        ];

        let grid = render_product_grid(&products);

        assert_eq!(grid.matches("product-card").count(), 2);
        assert!(grid.starts_with("<div class='products-grid'>"));
        assert!(grid.contains("החל מ-249 ₪"));
        assert!(grid.contains("https://shop.example/p/2"));
    }

    #[test]
    fn missing_price_and_image_fall_back_to_placeholders() {
        let grid = render_product_grid(&[product(3, "פוסטר", "", None)]);

        assert!(grid.contains("מחיר באתר"));
        assert!(grid.contains(FALLBACK_IMAGE_URL));
    }

    #[test]
    fn reply_joins_preamble_and_grid_with_a_break() {
        let reply = render_reply(replies::DEFAULT_PREAMBLE, "<div class='products-grid'></div>");
        assert!(reply.starts_with(replies::DEFAULT_PREAMBLE));
        assert!(reply.contains("<br>"));
    }

    #[test]
    fn no_results_reply_echoes_the_query() {
        assert!(replies::no_results("אנימה").contains("'אנימה'"));
    }
}
