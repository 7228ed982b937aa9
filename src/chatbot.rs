use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::category::Category;
use crate::error::CatalogError;
use crate::generator;
use crate::intent::{classify, ChatContext, ChatIntent, ContextData, Step};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<ChatIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub context: ChatContext,
}

impl ChatReply {
    fn new(text: impl Into<String>, suggestions: &[&str]) -> Self {
        Self {
            text: text.into(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            data: None,
            intent: None,
            error: None,
            context: ChatContext::default(),
        }
    }

    fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets both the reported intent and the next context.
    fn moving_to(mut self, context: ChatContext) -> Self {
        self.intent = Some(context.intent);
        self.context = context;
        self
    }

    fn failed(text: String, error: &CatalogError) -> Self {
        let mut reply = Self::new(text, &[]);
        reply.error = Some(error.to_string());
        reply
    }
}

const HELP_TEXT: &str = "I can help you with the following tasks:\n\n\
- Adding new products to the catalog\n\
- Generating product details (names, descriptions, prices)\n\
- Uploading images for products\n\
- Viewing existing products\n\n\
What would you like to do?";

const FALLBACK_TEXT: &str =
    "I'm your catalog assistant. I can help you manage products and product images. What would you like to do?";

pub struct ChatEngine {
    catalog: Arc<Catalog>,
}

impl ChatEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn respond(&self, message: &str, context: ChatContext) -> ChatReply {
        let step = classify(message, &context);
        info!("💬 Chat turn in {:?} -> {:?}", context.intent, step);
        match step {
            Step::StartAdd => ChatReply::new("I can help you add a new product! Which category would you like to create?", &[])
                .with_suggestions(Category::prefixes())
                .moving_to(ChatContext::new(ChatIntent::AwaitingCategory)),
            Step::DraftFor(category) => self.draft(category),
            Step::ConfirmAdd => self.confirm_add(&context).await,
            Step::ViewProducts => self.view_products().await,
            Step::StartUpload => self.start_upload().await,
            Step::SelectForUpload(id) => ChatReply::new(format!("Please upload an image for product #{id}."), &[])
                .with_data(json!({ "productId": id }))
                .moving_to(ChatContext::with_data(ChatIntent::AwaitingImage, ContextData::Product { product_id: id })),
            Step::StartDescription => ChatReply::new("I can generate a product description! Which category is this for?", &[])
                .with_suggestions(Category::prefixes())
                .moving_to(ChatContext::new(ChatIntent::GenerateDescription)),
            Step::Describe(category) => self.describe(category),
            Step::Help => ChatReply::new(
                HELP_TEXT,
                &["Add a new product", "View products", "Upload an image", "Generate a product description"],
            ),
            Step::Fallback => ChatReply::new(FALLBACK_TEXT, &["Add a new product", "View products", "Upload an image", "Help"]),
        }
    }

    /// Completes an `awaiting_image` conversation once the client attaches the file.
    pub async fn attach_image(&self, context: ChatContext, bytes: Bytes, content_type: Option<String>) -> ChatReply {
        let Some(id) = context.product_id().filter(|_| context.intent == ChatIntent::AwaitingImage) else {
            return self.start_upload().await;
        };
        match self.catalog.upload_image(id, bytes, content_type).await {
            Ok(product) => ChatReply::new(
                format!("Image uploaded for \"{}\" (product #{}).", product.name, product.id),
                &["View products", "Add a new product"],
            )
            .with_data(json!(product))
            .moving_to(ChatContext::new(ChatIntent::ImageUploaded)),
            Err(e) => {
                warn!("⚠️ Chat image upload for product {} failed: {}", id, e);
                ChatReply::failed(format!("Sorry, I couldn't upload the image. Error: {e}"), &e)
            }
        }
    }

    fn draft(&self, category: Category) -> ChatReply {
        let draft = generator::draft(category, &mut rand::thread_rng());
        let text = format!(
            "I've generated details for a new {} product:\n\nName: {}\nUPC: {}\nPrice: ${}\n\nDescription: {}\n\nWould you like to add this product to the catalog?",
            category.prefix(),
            draft.name,
            draft.upc,
            draft.price,
            draft.description
        );
        ChatReply::new(text, &["Yes, add this product", "Generate another product", "No, cancel"])
            .with_data(json!(draft))
            .moving_to(ChatContext::with_data(ChatIntent::ConfirmAdd, ContextData::Draft(draft)))
    }

    async fn confirm_add(&self, context: &ChatContext) -> ChatReply {
        let Some(draft) = context.draft() else {
            return ChatReply::new(
                "I don't have any product details to add. Let's start again - which category of product would you like to create?",
                &[],
            )
            .with_suggestions(Category::prefixes())
            .moving_to(ChatContext::new(ChatIntent::AwaitingCategory));
        };
        match self.catalog.create_product(draft.clone().into()).await {
            Ok(product) => ChatReply::new(
                format!(
                    "Success! I've added the product \"{}\" to the catalog.\nProduct ID: {}\n\nWould you like to upload an image for this product?",
                    product.name, product.id
                ),
                &["Yes, upload an image", "No, I'm done"],
            )
            .with_data(json!(product))
            .moving_to(ChatContext::with_data(
                ChatIntent::ProductCreated,
                ContextData::Product { product_id: product.id },
            )),
            Err(e) => ChatReply::failed(format!("Sorry, I couldn't create the product. Error: {e}"), &e),
        }
    }

    async fn view_products(&self) -> ChatReply {
        let products = match self.catalog.list_products().await {
            Ok(products) => products,
            Err(e) => return ChatReply::failed(format!("Sorry, I couldn't retrieve the products. Error: {e}"), &e),
        };
        if products.is_empty() {
            return ChatReply::new("There are no products in the catalog yet. Would you like to add one?", &["Add a new product"]);
        }
        let lines: Vec<String> = products
            .iter()
            .map(|p| {
                let flag = if p.has_image { " (Has image)" } else { "" };
                format!("- Product #{}: {} - ${}{}", p.id, p.name, p.price, flag)
            })
            .collect();
        ChatReply::new(
            format!("Here are the products in the catalog:\n\n{}\n\nWhat would you like to do next?", lines.join("\n")),
            &["Add a new product", "Upload an image for a product"],
        )
        .with_data(json!(products))
    }

    async fn start_upload(&self) -> ChatReply {
        let products = match self.catalog.list_products().await {
            Ok(products) => products,
            Err(e) => return ChatReply::failed(format!("Sorry, I couldn't retrieve the products. Error: {e}"), &e),
        };
        if products.is_empty() {
            return ChatReply::new(
                "There are no products in the catalog to upload an image for. Would you like to add a product first?",
                &["Add a new product"],
            );
        }
        let suggestions = products.iter().map(|p| format!("Product #{}: {}", p.id, p.name)).collect();
        ChatReply::new("I can help you upload an image! For which product would you like to upload an image?", &[])
            .with_suggestions(suggestions)
            .with_data(json!(products))
            .moving_to(ChatContext::new(ChatIntent::AwaitingImage))
    }

    fn describe(&self, category: Category) -> ChatReply {
        let (name, description) = {
            let mut rng = rand::thread_rng();
            let name = generator::product_name(category, &mut rng);
            let description = generator::description(category, &name, &mut rng);
            (name, description)
        };
        ChatReply::new(format!("Here's a sample description for a {} product:\n\n{}", category.prefix(), description), &[])
            .with_data(json!({ "name": name, "description": description }))
    }
}
