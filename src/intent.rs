//! Keyword rules that turn a chat message plus the carried context into the
//! next conversational step. Classification is pure; the async side effects
//! live in `chatbot`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::sync::LazyLock;

use crate::category::Category;
use crate::generator::ProductDraft;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatIntent {
    Greeting,
    #[serde(alias = "add_product")]
    AwaitingCategory,
    #[serde(alias = "generating_product")]
    ConfirmAdd,
    ConfirmDelete,
    #[serde(alias = "upload_image")]
    AwaitingImage,
    ProductCreated,
    ImageUploaded,
    GenerateDescription,
    #[default]
    #[serde(other)]
    Idle,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextData {
    Draft(ProductDraft),
    Product {
        #[serde(rename = "productId")]
        #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
        product_id: i64,
    },
    /// Anything else a client echoes back, e.g. a previous reply's listing.
    Other(serde_json::Value),
}

/// Conversation state carried by the client between turns. The engine
/// returns a fresh one every turn; it is never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub intent: ChatIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ContextData>,
}

impl ChatContext {
    pub fn new(intent: ChatIntent) -> Self {
        Self { intent, data: None }
    }

    pub fn with_data(intent: ChatIntent, data: ContextData) -> Self {
        Self { intent, data: Some(data) }
    }

    pub fn draft(&self) -> Option<&ProductDraft> {
        match &self.data {
            Some(ContextData::Draft(d)) => Some(d),
            _ => None,
        }
    }

    pub fn product_id(&self) -> Option<i64> {
        match &self.data {
            Some(ContextData::Product { product_id }) => Some(*product_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    StartAdd,
    DraftFor(Category),
    ConfirmAdd,
    ViewProducts,
    StartUpload,
    SelectForUpload(i64),
    StartDescription,
    Describe(Category),
    Help,
    Fallback,
}

struct Turn<'a> {
    text: String,
    context: &'a ChatContext,
}

impl Turn<'_> {
    fn has(&self, word: &str) -> bool {
        self.text.contains(word)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// Tried only in table order against any context.
    Free,
    /// Gets first claim on the turn when the context carries this intent,
    /// and still competes in table order otherwise.
    Prefers(ChatIntent),
    /// Can only fire when the context carries this intent.
    Requires(ChatIntent),
}

impl Binding {
    fn intent(self) -> Option<ChatIntent> {
        match self {
            Binding::Free => None,
            Binding::Prefers(i) | Binding::Requires(i) => Some(i),
        }
    }
}

struct Rule {
    name: &'static str,
    binding: Binding,
    matches: fn(&Turn<'_>) -> Option<Step>,
}

static PRODUCT_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"product #(\d+)").expect("valid regex"));

const RULES: &[Rule] = &[
    Rule {
        name: "add_product",
        binding: Binding::Free,
        matches: |t| (t.has("add") && t.has("product")).then_some(Step::StartAdd),
    },
    Rule {
        name: "pick_category",
        binding: Binding::Free,
        matches: |t| Category::mentioned_in(&t.text).map(Step::DraftFor),
    },
    Rule {
        name: "confirm_add",
        binding: Binding::Prefers(ChatIntent::ConfirmAdd),
        matches: |t| {
            (t.has("yes") && (t.context.intent == ChatIntent::ConfirmAdd || t.has("add"))).then_some(Step::ConfirmAdd)
        },
    },
    Rule {
        name: "view_products",
        binding: Binding::Free,
        matches: |t| (t.has("view") && t.has("product")).then_some(Step::ViewProducts),
    },
    Rule {
        name: "upload_image",
        binding: Binding::Free,
        matches: |t| (t.has("upload") && t.has("image")).then_some(Step::StartUpload),
    },
    Rule {
        name: "select_product",
        binding: Binding::Requires(ChatIntent::AwaitingImage),
        matches: |t| {
            PRODUCT_REF
                .captures(&t.text)
                .and_then(|c| c[1].parse().ok())
                .map(Step::SelectForUpload)
        },
    },
    Rule {
        name: "generate_description",
        binding: Binding::Free,
        matches: |t| (t.has("generate") && t.has("description")).then_some(Step::StartDescription),
    },
    Rule {
        name: "describe_category",
        binding: Binding::Requires(ChatIntent::GenerateDescription),
        matches: |t| Category::mentioned_in(&t.text).map(Step::Describe),
    },
    Rule {
        name: "help",
        binding: Binding::Free,
        matches: |t| t.has("help").then_some(Step::Help),
    },
];

/// First matching rule wins. Rules bound to the carried intent are tried
/// before the generic keyword rules, so context beats keywords.
pub fn classify(message: &str, context: &ChatContext) -> Step {
    let turn = Turn { text: message.to_lowercase(), context };
    let bound = RULES.iter().filter(|r| r.binding.intent() == Some(context.intent));
    let generic = RULES.iter().filter(|r| !matches!(r.binding, Binding::Requires(_)));
    bound
        .chain(generic)
        .find_map(|r| {
            let step = (r.matches)(&turn)?;
            tracing::debug!(rule = r.name, ?step, "chat rule matched");
            Some(step)
        })
        .unwrap_or(Step::Fallback)
}
