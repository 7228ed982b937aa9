use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::models::NewProduct;

/// A synthesized product that has not been written to the catalog yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductDraft {
    pub name: String,
    pub upc: String,
    pub price: Decimal,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
}

impl From<ProductDraft> for NewProduct {
    fn from(d: ProductDraft) -> Self {
        NewProduct {
            name: d.name,
            upc: d.upc,
            price: d.price,
            description: Some(d.description),
            category: d.category.map(|c| c.label().to_string()),
        }
    }
}

struct NameTemplate {
    suffix: &'static str,
    base: u32,
    spread: u32,
}

const fn t(suffix: &'static str, base: u32, spread: u32) -> NameTemplate {
    NameTemplate { suffix, base, spread }
}

struct Line {
    names: &'static [NameTemplate],
    descriptions: &'static [&'static str],
}

const AUDIO: Line = Line {
    names: &[t("Sound Sphere", 125, 100), t("Ambient Pulse", 155, 70), t("Resonance Pod", 175, 80)],
    descriptions: &[
        "Immerse yourself in crystal-clear sound with this innovative audio device. The {name} creates an enveloping soundscape that adapts to your space, delivering rich bass and crisp highs.",
        "Experience sound in a whole new dimension with the {name}. Its acoustic technology creates a personal sound bubble that follows you throughout your space.",
        "Transform any room into a concert hall with the {name}. Spatial audio projects sound evenly in all directions, eliminating dead zones anywhere in the room.",
    ],
};

const LIGHTING: Line = Line {
    names: &[t("Glow Cascade", 90, 60), t("Ambient Halo", 110, 50), t("Aurora Panel", 130, 70)],
    descriptions: &[
        "Elevate your space with the {name}, featuring dynamic lighting that responds to sound and movement. Energy-efficient LEDs provide months of continuous use.",
        "Create the perfect ambiance with the {name}. It follows your circadian rhythm, shifting from energizing daylight to soothing warm tones as evening approaches.",
        "Bring natural light indoors with the {name}. Spectrum matching replicates natural sunlight, perfect for spaces with limited windows or dark winter months.",
    ],
};

const WELLNESS: Line = Line {
    names: &[t("Meditation Stone", 145, 50), t("Dream Enhancer", 165, 60), t("Tranquility Sphere", 185, 40)],
    descriptions: &[
        "Find your center with the {name}, a wellness device that uses subtle vibrations to guide your meditation practice and calm your mind.",
        "Enhance your natural sleep patterns with the {name}. Ambient sound, subtle light, and optional aromatherapy create the ideal conditions for restful sleep.",
        "Release tension and find balance with the {name}. Warmth, gentle pressure, and essential oil diffusion combine into a deeply relaxing experience.",
    ],
};

const TIME: Line = Line {
    names: &[t("Moment Capsule", 170, 80), t("Time Shifter", 190, 60), t("Memory Keeper", 150, 70)],
    descriptions: &[
        "Capture fleeting moments with the {name}. This elegant device makes special moments feel longer and more vivid.",
        "Experience time differently with the {name}. Subtle sensory cues make time feel slower or faster depending on your needs.",
        "Preserve your memories with the {name}. This timepiece helps you record and relive important moments through integrated journaling prompts.",
    ],
};

const CREATIVITY: Line = Line {
    names: &[t("Inspiration Cube", 115, 50), t("Sensory Quill", 135, 40), t("Muse Beacon", 125, 60)],
    descriptions: &[
        "Unlock your creative potential with the {name}. Subtle sensory stimuli activate your imagination and help you overcome creative blocks.",
        "Enhance your artistic expression with the {name}. It responds to your mood with adjustable ambient lighting and optional sound profiles.",
        "Find inspiration anywhere with the {name}. Algorithmic prompts and unexpected combinations spark new ideas for writers, designers, and innovators.",
    ],
};

fn line(category: Category) -> &'static Line {
    match category {
        Category::Audio => &AUDIO,
        Category::Lighting => &LIGHTING,
        Category::Wellness => &WELLNESS,
        Category::Time => &TIME,
        Category::Creativity => &CREATIVITY,
    }
}

pub fn random_category<R: Rng + ?Sized>(rng: &mut R) -> Category {
    Category::ALL[rng.gen_range(0..Category::ALL.len())]
}

fn pick_template<R: Rng + ?Sized>(category: Category, rng: &mut R) -> &'static NameTemplate {
    let names = line(category).names;
    &names[rng.gen_range(0..names.len())]
}

fn name_from(category: Category, template: &NameTemplate) -> String {
    format!("{} {}", category.prefix(), template.suffix)
}

pub fn product_name<R: Rng + ?Sized>(category: Category, rng: &mut R) -> String {
    name_from(category, pick_template(category, rng))
}

pub fn description<R: Rng + ?Sized>(category: Category, name: &str, rng: &mut R) -> String {
    let descriptions = line(category).descriptions;
    descriptions[rng.gen_range(0..descriptions.len())].replace("{name}", name)
}

pub fn upc<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000_000_000u64..1_000_000_000_000u64).to_string()
}

pub fn draft<R: Rng + ?Sized>(category: Category, rng: &mut R) -> ProductDraft {
    let template = pick_template(category, rng);
    let name = name_from(category, template);
    let dollars = template.base + rng.gen_range(0..template.spread);
    let cents = rng.gen_range(0..100u32);
    ProductDraft {
        description: description(category, &name, rng),
        upc: upc(rng),
        price: Decimal::new(i64::from(dollars * 100 + cents), 2),
        name,
        category: Some(category),
    }
}

pub fn random_draft<R: Rng + ?Sized>(rng: &mut R) -> ProductDraft {
    let category = random_category(rng);
    draft(category, rng)
}
