use std::f64::consts::PI;
use std::fmt::Write;

use crate::category::Category;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

const WIDTH: u32 = 300;
const HEIGHT: u32 = 300;
const SATURATION: u8 = 80;
const LIGHTNESS: u8 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Golden-angle hue spacing: adjacent ids land far apart on the colour wheel.
pub fn hue_for(id: i64) -> u16 {
    (id.rem_euclid(360) * 137).rem_euclid(360) as u16
}

pub fn resolve_category(id: i64, name_or_category: Option<&str>) -> Category {
    name_or_category
        .and_then(Category::from_name)
        .unwrap_or_else(|| Category::for_id(id))
}

fn palette(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Audio => ("#3498db", "#2980b9"),
        Category::Lighting => ("#f1c40f", "#f39c12"),
        Category::Wellness => ("#2ecc71", "#27ae60"),
        Category::Time => ("#9b59b6", "#8e44ad"),
        Category::Creativity => ("#e74c3c", "#c0392b"),
    }
}

pub fn generate(id: i64, name_or_category: Option<&str>) -> GeneratedImage {
    let category = resolve_category(id, name_or_category);
    let hue = hue_for(id);
    let (primary, secondary) = palette(category);
    let (cx, cy) = (WIDTH as f64 / 2.0, 120.0);

    let svg = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  <rect width="{w}" height="{h}" fill="white"/>
  <rect x="10" y="10" width="{iw}" height="{ih}" rx="15" fill="hsl({hue}, {s}%, {l}%)" stroke="{primary}" stroke-width="6"/>
  <g fill="none" stroke="{secondary}" stroke-width="4">
{motif}  </g>
  <text x="{cx}" y="{id_y}" font-family="Arial" font-size="24" font-weight="bold" fill="white" text-anchor="middle">ID: {id}</text>
  <text x="{cx}" y="{cat_y}" font-family="Arial" font-size="18" fill="white" text-anchor="middle">Category: {label}</text>
</svg>"#,
        w = WIDTH,
        h = HEIGHT,
        iw = WIDTH - 20,
        ih = HEIGHT - 20,
        s = SATURATION,
        l = LIGHTNESS,
        motif = motif(category, id, cx, cy),
        id_y = HEIGHT - 80,
        cat_y = HEIGHT - 45,
        label = category.label(),
    );

    GeneratedImage { bytes: svg.into_bytes(), content_type: SVG_CONTENT_TYPE }
}

fn motif(category: Category, id: i64, cx: f64, cy: f64) -> String {
    let mut out = String::new();
    match category {
        Category::Audio => {
            for r in [18.0, 36.0, 54.0] {
                let _ = writeln!(out, r#"    <circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}"/>"#);
            }
        }
        Category::Lighting => {
            let _ = writeln!(out, r#"    <circle cx="{cx:.1}" cy="{cy:.1}" r="22.0"/>"#);
            for i in 0..8 {
                let a = i as f64 * PI / 4.0;
                let (x1, y1) = (cx + 32.0 * a.cos(), cy + 32.0 * a.sin());
                let (x2, y2) = (cx + 56.0 * a.cos(), cy + 56.0 * a.sin());
                let _ = writeln!(out, r#"    <line x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}"/>"#);
            }
        }
        Category::Wellness => {
            for i in 0..6 {
                let deg = i * 60;
                let _ = writeln!(
                    out,
                    r#"    <ellipse cx="{cx:.1}" cy="{:.1}" rx="12.0" ry="30.0" transform="rotate({deg} {cx:.1} {cy:.1})"/>"#,
                    cy - 28.0
                );
            }
        }
        Category::Time => {
            // hand positions come from the id so each product shows its own time
            let hour = id.rem_euclid(12) as f64;
            let minute = (id.rem_euclid(60)) as f64;
            let ha = hour * PI / 6.0 - PI / 2.0;
            let ma = minute * PI / 30.0 - PI / 2.0;
            let _ = writeln!(out, r#"    <circle cx="{cx:.1}" cy="{cy:.1}" r="56.0"/>"#);
            let _ = writeln!(
                out,
                r#"    <line x1="{cx:.1}" y1="{cy:.1}" x2="{:.1}" y2="{:.1}"/>"#,
                cx + 28.0 * ha.cos(),
                cy + 28.0 * ha.sin()
            );
            let _ = writeln!(
                out,
                r#"    <line x1="{cx:.1}" y1="{cy:.1}" x2="{:.1}" y2="{:.1}"/>"#,
                cx + 44.0 * ma.cos(),
                cy + 44.0 * ma.sin()
            );
        }
        Category::Creativity => {
            let points: Vec<String> = (0..10)
                .map(|i| {
                    let r = if i % 2 == 0 { 56.0 } else { 24.0 };
                    let a = i as f64 * PI / 5.0 - PI / 2.0;
                    format!("{:.1},{:.1}", cx + r * a.cos(), cy + r * a.sin())
                })
                .collect();
            let _ = writeln!(out, r#"    <polygon points="{}"/>"#, points.join(" "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(img: &GeneratedImage) -> String {
        String::from_utf8(img.bytes.clone()).unwrap()
    }

    #[test]
    fn generation_is_deterministic() {
        for id in [0, 1, 42, 359, 360, -7, i64::MAX, i64::MIN] {
            assert_eq!(generate(id, Some("Lumina Halo")), generate(id, Some("Lumina Halo")));
            assert_eq!(generate(id, None), generate(id, None));
        }
    }

    #[test]
    fn hue_follows_golden_angle() {
        assert_eq!(hue_for(0), 0);
        assert_eq!(hue_for(1), 137);
        assert_eq!(hue_for(2), 274);
        assert_eq!(hue_for(3), 51);
        assert_eq!(hue_for(-1), 223);
        assert_eq!(hue_for(361), hue_for(1));
    }

    #[test]
    fn distinct_ids_get_distinct_hues_within_a_cycle() {
        let hues: std::collections::HashSet<u16> = (0..360).map(hue_for).collect();
        assert_eq!(hues.len(), 360);
    }

    #[test]
    fn name_prefix_wins_over_id_fallback() {
        assert_eq!(resolve_category(0, Some("Chronos Time Shifter")), Category::Time);
        assert_eq!(resolve_category(0, Some("creativity")), Category::Creativity);
        assert_eq!(resolve_category(1, Some("Smartphone X")), Category::Lighting);
        assert_eq!(resolve_category(4, None), Category::Creativity);
    }

    #[test]
    fn svg_labels_id_and_category() {
        let img = generate(12, Some("EchoWave Sound Sphere"));
        assert_eq!(img.content_type, SVG_CONTENT_TYPE);
        let svg = text(&img);
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("ID: 12"));
        assert!(svg.contains("Category: audio"));
        assert!(svg.contains(&format!("hsl({}, 80%, 50%)", hue_for(12))));
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn each_category_draws_its_own_motif() {
        assert!(text(&generate(1, Some("lighting"))).contains("<line"));
        assert!(text(&generate(1, Some("wellness"))).contains("<ellipse"));
        assert!(text(&generate(1, Some("creativity"))).contains("<polygon"));
        let clock = text(&generate(1, Some("time")));
        assert_eq!(clock.matches("<line").count(), 2);
    }
}
