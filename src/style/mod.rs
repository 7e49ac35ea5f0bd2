//! # Style System
//!
//! The slice of CSS the pagination engine actually reads. Rendered templates
//! carry their styling inline (`style="..."`), and only a handful of
//! properties influence vertical geometry: margins, paddings, heights and
//! font metrics. Those are typed. Everything else is kept verbatim as
//! passthrough declarations so a parse/serialize round trip never loses
//! author styling.

use serde::{Deserialize, Serialize};

/// Pixels per CSS point (96 dpi / 72 pt).
const PX_PER_PT: f64 = 96.0 / 72.0;
/// Root font size used to resolve `em`/`rem` lengths.
const ROOT_FONT_SIZE: f64 = 16.0;

/// The style properties of a content node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    // ── Box Model ──────────────────────────────────────────────
    /// Top margin. This is the property the layout mutator overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_top: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding_bottom: Option<Dimension>,
    /// Explicit height. Content taller than this overflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<Dimension>,

    // ── Typography ─────────────────────────────────────────────
    /// Font size in pixels. Inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Line height as a multiple of the font size. Inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,

    // ── Flow ───────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Display>,
    /// `break-inside: avoid` marks a node unbreakable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_inside: Option<BreakInside>,

    /// Declarations the engine doesn't interpret, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Declaration>,
}

/// A raw `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// A length value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    /// Fixed size in CSS pixels.
    Px(f64),
    /// Percentage of the containing block's width (or height, for heights).
    Percent(f64),
    /// Determined by content.
    Auto,
}

impl Dimension {
    /// Resolve this dimension against a reference size.
    /// Returns None for Auto.
    pub fn resolve(&self, reference: f64) -> Option<f64> {
        match self {
            Dimension::Px(v) => Some(*v),
            Dimension::Percent(p) => Some(reference * p / 100.0),
            Dimension::Auto => None,
        }
    }

    /// Parse a CSS length. Accepts `px`, unitless numbers, `pt`, `em`,
    /// `rem`, `%` and `auto`.
    pub fn parse(value: &str) -> Option<Dimension> {
        let v = value.trim().to_ascii_lowercase();
        if v == "auto" {
            return Some(Dimension::Auto);
        }
        let (number, scale, percent) = if let Some(n) = v.strip_suffix("px") {
            (n, 1.0, false)
        } else if let Some(n) = v.strip_suffix("rem") {
            (n, ROOT_FONT_SIZE, false)
        } else if let Some(n) = v.strip_suffix("em") {
            (n, ROOT_FONT_SIZE, false)
        } else if let Some(n) = v.strip_suffix("pt") {
            (n, PX_PER_PT, false)
        } else if let Some(n) = v.strip_suffix('%') {
            (n, 1.0, true)
        } else {
            (v.as_str(), 1.0, false)
        };
        let parsed = number.trim().parse::<f64>().ok()?;
        if !parsed.is_finite() {
            return None;
        }
        if percent {
            Some(Dimension::Percent(parsed))
        } else {
            Some(Dimension::Px(parsed * scale))
        }
    }

    fn to_css(self) -> String {
        match self {
            Dimension::Px(v) => format!("{v}px"),
            Dimension::Percent(p) => format!("{p}%"),
            Dimension::Auto => "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Display {
    #[default]
    Block,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakInside {
    #[default]
    Auto,
    Avoid,
}

/// Split an inline style attribute into `(property, value)` pairs.
///
/// Properties are lowercased; values keep their case and any `!important`
/// suffix. Empty and malformed declarations are skipped.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some((property, value.to_string()))
        })
        .collect()
}

/// Remove every declaration of `property` from an inline style string,
/// keeping the remaining declarations in order.
pub fn strip_declaration(style: &str, property: &str) -> String {
    parse_declarations(style)
        .into_iter()
        .filter(|(p, _)| p != property)
        .map(|(p, v)| format!("{p}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn strip_important(value: &str) -> &str {
    match value.find("!important") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}

impl Style {
    /// Parse an inline style attribute.
    pub fn parse_inline(style: &str) -> Style {
        let mut out = Style::default();
        for (property, raw) in parse_declarations(style) {
            let value = strip_important(&raw);
            let recognized = match property.as_str() {
                "margin-top" => set(&mut out.margin_top, Dimension::parse(value)),
                "margin-bottom" => set(&mut out.margin_bottom, Dimension::parse(value)),
                "padding-top" => set(&mut out.padding_top, Dimension::parse(value)),
                "padding-bottom" => set(&mut out.padding_bottom, Dimension::parse(value)),
                "height" => set(&mut out.height, Dimension::parse(value)),
                "min-height" => set(&mut out.min_height, Dimension::parse(value)),
                "font-size" => set(
                    &mut out.font_size,
                    Dimension::parse(value).and_then(|d| d.resolve(ROOT_FONT_SIZE)),
                ),
                "line-height" => {
                    let multiplier = parse_line_height(value, &out);
                    set(&mut out.line_height, multiplier)
                }
                "margin" | "padding" => {
                    out.expand_box_shorthand(&property, value, raw.contains("!important"));
                    true
                }
                "display" => match value.to_ascii_lowercase().as_str() {
                    "none" => set(&mut out.display, Some(Display::None)),
                    _ => set(&mut out.display, Some(Display::Block)),
                },
                "break-inside" | "page-break-inside" => {
                    let avoid = value.eq_ignore_ascii_case("avoid");
                    set(
                        &mut out.break_inside,
                        Some(if avoid { BreakInside::Avoid } else { BreakInside::Auto }),
                    )
                }
                _ => false,
            };
            if !recognized {
                out.extra.push(Declaration { property, value: raw });
            }
        }
        out
    }

    /// Serialize back to an inline style attribute. Typed properties come
    /// first, passthrough declarations after them.
    pub fn to_inline(&self) -> String {
        let mut parts = Vec::new();
        let lengths = [
            ("margin-top", self.margin_top),
            ("margin-bottom", self.margin_bottom),
            ("padding-top", self.padding_top),
            ("padding-bottom", self.padding_bottom),
            ("height", self.height),
            ("min-height", self.min_height),
        ];
        for (property, dim) in lengths {
            if let Some(d) = dim {
                parts.push(format!("{property}: {}", d.to_css()));
            }
        }
        if let Some(size) = self.font_size {
            parts.push(format!("font-size: {size}px"));
        }
        if let Some(lh) = self.line_height {
            parts.push(format!("line-height: {lh}"));
        }
        if let Some(display) = self.display {
            let v = match display {
                Display::Block => "block",
                Display::None => "none",
            };
            parts.push(format!("display: {v}"));
        }
        if let Some(BreakInside::Avoid) = self.break_inside {
            parts.push("break-inside: avoid".to_string());
        }
        for decl in &self.extra {
            parts.push(format!("{}: {}", decl.property, decl.value));
        }
        parts.join("; ")
    }

    /// Spread a `margin`/`padding` shorthand over its four sides. Top and
    /// bottom become typed when they parse; the other sides are kept as
    /// passthrough longhands, so no shorthand survives to override a typed
    /// side on output.
    fn expand_box_shorthand(&mut self, property: &str, value: &str, important: bool) {
        let parts = split_components(value);
        let Some(&top) = parts.first() else {
            return;
        };
        let right = parts.get(1).copied().unwrap_or(top);
        let bottom = parts.get(2).copied().unwrap_or(top);
        let left = parts.get(3).copied().unwrap_or(right);

        let (top_slot, bottom_slot) = if property == "margin" {
            (&mut self.margin_top, &mut self.margin_bottom)
        } else {
            (&mut self.padding_top, &mut self.padding_bottom)
        };
        let typed_top = set(top_slot, Dimension::parse(top));
        let typed_bottom = set(bottom_slot, Dimension::parse(bottom));

        let suffix = if important { " !important" } else { "" };
        let mut sides = vec![("right", right), ("left", left)];
        if !typed_top {
            sides.push(("top", top));
        }
        if !typed_bottom {
            sides.push(("bottom", bottom));
        }
        for (side, v) in sides {
            let longhand = format!("{property}-{side}");
            self.extra.retain(|d| d.property != longhand);
            self.extra.push(Declaration {
                property: longhand,
                value: format!("{v}{suffix}"),
            });
        }
    }

    /// Replace the top margin, dropping any passthrough declaration that
    /// would override it on output.
    pub fn set_margin_top(&mut self, margin: Dimension) {
        self.margin_top = Some(margin);
        self.extra
            .retain(|d| d.property != "margin-top" && d.property != "margin");
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self.display, Some(Display::None))
    }

    /// Append (or replace) a passthrough declaration.
    pub fn with_declaration(mut self, property: &str, value: &str) -> Self {
        self.extra.retain(|d| d.property != property);
        self.extra.push(Declaration {
            property: property.to_string(),
            value: value.to_string(),
        });
        self
    }
}

/// Split a multi-value property on whitespace outside parentheses.
fn split_components(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    parts.push(&value[s..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(s) = start {
        parts.push(&value[s..]);
    }
    parts
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

/// `line-height` is stored as a multiplier. Unitless values are already
/// multipliers; lengths are divided by the font size in effect.
fn parse_line_height(value: &str, style: &Style) -> Option<f64> {
    if let Ok(multiplier) = value.trim().parse::<f64>() {
        return Some(multiplier);
    }
    let font_size = style.font_size.unwrap_or(ROOT_FONT_SIZE);
    match Dimension::parse(value)? {
        Dimension::Px(px) if font_size > 0.0 => Some(px / font_size),
        Dimension::Percent(p) => Some(p / 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lengths_in_all_units() {
        assert_eq!(Dimension::parse("12px"), Some(Dimension::Px(12.0)));
        assert_eq!(Dimension::parse("12"), Some(Dimension::Px(12.0)));
        assert_eq!(Dimension::parse("1.5em"), Some(Dimension::Px(24.0)));
        assert_eq!(Dimension::parse("2rem"), Some(Dimension::Px(32.0)));
        assert_eq!(Dimension::parse("72pt"), Some(Dimension::Px(96.0)));
        assert_eq!(Dimension::parse("50%"), Some(Dimension::Percent(50.0)));
        assert_eq!(Dimension::parse("AUTO"), Some(Dimension::Auto));
        assert_eq!(Dimension::parse("wide"), None);
    }

    #[test]
    fn inline_style_keeps_unknown_declarations() {
        let style = Style::parse_inline("color: Red; margin-top: 10px !important; height:40px;;");
        assert_eq!(style.margin_top, Some(Dimension::Px(10.0)));
        assert_eq!(style.height, Some(Dimension::Px(40.0)));
        assert_eq!(
            style.extra,
            vec![Declaration {
                property: "color".to_string(),
                value: "Red".to_string()
            }]
        );
    }

    #[test]
    fn break_inside_avoid_is_recognized() {
        let style = Style::parse_inline("page-break-inside: avoid");
        assert_eq!(style.break_inside, Some(BreakInside::Avoid));
    }

    #[test]
    fn line_height_lengths_become_multipliers() {
        let style = Style::parse_inline("font-size: 20px; line-height: 30px");
        assert_eq!(style.line_height, Some(1.5));
    }

    #[test]
    fn inline_round_trip() {
        let style = Style::parse_inline("margin-top: 8px; display: none; color: blue");
        let again = Style::parse_inline(&style.to_inline());
        assert_eq!(style, again);
    }

    #[test]
    fn margin_shorthand_fills_typed_sides() {
        let style = Style::parse_inline("margin: 50px 0 8px 4px; color: red");
        assert_eq!(style.margin_top, Some(Dimension::Px(50.0)));
        assert_eq!(style.margin_bottom, Some(Dimension::Px(8.0)));
        let inline = style.to_inline();
        assert!(!inline.contains("margin:"), "{inline}");
        assert!(inline.contains("margin-right: 0"));
        assert!(inline.contains("margin-left: 4px"));
    }

    #[test]
    fn padding_shorthand_with_two_values() {
        let style = Style::parse_inline("padding: 12px auto");
        assert_eq!(style.padding_top, Some(Dimension::Px(12.0)));
        assert_eq!(style.padding_bottom, Some(Dimension::Px(12.0)));
        assert!(style.to_inline().contains("padding-left: auto"));
    }

    #[test]
    fn later_longhand_wins_over_shorthand() {
        let style = Style::parse_inline("margin: 10px; margin-top: 30px");
        assert_eq!(style.margin_top, Some(Dimension::Px(30.0)));
        assert_eq!(style.margin_bottom, Some(Dimension::Px(10.0)));
    }

    #[test]
    fn unparsed_shorthand_sides_stay_as_longhands() {
        let mut style = Style::parse_inline("margin: calc(1px + 2px) 0 0");
        assert_eq!(style.margin_top, None);
        assert_eq!(style.margin_bottom, Some(Dimension::Px(0.0)));
        assert!(style.to_inline().contains("margin-top: calc(1px + 2px)"));
        style.set_margin_top(Dimension::Px(100.0));
        let inline = style.to_inline();
        assert!(inline.starts_with("margin-top: 100px"), "{inline}");
        assert!(!inline.contains("calc"), "{inline}");
    }

    #[test]
    fn strip_removes_every_occurrence() {
        let stripped = strip_declaration(
            "margin-top: 4px; color: red; MARGIN-TOP: 9px !important",
            "margin-top",
        );
        assert_eq!(stripped, "color: red");
    }
}
