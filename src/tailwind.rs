//! Static Tailwind-subset lookup.
//!
//! Maps a single utility class to the inline style declarations it stands
//! for. Only the unconditional, theme-default subset is known: variant
//! prefixes (`hover:`, `md:`), arbitrary values (`w-[3px]`) and custom theme
//! names resolve to `None` and stay in `className`.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::emit::JsExpr;

/// One `property: value` pair, property in React's camelCase.
pub type Declaration = (&'static str, JsExpr);

const SHADES: [u32; 10] = [50, 100, 200, 300, 400, 500, 600, 700, 800, 900];

lazy_static! {
    static ref PALETTE: HashMap<&'static str, [&'static str; 10]> = {
        let mut m = HashMap::new();
        m.insert("gray", ["#f9fafb", "#f3f4f6", "#e5e7eb", "#d1d5db", "#9ca3af", "#6b7280", "#4b5563", "#374151", "#1f2937", "#111827"]);
        m.insert("slate", ["#f8fafc", "#f1f5f9", "#e2e8f0", "#cbd5e1", "#94a3b8", "#64748b", "#475569", "#334155", "#1e293b", "#0f172a"]);
        m.insert("red", ["#fef2f2", "#fee2e2", "#fecaca", "#fca5a5", "#f87171", "#ef4444", "#dc2626", "#b91c1c", "#991b1b", "#7f1d1d"]);
        m.insert("yellow", ["#fefce8", "#fef9c3", "#fef08a", "#fde047", "#facc15", "#eab308", "#ca8a04", "#a16207", "#854d0e", "#713f12"]);
        m.insert("green", ["#f0fdf4", "#dcfce7", "#bbf7d0", "#86efac", "#4ade80", "#22c55e", "#16a34a", "#15803d", "#166534", "#14532d"]);
        m.insert("blue", ["#eff6ff", "#dbeafe", "#bfdbfe", "#93c5fd", "#60a5fa", "#3b82f6", "#2563eb", "#1d4ed8", "#1e40af", "#1e3a8a"]);
        m.insert("indigo", ["#eef2ff", "#e0e7ff", "#c7d2fe", "#a5b4fc", "#818cf8", "#6366f1", "#4f46e5", "#4338ca", "#3730a3", "#312e81"]);
        m.insert("purple", ["#faf5ff", "#f3e8ff", "#e9d5ff", "#d8b4fe", "#c084fc", "#a855f7", "#9333ea", "#7e22ce", "#6b21a8", "#581c87"]);
        m.insert("pink", ["#fdf2f8", "#fce7f3", "#fbcfe8", "#f9a8d4", "#f472b6", "#ec4899", "#db2777", "#be185d", "#9d174d", "#831843"]);
        m.insert("orange", ["#fff7ed", "#ffedd5", "#fed7aa", "#fdba74", "#fb923c", "#f97316", "#ea580c", "#c2410c", "#9a3412", "#7c2d12"]);
        m
    };

    static ref COLOR_RE: Regex = Regex::new(r"^(bg|text|border)-([a-z]+)(?:-(\d{2,3}))?$").unwrap();
    static ref SCALE_RE: Regex =
        Regex::new(r"^(-?)(p|px|py|pt|pr|pb|pl|m|mx|my|mt|mr|mb|ml|gap|gap-x|gap-y|w|h|min-w|min-h|max-w|max-h|top|right|bottom|left|inset|inset-x|inset-y)-(.+)$").unwrap();
}

fn px(n: f64) -> JsExpr {
    JsExpr::Number(n)
}

fn text(s: &str) -> JsExpr {
    JsExpr::str(s)
}

/// Resolve one utility class.
pub fn resolve_utility(token: &str) -> Option<Vec<Declaration>> {
    if token.contains(':') || token.contains('[') {
        return None;
    }
    keyword(token)
        .or_else(|| color(token))
        .or_else(|| scale(token))
        .or_else(|| typography(token))
        .or_else(|| decoration(token))
}

pub fn palette_color(name: &str, shade: u32) -> Option<&'static str> {
    let idx = SHADES.iter().position(|s| *s == shade)?;
    PALETTE.get(name).map(|shades| shades[idx])
}

fn keyword(token: &str) -> Option<Vec<Declaration>> {
    let one = |property: &'static str, value: JsExpr| Some(vec![(property, value)]);
    match token {
        "flex" => one("display", text("flex")),
        "inline-flex" => one("display", text("inline-flex")),
        "grid" => one("display", text("grid")),
        "block" => one("display", text("block")),
        "inline-block" => one("display", text("inline-block")),
        "inline" => one("display", text("inline")),
        "hidden" => one("display", text("none")),
        "relative" | "absolute" | "fixed" | "sticky" => one("position", text(token)),
        "flex-row" => one("flexDirection", text("row")),
        "flex-col" => one("flexDirection", text("column")),
        "flex-wrap" => one("flexWrap", text("wrap")),
        "flex-1" => one("flex", text("1 1 0%")),
        "flex-none" => one("flex", text("none")),
        "grow" => one("flexGrow", px(1.0)),
        "shrink-0" => one("flexShrink", px(0.0)),
        "items-center" => one("alignItems", text("center")),
        "items-start" => one("alignItems", text("flex-start")),
        "items-end" => one("alignItems", text("flex-end")),
        "items-stretch" => one("alignItems", text("stretch")),
        "justify-center" => one("justifyContent", text("center")),
        "justify-start" => one("justifyContent", text("flex-start")),
        "justify-end" => one("justifyContent", text("flex-end")),
        "justify-between" => one("justifyContent", text("space-between")),
        "justify-around" => one("justifyContent", text("space-around")),
        "justify-evenly" => one("justifyContent", text("space-evenly")),
        "overflow-hidden" => one("overflow", text("hidden")),
        "overflow-auto" => one("overflow", text("auto")),
        "text-left" => one("textAlign", text("left")),
        "text-center" => one("textAlign", text("center")),
        "text-right" => one("textAlign", text("right")),
        "italic" => one("fontStyle", text("italic")),
        "uppercase" => one("textTransform", text("uppercase")),
        "lowercase" => one("textTransform", text("lowercase")),
        "capitalize" => one("textTransform", text("capitalize")),
        "underline" => one("textDecoration", text("underline")),
        "leading-none" => one("lineHeight", px(1.0)),
        "leading-tight" => one("lineHeight", px(1.25)),
        "leading-snug" => one("lineHeight", px(1.375)),
        "leading-normal" => one("lineHeight", px(1.5)),
        "leading-relaxed" => one("lineHeight", px(1.625)),
        "leading-loose" => one("lineHeight", px(2.0)),
        "tracking-tight" => one("letterSpacing", text("-0.025em")),
        "tracking-normal" => one("letterSpacing", text("0em")),
        "tracking-wide" => one("letterSpacing", text("0.025em")),
        "tracking-wider" => one("letterSpacing", text("0.05em")),
        "tracking-widest" => one("letterSpacing", text("0.1em")),
        "border" => Some(vec![("borderWidth", px(1.0)), ("borderStyle", text("solid"))]),
        "border-0" => one("borderWidth", px(0.0)),
        "border-2" => Some(vec![("borderWidth", px(2.0)), ("borderStyle", text("solid"))]),
        "border-4" => Some(vec![("borderWidth", px(4.0)), ("borderStyle", text("solid"))]),
        "mx-auto" => Some(vec![("marginLeft", text("auto")), ("marginRight", text("auto"))]),
        "my-auto" => Some(vec![("marginTop", text("auto")), ("marginBottom", text("auto"))]),
        "pointer-events-none" => one("pointerEvents", text("none")),
        "select-none" => one("userSelect", text("none")),
        "cursor-pointer" => one("cursor", text("pointer")),
        "object-cover" => one("objectFit", text("cover")),
        "object-contain" => one("objectFit", text("contain")),
        _ => None,
    }
}

fn color(token: &str) -> Option<Vec<Declaration>> {
    let caps = COLOR_RE.captures(token)?;
    let property = match &caps[1] {
        "bg" => "backgroundColor",
        "text" => "color",
        _ => "borderColor",
    };
    let name = &caps[2];
    let value = match caps.get(3) {
        Some(shade) => palette_color(name, shade.as_str().parse().ok()?)?,
        None => match name {
            "white" => "#ffffff",
            "black" => "#000000",
            "transparent" => "transparent",
            "current" => "currentColor",
            _ => return None,
        },
    };
    Some(vec![(property, text(value))])
}

/// `4` → 16px, `0.5` → 2px, `px` → 1px, fractions → percentages.
fn spacing_value(value: &str) -> Option<JsExpr> {
    if value == "px" {
        return Some(px(1.0));
    }
    if let Some((num, den)) = value.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(text(&format!("{}%", crate::emit::format_number(num / den * 100.0))));
    }
    let n: f64 = value.parse().ok()?;
    if n < 0.0 || (n * 2.0).fract() != 0.0 {
        return None;
    }
    Some(px(n * 4.0))
}

fn scale(token: &str) -> Option<Vec<Declaration>> {
    let caps = SCALE_RE.captures(token)?;
    let negative = !caps[1].is_empty();
    let prefix = &caps[2];
    let raw = &caps[3];
    let sizing = matches!(prefix, "w" | "h" | "min-w" | "min-h" | "max-w" | "max-h");

    let value = match raw {
        "full" => text("100%"),
        "auto" if !sizing || prefix == "w" || prefix == "h" => text("auto"),
        "screen" if prefix.ends_with('w') => text("100vw"),
        "screen" if prefix.ends_with('h') => text("100vh"),
        _ => spacing_value(raw)?,
    };
    let value = match (negative, value) {
        (true, JsExpr::Number(n)) => JsExpr::Number(-n),
        (true, _) => return None,
        (false, value) => value,
    };

    let properties: &[&'static str] = match prefix {
        "p" => &["padding"],
        "px" => &["paddingLeft", "paddingRight"],
        "py" => &["paddingTop", "paddingBottom"],
        "pt" => &["paddingTop"],
        "pr" => &["paddingRight"],
        "pb" => &["paddingBottom"],
        "pl" => &["paddingLeft"],
        "m" => &["margin"],
        "mx" => &["marginLeft", "marginRight"],
        "my" => &["marginTop", "marginBottom"],
        "mt" => &["marginTop"],
        "mr" => &["marginRight"],
        "mb" => &["marginBottom"],
        "ml" => &["marginLeft"],
        "gap" => &["gap"],
        "gap-x" => &["columnGap"],
        "gap-y" => &["rowGap"],
        "w" => &["width"],
        "h" => &["height"],
        "min-w" => &["minWidth"],
        "min-h" => &["minHeight"],
        "max-w" => &["maxWidth"],
        "max-h" => &["maxHeight"],
        "top" => &["top"],
        "right" => &["right"],
        "bottom" => &["bottom"],
        "left" => &["left"],
        "inset" => &["top", "right", "bottom", "left"],
        "inset-x" => &["left", "right"],
        "inset-y" => &["top", "bottom"],
        _ => return None,
    };
    Some(properties.iter().map(|p| (*p, value.clone())).collect())
}

fn typography(token: &str) -> Option<Vec<Declaration>> {
    if let Some(size) = token.strip_prefix("text-") {
        let px_size = match size {
            "xs" => 12.0,
            "sm" => 14.0,
            "base" => 16.0,
            "lg" => 18.0,
            "xl" => 20.0,
            "2xl" => 24.0,
            "3xl" => 30.0,
            "4xl" => 36.0,
            "5xl" => 48.0,
            "6xl" => 60.0,
            "7xl" => 72.0,
            "8xl" => 96.0,
            "9xl" => 128.0,
            _ => return None,
        };
        return Some(vec![("fontSize", px(px_size))]);
    }
    if let Some(weight) = token.strip_prefix("font-") {
        let value = match weight {
            "thin" => 100.0,
            "extralight" => 200.0,
            "light" => 300.0,
            "normal" => 400.0,
            "medium" => 500.0,
            "semibold" => 600.0,
            "bold" => 700.0,
            "extrabold" => 800.0,
            "black" => 900.0,
            "sans" => return Some(vec![("fontFamily", text("ui-sans-serif, system-ui, sans-serif"))]),
            "serif" => return Some(vec![("fontFamily", text("ui-serif, Georgia, serif"))]),
            "mono" => return Some(vec![("fontFamily", text("ui-monospace, monospace"))]),
            _ => return None,
        };
        return Some(vec![("fontWeight", px(value))]);
    }
    None
}

fn decoration(token: &str) -> Option<Vec<Declaration>> {
    if token == "rounded" || token.starts_with("rounded-") {
        let radius = match token.strip_prefix("rounded").unwrap_or_default() {
            "" => 4.0,
            "-none" => 0.0,
            "-sm" => 2.0,
            "-md" => 6.0,
            "-lg" => 8.0,
            "-xl" => 12.0,
            "-2xl" => 16.0,
            "-3xl" => 24.0,
            "-full" => 9999.0,
            _ => return None,
        };
        return Some(vec![("borderRadius", px(radius))]);
    }
    if token == "shadow" || token.starts_with("shadow-") {
        let shadow = match token {
            "shadow-sm" => "0 1px 2px 0 rgba(0, 0, 0, 0.05)",
            "shadow" => "0 1px 3px 0 rgba(0, 0, 0, 0.1), 0 1px 2px -1px rgba(0, 0, 0, 0.1)",
            "shadow-md" => "0 4px 6px -1px rgba(0, 0, 0, 0.1), 0 2px 4px -2px rgba(0, 0, 0, 0.1)",
            "shadow-lg" => "0 10px 15px -3px rgba(0, 0, 0, 0.1), 0 4px 6px -4px rgba(0, 0, 0, 0.1)",
            "shadow-xl" => "0 20px 25px -5px rgba(0, 0, 0, 0.1), 0 8px 10px -6px rgba(0, 0, 0, 0.1)",
            "shadow-2xl" => "0 25px 50px -12px rgba(0, 0, 0, 0.25)",
            "shadow-none" => "none",
            _ => return None,
        };
        return Some(vec![("boxShadow", text(shadow))]);
    }
    if let Some(level) = token.strip_prefix("opacity-") {
        let level: u32 = level.parse().ok()?;
        if level > 100 {
            return None;
        }
        return Some(vec![("opacity", px(level as f64 / 100.0))]);
    }
    if let Some(z) = token.strip_prefix("z-") {
        let z: u32 = z.parse().ok()?;
        return Some(vec![("zIndex", px(z as f64))]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(token: &str) -> (&'static str, JsExpr) {
        let mut decls = resolve_utility(token).unwrap_or_else(|| panic!("{} unresolved", token));
        assert_eq!(decls.len(), 1, "{}", token);
        decls.remove(0)
    }

    #[test]
    fn spacing_scale_is_four_pixels() {
        assert_eq!(single("p-4"), ("padding", JsExpr::Number(16.0)));
        assert_eq!(single("mt-0.5"), ("marginTop", JsExpr::Number(2.0)));
        assert_eq!(single("gap-6"), ("gap", JsExpr::Number(24.0)));
        assert_eq!(single("-ml-2"), ("marginLeft", JsExpr::Number(-8.0)));
        assert_eq!(single("w-1/2"), ("width", JsExpr::str("50%")));
        assert_eq!(resolve_utility("px-2").map(|d| d.len()), Some(2));
    }

    #[test]
    fn palette_and_typography() {
        assert_eq!(single("bg-blue-500"), ("backgroundColor", JsExpr::str("#3b82f6")));
        assert_eq!(single("text-white"), ("color", JsExpr::str("#ffffff")));
        assert_eq!(single("text-4xl"), ("fontSize", JsExpr::Number(36.0)));
        assert_eq!(single("font-semibold"), ("fontWeight", JsExpr::Number(600.0)));
        assert_eq!(single("rounded-lg"), ("borderRadius", JsExpr::Number(8.0)));
        assert_eq!(single("opacity-75"), ("opacity", JsExpr::Number(0.75)));
    }

    #[test]
    fn unknown_and_variant_tokens_stay_unresolved() {
        for token in ["hover:bg-blue-500", "md:flex", "w-[200px]", "bg-brand-500", "text-teal-950", "animate-spin"] {
            assert!(resolve_utility(token).is_none(), "{}", token);
        }
    }
}
