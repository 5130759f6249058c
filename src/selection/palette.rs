use crate::input::cache::hash_bytes;

pub const PALETTE: &[&str] = &[
    "#fd7f6f", "#7eb0d5", "#b2e061", "#bd7ebe", "#ffb55a", "#ffee65", "#beb9db", "#fdcce5",
    "#8bd3c7", "#e60049", "#0bb4ff", "#50e991", "#e6d800", "#9b19f5", "#ffa300", "#dc0ab4",
];

/// Color for a newly created selection group, by its position in the display
/// order at creation time. Never recomputed for existing groups.
pub fn selection_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Stable color for built-in categories, by hash of the name. Kept separate from
/// `selection_color` so existing datasets keep their colors.
pub fn default_color(name: &str) -> &'static str {
    PALETTE[(hash_bytes(name.as_bytes()) % PALETTE.len() as u64) as usize]
}
