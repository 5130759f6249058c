use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::PlotPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Label offset from the annotated point, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub ax: f64,
    pub ay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowStyle {
    pub show_arrow: bool,
    pub arrow_head: u8,
    pub arrow_size: f64,
    pub arrow_width: f64,
    pub arrow_color: String,
}

impl Default for ArrowStyle {
    fn default() -> Self {
        Self {
            show_arrow: true,
            arrow_head: 1,
            arrow_size: 1.0,
            arrow_width: 1.0,
            arrow_color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: f64,
    pub color: String,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "Arial, sans-serif".to_string(),
            size: 15.0,
            color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub title: String,
    pub position: Position,
    pub text: String,
    pub arrow: ArrowStyle,
    pub anchor: Anchor,
    pub font: Font,
}

impl Annotation {
    pub fn new(title: &str, x: f64, y: f64) -> Self {
        Self {
            title: title.to_string(),
            position: Position { x, y },
            text: title.to_string(),
            arrow: ArrowStyle::default(),
            anchor: Anchor { ax: -20.0, ay: -20.0 },
            font: Font::default(),
        }
    }
}

/// A single-field edit; everything else on the annotation is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEdit {
    Text(String),
    Offset(Anchor),
}

pub fn annotation_title(point: &PlotPoint) -> String {
    match point
        .gene_name
        .as_deref()
        .and_then(|g| crate::model::record::split_aliases(g).next())
    {
        Some(gene) => format!("{}({})", gene, point.protein_id),
        None => point.protein_id.clone(),
    }
}

/// Annotations keyed by title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    entries: BTreeMap<String, Annotation>,
}

impl AnnotationSet {
    /// First writer wins: an existing key is left untouched and `false` returned.
    pub fn add(&mut self, text: &str, x: f64, y: f64) -> bool {
        if self.entries.contains_key(text) {
            return false;
        }
        self.entries
            .insert(text.to_string(), Annotation::new(text, x, y));
        true
    }

    pub fn update(&mut self, key: &str, edit: AnnotationEdit) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        match edit {
            AnnotationEdit::Text(text) => entry.text = text,
            AnnotationEdit::Offset(anchor) => entry.anchor = anchor,
        }
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns how many annotations were inserted.
    pub fn bulk_annotate(&mut self, points: &[PlotPoint]) -> usize {
        points
            .iter()
            .filter(|p| self.add(&annotation_title(p), p.x, p.y))
            .count()
    }

    pub fn get(&self, key: &str) -> Option<&Annotation> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/selection/annotation.rs"]
mod tests;
