use crate::context::GraphicContext;
use crate::element::ElementKind;
use crate::geometry::BoundingBox;
use crate::util::color_to_name;
use std::collections::BTreeMap;
use std::fmt;

/// Element counts and extent of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStats {
    pub markers: usize,
    pub erasers: usize,
    pub photos: usize,
    pub quads: usize,
    /// Marker strokes per color name.
    pub colors: BTreeMap<&'static str, usize>,
    /// `None` for an empty document.
    pub bounds: Option<BoundingBox>,
}

impl DocumentStats {
    pub fn collect(context: &GraphicContext) -> Self {
        let mut stats = Self::default();
        for element in context.elements_in_creation_order() {
            match element.kind() {
                ElementKind::Marker => stats.markers += 1,
                ElementKind::Eraser => stats.erasers += 1,
                ElementKind::Photo => stats.photos += 1,
            }
            if let Some(stroke) = element.as_stroke() {
                stats.quads += stroke.quads().len();
                if element.kind() == ElementKind::Marker {
                    *stats.colors.entry(color_to_name(&stroke.color)).or_default() += 1;
                }
            }
        }
        if !context.is_empty() {
            stats.bounds = Some(context.bounds());
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.markers + self.erasers + self.photos
    }
}

impl fmt::Display for DocumentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "elements: {}", self.total())?;
        writeln!(f, "  markers: {}", self.markers)?;
        writeln!(f, "  erasers: {}", self.erasers)?;
        writeln!(f, "  photos:  {}", self.photos)?;
        writeln!(f, "quads: {}", self.quads)?;
        if !self.colors.is_empty() {
            let colors: Vec<String> = self
                .colors
                .iter()
                .map(|(name, count)| format!("{name} x{count}"))
                .collect();
            writeln!(f, "colors: {}", colors.join(", "))?;
        }
        match &self.bounds {
            Some(b) => write!(
                f,
                "bounds: ({:.1}, {:.1}) - ({:.1}, {:.1})",
                b.min_x, b.min_y, b.max_x, b.max_y
            ),
            None => write!(f, "bounds: empty"),
        }
    }
}
