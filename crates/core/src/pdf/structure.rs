use std::collections::BTreeMap;

use super::layout::StyledRun;

/// Size assumed for body text when a document has no measurable runs.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Rounds a font size to the nearest half point.
pub fn round_font_size(size: f32) -> f32 {
    (size * 2.0).round() / 2.0
}

fn half_points(size: f32) -> u32 {
    (size.max(0.0) * 2.0).round() as u32
}

/// Document-wide font statistics.
///
/// The body size is the rounded size covering the most characters; headings
/// are recognised by how much larger than it they are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStructuralInfo {
    pub common_font_size: f32,
    pub max_font_size: f32,
    /// Character coverage per rounded size, keyed in half points
    coverage: BTreeMap<u32, usize>,
}

impl Default for DocumentStructuralInfo {
    fn default() -> Self {
        Self { common_font_size: DEFAULT_FONT_SIZE, max_font_size: DEFAULT_FONT_SIZE, coverage: BTreeMap::new() }
    }
}

impl DocumentStructuralInfo {
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a StyledRun>) -> Self {
        Self::from_sizes(runs.into_iter().map(|run| (run.font_size, run.text.trim().chars().count())))
    }

    /// Builds statistics from `(font size, character count)` pairs.
    pub fn from_sizes(sizes: impl IntoIterator<Item = (f32, usize)>) -> Self {
        let mut coverage: BTreeMap<u32, usize> = BTreeMap::new();
        for (size, chars) in sizes {
            if chars == 0 || !size.is_finite() || size <= 0.0 {
                continue;
            }
            *coverage.entry(half_points(size)).or_default() += chars;
        }

        let mut common: Option<(u32, usize)> = None;
        for (&key, &chars) in &coverage {
            // strictly greater keeps the smaller size on ties
            if common.is_none_or(|(_, best)| chars > best) {
                common = Some((key, chars));
            }
        }

        let Some((common_key, _)) = common else {
            return Self::default();
        };
        let max_key = coverage.keys().next_back().copied().unwrap_or(common_key);

        Self { common_font_size: common_key as f32 / 2.0, max_font_size: max_key as f32 / 2.0, coverage }
    }

    /// Characters drawn at `size` after rounding.
    pub fn coverage(&self, size: f32) -> usize {
        self.coverage.get(&half_points(size)).copied().unwrap_or(0)
    }

    /// Rounded sizes with their character coverage, smallest first.
    pub fn font_size_frequency(&self) -> impl Iterator<Item = (f32, usize)> + '_ {
        self.coverage.iter().map(|(&key, &chars)| (key as f32 / 2.0, chars))
    }

    /// How much larger than body text `size` is drawn.
    pub fn ratio(&self, size: f32) -> f32 {
        round_font_size(size) / self.common_font_size
    }
}
