//! Beat subdivisions for timed generators.

/// Smallest allowed steps-per-beat value: one step per whole note.
pub const MIN_STEPS_PER_BEAT: f32 = 0.25;

/// A named beat subdivision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StepDivision {
    Whole,
    Half,
    Quarter,
    DottedQuarter,
    #[default]
    Eighth,
    Triplet,
    Sixteenth,
    ThirtySecond,
}

impl StepDivision {
    /// All divisions from longest to shortest.
    pub const ALL: [StepDivision; 8] = [
        StepDivision::Whole,
        StepDivision::Half,
        StepDivision::Quarter,
        StepDivision::DottedQuarter,
        StepDivision::Eighth,
        StepDivision::Triplet,
        StepDivision::Sixteenth,
        StepDivision::ThirtySecond,
    ];

    /// Steps per quarter-note beat.
    pub fn steps_per_beat(&self) -> f32 {
        match self {
            StepDivision::Whole => 0.25,
            StepDivision::Half => 0.5,
            StepDivision::Quarter => 1.0,
            StepDivision::DottedQuarter => 1.5,
            StepDivision::Eighth => 2.0,
            StepDivision::Triplet => 3.0,
            StepDivision::Sixteenth => 4.0,
            StepDivision::ThirtySecond => 8.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepDivision::Whole => "1/1",
            StepDivision::Half => "1/2",
            StepDivision::Quarter => "1/4",
            StepDivision::DottedQuarter => "1/4.",
            StepDivision::Eighth => "1/8",
            StepDivision::Triplet => "1/8T",
            StepDivision::Sixteenth => "1/16",
            StepDivision::ThirtySecond => "1/32",
        }
    }

    /// Next shorter division, saturating at the shortest.
    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|d| d == self).unwrap_or(0);
        Self::ALL[(i + 1).min(Self::ALL.len() - 1)]
    }

    /// Next longer division, saturating at the longest.
    pub fn prev(&self) -> Self {
        let i = Self::ALL.iter().position(|d| d == self).unwrap_or(0);
        Self::ALL[i.saturating_sub(1)]
    }
}
