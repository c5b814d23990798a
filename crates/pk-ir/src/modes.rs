//! Note-selection and arpeggio ordering policies.

/// Which notes win when more are held than there are voices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PriorityMode {
    /// Highest pitches first
    #[default]
    High,
    /// Lowest pitches first
    Low,
    /// Most recently pressed first
    Last,
}

impl PriorityMode {
    pub const COUNT: usize = 3;
    pub const ALL: [PriorityMode; Self::COUNT] =
        [PriorityMode::High, PriorityMode::Low, PriorityMode::Last];

    /// Mode at `index`, wrapping modulo the mode count.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }

    pub fn index(&self) -> usize {
        match self {
            PriorityMode::High => 0,
            PriorityMode::Low => 1,
            PriorityMode::Last => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PriorityMode::High => "High",
            PriorityMode::Low => "Low",
            PriorityMode::Last => "Last",
        }
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(&self) -> Self {
        Self::from_index(self.index() + Self::COUNT - 1)
    }
}

/// Arpeggiator note ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ArpMode {
    #[default]
    Up,
    Down,
    UpDown,
    DownUp,
    /// Order in which the notes were pressed
    Played,
    /// Uniformly random pick on every step
    Random,
}

impl ArpMode {
    pub const COUNT: usize = 6;
    pub const ALL: [ArpMode; Self::COUNT] = [
        ArpMode::Up,
        ArpMode::Down,
        ArpMode::UpDown,
        ArpMode::DownUp,
        ArpMode::Played,
        ArpMode::Random,
    ];

    /// Mode at `index`, wrapping modulo the mode count.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }

    pub fn index(&self) -> usize {
        match self {
            ArpMode::Up => 0,
            ArpMode::Down => 1,
            ArpMode::UpDown => 2,
            ArpMode::DownUp => 3,
            ArpMode::Played => 4,
            ArpMode::Random => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArpMode::Up => "Up",
            ArpMode::Down => "Down",
            ArpMode::UpDown => "Up/Down",
            ArpMode::DownUp => "Down/Up",
            ArpMode::Played => "Played",
            ArpMode::Random => "Random",
        }
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(&self) -> Self {
        Self::from_index(self.index() + Self::COUNT - 1)
    }
}
