use std::fmt;

/// Pixel values of a single panel, in file order
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    Integer(Vec<i64>),
    Real(Vec<f64>),
}

impl PixelArray {
    pub fn len(&self) -> usize {
        match self {
            PixelArray::Integer(data) => data.len(),
            PixelArray::Real(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sum(&self) -> TotalCounts {
        match self {
            PixelArray::Integer(data) => TotalCounts::Integer(data.iter().sum()),
            PixelArray::Real(data) => TotalCounts::Real(data.iter().sum()),
        }
    }
}

/// Sum of pixel values; stays integral unless a floating panel contributed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalCounts {
    Integer(i64),
    Real(f64),
}

impl TotalCounts {
    fn add(self, other: TotalCounts) -> TotalCounts {
        match (self, other) {
            (TotalCounts::Integer(a), TotalCounts::Integer(b)) => TotalCounts::Integer(a + b),
            (a, b) => TotalCounts::Real(a.as_f64() + b.as_f64()),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            TotalCounts::Integer(v) => v as f64,
            TotalCounts::Real(v) => v,
        }
    }
}

impl fmt::Display for TotalCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalCounts::Integer(v) => write!(f, "{}", v),
            TotalCounts::Real(v) => write!(f, "{}", v),
        }
    }
}

/// Raw image data, one pixel array per detector panel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawData {
    panels: Vec<PixelArray>,
}

impl RawData {
    pub fn new(panels: Vec<PixelArray>) -> Self {
        Self { panels }
    }

    pub fn panels(&self) -> &[PixelArray] {
        &self.panels
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Sum over every pixel of every panel
    pub fn total_counts(&self) -> TotalCounts {
        self.panels
            .iter()
            .map(PixelArray::sum)
            .fold(TotalCounts::Integer(0), TotalCounts::add)
    }
}
