/// Which quantity drives the X axis of the metrics chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxis {
    /// Seconds since the first recorded point of each series.
    Relative,
    /// The recorded step index.
    Step,
    /// Absolute wall-clock time.
    WallClock,
}

impl Default for XAxis {
    fn default() -> Self {
        XAxis::Relative
    }
}

impl XAxis {
    pub fn label(&self) -> &'static str {
        match self {
            XAxis::Relative => "Time (Relative)",
            XAxis::Step => "Step",
            XAxis::WallClock => "Time (Wall)",
        }
    }

    pub const ALL: [XAxis; 3] = [XAxis::Relative, XAxis::Step, XAxis::WallClock];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Line,
    Bar,
}

impl ChartType {
    pub fn label(&self) -> &'static str {
        match self {
            ChartType::Line => "Line",
            ChartType::Bar => "Bar",
        }
    }
}
