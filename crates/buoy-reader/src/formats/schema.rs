/// ADCP marker columns read from the first row of a currents file.
pub const HEAD_DEPTH: &str = "HeadDepth";
pub const BLANKING_DISTANCE: &str = "BlankingDistance";
pub const BIN_SPACING: &str = "BinSpacing";

pub const MARKER_COLUMNS: [&str; 3] = [HEAD_DEPTH, BLANKING_DISTANCE, BIN_SPACING];

/// Vertical distance between consecutive depth bins, in metres.
pub const BIN_STRIDE_M: f64 = 4.0;

pub const CURRENT_SPEED: &str = "current_speed";
pub const CURRENT_DIRECTION: &str = "current_direction";

pub const SURFACETEMP_RENAMES: &[(&str, &str)] = &[(
    "Surface Temperature (C)",
    "surfacetemp - Surface Temperature (C)",
)];

pub const GILL_RENAMES: &[(&str, &str)] = &[
    ("Horizontal Speed (m/s)", "gill_horizontal_wind_speed"),
    ("Horizontal Direction (deg)", "gill_horizontal_wind_direction"),
];

/// Preamble lines before the header row of a lidar STA export.
pub const STA_HEADER_LINE: usize = 41;

/// 1-based bin index.
pub fn velocity_column(index: usize) -> String {
    format!("Vel{index} (mm/s)")
}

/// 1-based bin index.
pub fn direction_column(index: usize) -> String {
    format!("Dir{index} (deg)")
}
