// Purpose: To store constants that are used across the pipeline
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const ISOTOPE_SPACING: f64 = 1.0033; // Average 13C - 12C spacing, unified atomic mass unit
pub const PPM: f64 = 1e6; // Parts per million divisor

// Signal levels
pub const MIN_ABUNDANCE: f64 = 0.0; // Intensity of zero-intensity anchor points
pub const BASE_INTENSITY: f64 = 10.0; // Offset added after baseline subtraction
