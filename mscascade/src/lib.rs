// chemistry module
pub mod chemistry {
    pub mod constants;
}

// data module
pub mod data {
    pub mod point;
    pub mod range;
    pub mod scan;
    pub mod trace;
    pub mod property;
    pub mod feature;
    pub mod spectrum;
    pub mod container;
}

// algorithm module
pub mod algorithm {
    pub mod math;
    pub mod savitzky_golay;
    pub mod morphology;
    pub mod noise;
    pub mod graph;
}

// processing module
pub mod processing {
    pub mod background;
    pub mod baseline;
    pub mod noise_reduction;
    pub mod feature_builder;
    pub mod quality;
}

// deconvolution module
pub mod deconvolution {
    pub mod biehman;
    pub mod savitzky_golay;
    pub mod deconvolver;
}

// identification module
pub mod identification {
    pub mod pseudo;
    pub mod isotope_graph;
    pub mod isotope_rec;
    pub mod isotope_finder;
    pub mod isotope_filter;
    pub mod adduct;
}

pub mod errors;
pub mod params;
pub mod task;
