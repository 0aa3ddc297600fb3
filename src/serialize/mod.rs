pub mod scan;

pub use scan::{from_dict, to_dict, ExposureTime, ScanDict};
