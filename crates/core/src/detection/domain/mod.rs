pub mod detection;
pub mod tracked_detector;
