pub mod bytetrack_tracker;
pub mod math;
pub mod onnx_person_detector;
pub mod onnx_session;
pub mod tracked_frame_stream;
pub mod yolo;
