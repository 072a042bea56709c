pub mod json_embedding_cache;
pub mod onnx_embedding_extractor;
pub mod onnx_face_locator;
