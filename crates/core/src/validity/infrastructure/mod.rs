pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_face_detector;
pub mod scene_change_check;
pub mod single_face_check;
