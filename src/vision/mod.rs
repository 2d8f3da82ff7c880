pub mod camera;
pub mod controller;
pub mod frame;
pub mod gesture;
pub mod loop_worker;
pub mod recognizer;

pub use camera::{CameraDevice, CameraLease, SyntheticCamera};
pub use controller::{InputController, InputKind, InputStatus};
pub use frame::VideoFrame;
pub use gesture::{classify, Gesture, GestureEvent, GestureSample};
pub use recognizer::{FaceLandmarker, GestureRecognizer, InputBackend, Landmark};
