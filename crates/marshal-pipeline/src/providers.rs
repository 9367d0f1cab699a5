//! Provider traits for the pipeline's external collaborators.
//!
//! The pipeline never talks to the OS directly. A host wires in concrete
//! implementations (UI Automation, an OCR engine, a capture backend, the
//! window manager); tests substitute in-memory fakes. Every call here is a
//! blocking OS call expected to complete in low hundreds of milliseconds.

use marshal_core::types::WindowHandle;
use serde::{Deserialize, Serialize};

/// One node of an application's accessibility/structural tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiElement {
    pub name: String,
    pub automation_id: String,
    pub help_text: String,
    pub class_name: String,
    pub control_type: String,
    pub children: Vec<UiElement>,
}

impl UiElement {
    pub fn named(name: &str, control_type: &str) -> Self {
        Self {
            name: name.to_string(),
            control_type: control_type.to_string(),
            ..Default::default()
        }
    }
}

/// Pixel-space rectangle for recognized text or elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Center point, the natural click target.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A word produced by the text-recognition provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// A captured image region for the visual fallback tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Structural-inspection provider: a queryable tree of named, typed
/// elements for a given window.
pub trait StructureProvider: Send + Sync {
    fn element_tree(&self, target: &str) -> Result<UiElement, String>;
}

/// Text-recognition provider: words with bounding boxes and confidence
/// for the given window's rendered content.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, target: &str) -> Result<Vec<RecognizedWord>, String>;
}

/// Screen-capture provider for the visual fallback tier.
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, target: &str) -> Result<CapturedImage, String>;
}

/// Window/application registry: titles, handles, and foreground state.
pub trait WindowRegistry: Send + Sync {
    fn foreground(&self) -> Option<WindowHandle>;
    fn title(&self, handle: WindowHandle) -> String;
    fn is_window(&self, handle: WindowHandle) -> bool;
    /// Plain foreground switch; fails when this process does not own the
    /// foreground.
    fn set_foreground(&self, handle: WindowHandle) -> bool;
    /// Privilege-borrowing switch (attach to the owning input thread,
    /// raise, detach). Attempted once when the plain switch fails.
    fn force_set_foreground(&self, handle: WindowHandle) -> bool;
}
