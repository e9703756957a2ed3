//! Platform layer: the native window that stands in for a browser canvas,
//! its Vulkan surface, and keyboard/mouse input state.

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, get_required_extensions};

pub use winit::event::{Event, WindowEvent};
pub use winit::event_loop::EventLoop;
