//! Interactive drawing tools for chart annotations.

mod hit;
mod state;
mod types;

pub use hit::{hit_test, HANDLE_RADIUS_PX};
pub use state::{DrawingManager, DrawingTool, InteractionContext, ToolState};
pub use types::{
    default_fib_levels, fib_price, Bracket, ControlPoint, Drawing, DrawingId, DrawingKind, FibLevel,
    LineStyle, Side, Stroke, DEFAULT_DRAWING_COLOR, PREVIEW_DRAWING_COLOR, STOP_ZONE_COLOR,
    TARGET_ZONE_COLOR,
};
