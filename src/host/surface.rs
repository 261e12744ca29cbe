use serde::{Deserialize, Serialize};

/// On-screen surfaces owned by the window host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Surface {
    /// Main control window
    ControlPanel,
    /// Floating webcam preview
    CameraBubble,
    /// Transparent full-screen cursor highlight
    CursorOverlay,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::ControlPanel, Surface::CameraBubble, Surface::CursorOverlay];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Primary display geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
    /// Display area minus task bars and docks
    pub work_area_width: u32,
    pub work_area_height: u32,
    pub scale_factor: f64,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            work_area_width: 1920,
            work_area_height: 1040,
            scale_factor: 1.0,
        }
    }
}

/// How a surface is created
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSpec {
    pub surface: Surface,
    pub bounds: Bounds,
    pub frameless: bool,
    pub transparent: bool,
    pub always_on_top: bool,
    /// Mouse events pass through to whatever is underneath
    pub click_through: bool,
    pub focusable: bool,
    pub visible: bool,
}

const CONTROL_PANEL_SIZE: (u32, u32) = (1000, 800);
const CAMERA_BUBBLE_SIZE: u32 = 300;
const CAMERA_BUBBLE_MARGIN: u32 = 320;

impl SurfaceSpec {
    pub fn for_surface(surface: Surface, display: &DisplayInfo) -> Self {
        match surface {
            Surface::ControlPanel => Self {
                surface,
                bounds: Bounds {
                    x: (display.work_area_width.saturating_sub(CONTROL_PANEL_SIZE.0) / 2) as i32,
                    y: (display.work_area_height.saturating_sub(CONTROL_PANEL_SIZE.1) / 2) as i32,
                    width: CONTROL_PANEL_SIZE.0,
                    height: CONTROL_PANEL_SIZE.1,
                },
                frameless: false,
                transparent: false,
                always_on_top: false,
                click_through: false,
                focusable: true,
                visible: true,
            },
            Surface::CameraBubble => Self {
                surface,
                bounds: Bounds {
                    x: display.work_area_width.saturating_sub(CAMERA_BUBBLE_MARGIN) as i32,
                    y: display.work_area_height.saturating_sub(CAMERA_BUBBLE_MARGIN) as i32,
                    width: CAMERA_BUBBLE_SIZE,
                    height: CAMERA_BUBBLE_SIZE,
                },
                frameless: true,
                transparent: true,
                always_on_top: true,
                click_through: false,
                focusable: true,
                visible: false,
            },
            // Hidden by default so it never blocks the screen
            Surface::CursorOverlay => Self {
                surface,
                bounds: Bounds {
                    x: 0,
                    y: 0,
                    width: display.width,
                    height: display.height,
                },
                frameless: true,
                transparent: true,
                always_on_top: true,
                click_through: true,
                focusable: false,
                visible: false,
            },
        }
    }

    /// Specs for every surface on the given display
    pub fn layout(display: &DisplayInfo) -> Vec<SurfaceSpec> {
        Surface::ALL
            .iter()
            .map(|surface| Self::for_surface(*surface, display))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_bubble_anchored_bottom_right() {
        let display = DisplayInfo::default();
        let spec = SurfaceSpec::for_surface(Surface::CameraBubble, &display);

        assert_eq!(spec.bounds.x, 1600);
        assert_eq!(spec.bounds.y, 720);
        assert_eq!((spec.bounds.width, spec.bounds.height), (300, 300));
        assert!(spec.always_on_top && !spec.visible);
    }

    #[test]
    fn test_cursor_overlay_covers_display_and_ignores_mouse() {
        let display = DisplayInfo::default();
        let spec = SurfaceSpec::for_surface(Surface::CursorOverlay, &display);

        assert_eq!((spec.bounds.width, spec.bounds.height), (1920, 1080));
        assert!(spec.click_through);
        assert!(!spec.focusable);
        assert!(!spec.visible);
    }

    #[test]
    fn test_layout_contains_every_surface() {
        let layout = SurfaceSpec::layout(&DisplayInfo::default());
        assert_eq!(layout.len(), 3);
        assert!(layout.iter().any(|s| s.surface == Surface::ControlPanel && s.visible));
    }
}
