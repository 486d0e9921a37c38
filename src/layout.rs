//! Geometry for widgets managed by layouts.
//!
//! A top-level widget and everything reachable through installed layouts is
//! mirrored into a throwaway taffy tree, laid out, and the resulting
//! rectangles written back. Positions are relative to the parent widget.

use taffy::prelude::*;

use crate::error::WidgetResult;
use crate::handle::{Kind, ObjectId};
use crate::toolkit::Toolkit;

/// Inner margin of a box layout, in pixels.
pub const LAYOUT_MARGIN: f32 = 9.0;
/// Space between consecutive box layout items, in pixels.
pub const LAYOUT_SPACING: f32 = 6.0;
/// Size of a top-level widget that never had `SetSize` called.
pub const DEFAULT_TOP_LEVEL_SIZE: (f32, f32) = (640.0, 480.0);
pub const LABEL_HEIGHT_HINT: f32 = 16.0;
pub const PUSH_BUTTON_HEIGHT_HINT: f32 = 32.0;

/// Widget rectangle returned to FFI callers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Lay out the window containing `widget`.
pub fn update_window(toolkit: &mut Toolkit, widget: ObjectId) -> WidgetResult<()> {
    let root = toolkit.top_level(widget)?;
    if !toolkit.kind(root)?.is_widget() {
        return Ok(());
    }

    let mut tree: TaffyTree<()> = TaffyTree::new();
    let mut placed = Vec::new();
    let Some(root_node) = build_node(toolkit, &mut tree, root, true, &mut placed)? else {
        return Ok(());
    };

    let (width, height) = top_level_size(toolkit, root)?;
    let available_space = Size {
        width: AvailableSpace::Definite(width),
        height: AvailableSpace::Definite(height),
    };
    if let Err(e) = tree.compute_layout(root_node, available_space) {
        log::debug!("update_window: layout of {root} failed: {e:?}");
        return Ok(());
    }

    for (id, node) in placed {
        let Ok(layout) = tree.layout(node) else {
            continue;
        };
        let geometry = Geometry {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
        };
        toolkit.set_geometry(id, geometry)?;
    }
    Ok(())
}

/// Lay out every top-level widget.
pub fn update_all(toolkit: &mut Toolkit) -> WidgetResult<()> {
    for root in toolkit.top_level_widgets() {
        update_window(toolkit, root)?;
    }
    Ok(())
}

fn top_level_size(toolkit: &Toolkit, root: ObjectId) -> WidgetResult<(f32, f32)> {
    Ok(match toolkit.widget(root)?.fixed_size {
        Some((w, h)) => (w as f32, h as f32),
        None => DEFAULT_TOP_LEVEL_SIZE,
    })
}

fn build_node(
    toolkit: &Toolkit,
    tree: &mut TaffyTree<()>,
    id: ObjectId,
    is_root: bool,
    placed: &mut Vec<(ObjectId, NodeId)>,
) -> WidgetResult<Option<NodeId>> {
    let kind = toolkit.kind(id)?;
    let widget = toolkit.widget(id)?;
    if !is_root && !widget.visible {
        return Ok(None);
    }

    let mut style = Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        flex_shrink: 0.0,
        ..Default::default()
    };

    if is_root {
        let (w, h) = top_level_size(toolkit, id)?;
        style.size = Size { width: length(w), height: length(h) };
    } else if let Some((w, h)) = widget.fixed_size {
        style.size = Size { width: length(w as f32), height: length(h as f32) };
        style.align_self = Some(AlignSelf::FlexStart);
    } else {
        match kind {
            Kind::Label => style.size.height = length(LABEL_HEIGHT_HINT),
            Kind::PushButton => style.size.height = length(PUSH_BUTTON_HEIGHT_HINT),
            _ => style.flex_grow = 1.0,
        }
    }

    let mut children = Vec::new();
    if let Some(layout) = widget.layout {
        if toolkit.kind(layout)? == Kind::VBoxLayout {
            style.padding = Rect {
                left: length(LAYOUT_MARGIN),
                right: length(LAYOUT_MARGIN),
                top: length(LAYOUT_MARGIN),
                bottom: length(LAYOUT_MARGIN),
            };
            style.gap = Size { width: length(0.0), height: length(LAYOUT_SPACING) };
        }
        for &item in toolkit.layout_items(layout)? {
            if let Some(child) = build_node(toolkit, tree, item, false, placed)? {
                children.push(child);
            }
        }
    }

    let node = match tree.new_with_children(style, &children) {
        Ok(node) => node,
        Err(e) => {
            log::debug!("build_node: taffy node for {id} failed: {e:?}");
            return Ok(None);
        }
    };
    placed.push((id, node));
    Ok(Some(node))
}
