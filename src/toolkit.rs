//! The object arena.
//!
//! Every object is a [`Node`] keyed by [`ObjectId`]. A node knows its parent
//! and its children in creation order; its [`Body`] holds the per-kind state.
//! Deleting a node deletes its whole subtree.

use std::collections::{HashMap, VecDeque};

use crate::bridge::{Handler, Slot};
use crate::error::{WidgetError, WidgetResult};
use crate::handle::{Kind, ObjectId};
use crate::layout::Geometry;

/// State shared by every widget kind.
#[derive(Debug, Default)]
pub struct WidgetData {
    pub visible: bool,
    pub window_title: String,
    /// Set by `SetSize`; the widget neither grows nor shrinks.
    pub fixed_size: Option<(i32, i32)>,
    /// Layout installed on this widget.
    pub layout: Option<ObjectId>,
    /// Layout this widget is an item of.
    pub managed_by: Option<ObjectId>,
    pub geometry: Geometry,
}

impl WidgetData {
    fn new(parent: Option<ObjectId>) -> Self {
        Self {
            // Children follow their parent; top-levels stay hidden until shown.
            visible: parent.is_some(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct LayoutData {
    /// Managed widgets, in display order.
    pub items: Vec<ObjectId>,
    /// Widget this layout is installed on.
    pub installed_on: Option<ObjectId>,
}

#[derive(Debug, Default)]
pub struct ButtonData {
    pub text: String,
    pub clicked: Slot,
}

/// Per-kind state. The variant is the object's kind and never changes.
#[derive(Debug)]
pub enum Body {
    Object,
    Application { running: bool },
    Widget(WidgetData),
    PushButton(WidgetData, ButtonData),
    Label(WidgetData, String),
    Layout(LayoutData),
    VBoxLayout(LayoutData),
}

impl Body {
    pub fn kind(&self) -> Kind {
        match self {
            Body::Object => Kind::Object,
            Body::Application { .. } => Kind::Application,
            Body::Widget(_) => Kind::Widget,
            Body::PushButton(..) => Kind::PushButton,
            Body::Label(..) => Kind::Label,
            Body::Layout(_) => Kind::Layout,
            Body::VBoxLayout(_) => Kind::VBoxLayout,
        }
    }

    pub fn widget(&self) -> Option<&WidgetData> {
        match self {
            Body::Widget(w) | Body::PushButton(w, _) | Body::Label(w, _) => Some(w),
            _ => None,
        }
    }

    fn widget_mut(&mut self) -> Option<&mut WidgetData> {
        match self {
            Body::Widget(w) | Body::PushButton(w, _) | Body::Label(w, _) => Some(w),
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<&LayoutData> {
        match self {
            Body::Layout(l) | Body::VBoxLayout(l) => Some(l),
            _ => None,
        }
    }

    fn layout_mut(&mut self) -> Option<&mut LayoutData> {
        match self {
            Body::Layout(l) | Body::VBoxLayout(l) => Some(l),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub id: ObjectId,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    pub destroyed: Slot,
    pub body: Body,
}

impl Node {
    pub fn kind(&self) -> Kind {
        self.body.kind()
    }
}

/// Queued input for the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Clicked(ObjectId),
    Quit(i32),
}

/// All live objects plus the application event queue.
#[derive(Debug)]
pub struct Toolkit {
    nodes: HashMap<ObjectId, Node>,
    next_id: usize,
    application: Option<ObjectId>,
    events: VecDeque<Event>,
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolkit {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            application: None,
            events: VecDeque::new(),
        }
    }

    fn allocate_id(&mut self) -> ObjectId {
        let raw = self.next_id;
        self.next_id += 1;
        // next_id starts at 1 and only grows.
        ObjectId::from_raw(raw).unwrap_or_else(|| unreachable!("handle counter wrapped"))
    }

    fn insert(&mut self, parent: Option<ObjectId>, body: Body) -> WidgetResult<ObjectId> {
        if let Some(parent) = parent {
            self.widget(parent)?;
        }
        let id = self.allocate_id();
        let kind = body.kind();
        self.nodes.insert(
            id,
            Node {
                id,
                parent,
                children: Vec::new(),
                destroyed: Slot::default(),
                body,
            },
        );
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.push(id);
        }
        log::debug!("created {kind} {id} (parent {parent:?})");
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub fn node(&self, id: ObjectId) -> WidgetResult<&Node> {
        self.nodes.get(&id).ok_or(WidgetError::StaleHandle(id))
    }

    fn node_mut(&mut self, id: ObjectId) -> WidgetResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(WidgetError::StaleHandle(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, id: ObjectId) -> WidgetResult<Kind> {
        Ok(self.node(id)?.kind())
    }

    pub fn class_name(&self, id: ObjectId) -> WidgetResult<&'static str> {
        Ok(self.kind(id)?.class_name())
    }

    pub fn application(&self) -> Option<ObjectId> {
        self.application
    }

    fn expect(&self, id: ObjectId, expected: Kind) -> WidgetResult<&Node> {
        let node = self.node(id)?;
        let found = node.kind();
        let matches = match expected {
            Kind::Widget => found.is_widget(),
            Kind::Layout => found.is_layout(),
            _ => found == expected,
        };
        if matches {
            Ok(node)
        } else {
            Err(WidgetError::WrongKind { handle: id, expected, found })
        }
    }

    fn expect_mut(&mut self, id: ObjectId, expected: Kind) -> WidgetResult<&mut Node> {
        self.expect(id, expected)?;
        self.node_mut(id)
    }

    pub fn widget(&self, id: ObjectId) -> WidgetResult<&WidgetData> {
        let node = self.expect(id, Kind::Widget)?;
        node.body.widget().ok_or(WidgetError::StaleHandle(id))
    }

    fn widget_mut(&mut self, id: ObjectId) -> WidgetResult<&mut WidgetData> {
        let node = self.expect_mut(id, Kind::Widget)?;
        node.body.widget_mut().ok_or(WidgetError::StaleHandle(id))
    }

    pub fn layout(&self, id: ObjectId) -> WidgetResult<&LayoutData> {
        let node = self.expect(id, Kind::Layout)?;
        node.body.layout().ok_or(WidgetError::StaleHandle(id))
    }

    fn layout_mut(&mut self, id: ObjectId) -> WidgetResult<&mut LayoutData> {
        let node = self.expect_mut(id, Kind::Layout)?;
        node.body.layout_mut().ok_or(WidgetError::StaleHandle(id))
    }

    fn button_mut(&mut self, id: ObjectId) -> WidgetResult<&mut ButtonData> {
        match &mut self.expect_mut(id, Kind::PushButton)?.body {
            Body::PushButton(_, button) => Ok(button),
            _ => Err(WidgetError::StaleHandle(id)),
        }
    }

    pub fn parent(&self, id: ObjectId) -> WidgetResult<Option<ObjectId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: ObjectId) -> WidgetResult<&[ObjectId]> {
        Ok(self.node(id)?.children.as_slice())
    }

    pub fn layout_items(&self, layout: ObjectId) -> WidgetResult<&[ObjectId]> {
        Ok(self.layout(layout)?.items.as_slice())
    }

    pub fn label_text(&self, label: ObjectId) -> WidgetResult<&str> {
        match &self.expect(label, Kind::Label)?.body {
            Body::Label(_, text) => Ok(text.as_str()),
            _ => Err(WidgetError::StaleHandle(label)),
        }
    }

    pub fn button_text(&self, button: ObjectId) -> WidgetResult<&str> {
        match &self.expect(button, Kind::PushButton)?.body {
            Body::PushButton(_, data) => Ok(data.text.as_str()),
            _ => Err(WidgetError::StaleHandle(button)),
        }
    }

    /// Walk parent links up to the widget with no parent.
    pub fn top_level(&self, id: ObjectId) -> WidgetResult<ObjectId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Top-level widgets, in creation order.
    pub fn top_level_widgets(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self
            .nodes
            .values()
            .filter(|n| n.parent.is_none() && n.kind().is_widget())
            .map(|n| n.id)
            .collect();
        roots.sort();
        roots
    }

    fn is_ancestor_or_self(&self, candidate: ObjectId, of: ObjectId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn create_object(&mut self) -> WidgetResult<ObjectId> {
        self.insert(None, Body::Object)
    }

    /// Create the process-wide application. Only one may be alive at a time.
    pub fn create_application(&mut self) -> WidgetResult<ObjectId> {
        if let Some(existing) = self.application {
            return Err(WidgetError::ApplicationExists(existing));
        }
        let id = self.insert(None, Body::Application { running: false })?;
        self.application = Some(id);
        Ok(id)
    }

    pub fn create_widget(&mut self, parent: Option<ObjectId>) -> WidgetResult<ObjectId> {
        self.insert(parent, Body::Widget(WidgetData::new(parent)))
    }

    pub fn create_label(&mut self, parent: Option<ObjectId>) -> WidgetResult<ObjectId> {
        self.insert(parent, Body::Label(WidgetData::new(parent), String::new()))
    }

    pub fn create_push_button(&mut self, parent: Option<ObjectId>) -> WidgetResult<ObjectId> {
        self.insert(
            parent,
            Body::PushButton(WidgetData::new(parent), ButtonData::default()),
        )
    }

    pub fn create_layout(&mut self, parent: Option<ObjectId>) -> WidgetResult<ObjectId> {
        let id = self.insert(parent, Body::Layout(LayoutData::default()))?;
        self.install_on_parent(id, parent)?;
        Ok(id)
    }

    pub fn create_vbox_layout(&mut self, parent: Option<ObjectId>) -> WidgetResult<ObjectId> {
        let id = self.insert(parent, Body::VBoxLayout(LayoutData::default()))?;
        self.install_on_parent(id, parent)?;
        Ok(id)
    }

    /// A layout constructed with a parent becomes that parent's layout,
    /// unless the parent already has one.
    fn install_on_parent(&mut self, layout: ObjectId, parent: Option<ObjectId>) -> WidgetResult<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if self.widget(parent)?.layout.is_none() {
            self.set_layout(parent, layout)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Composition
    // -------------------------------------------------------------------------

    fn reparent(&mut self, child: ObjectId, parent: ObjectId) -> WidgetResult<()> {
        if self.is_ancestor_or_self(child, parent) {
            return Err(WidgetError::WouldCycle { child, parent });
        }
        let old = self.node(child)?.parent;
        if old == Some(parent) {
            return Ok(());
        }
        if let Some(old) = old {
            if let Some(node) = self.nodes.get_mut(&old) {
                node.children.retain(|&c| c != child);
            }
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Install `layout` as the exclusive layout of `widget`.
    pub fn set_layout(&mut self, widget: ObjectId, layout: ObjectId) -> WidgetResult<()> {
        let current = self.widget(widget)?.layout;
        let installed_on = self.layout(layout)?.installed_on;

        if current == Some(layout) {
            return Ok(());
        }
        if let Some(current) = current {
            log::warn!("set_layout: {widget} already has layout {current}; ignoring {layout}");
            return Ok(());
        }
        if let Some(other) = installed_on {
            log::warn!("set_layout: {layout} is already installed on {other}; ignoring");
            return Ok(());
        }

        let items = self.layout(layout)?.items.clone();
        for &item in &items {
            if self.is_ancestor_or_self(item, widget) {
                return Err(WidgetError::WouldCycle { child: item, parent: widget });
            }
        }

        self.reparent(layout, widget)?;
        for item in items {
            self.reparent(item, widget)?;
        }
        self.widget_mut(widget)?.layout = Some(layout);
        self.layout_mut(layout)?.installed_on = Some(widget);
        Ok(())
    }

    /// Append `widget` to the items of `layout`. Call order is display order.
    pub fn add_widget(&mut self, layout: ObjectId, widget: ObjectId) -> WidgetResult<()> {
        let installed_on = self.layout(layout)?.installed_on;
        let previous = self.widget(widget)?.managed_by;

        if let Some(host) = installed_on {
            self.reparent(widget, host)?;
        }
        if let Some(previous) = previous {
            if let Some(node) = self.nodes.get_mut(&previous) {
                if let Some(data) = node.body.layout_mut() {
                    data.items.retain(|&w| w != widget);
                }
            }
        }
        self.layout_mut(layout)?.items.push(widget);
        self.widget_mut(widget)?.managed_by = Some(layout);
        Ok(())
    }

    pub fn set_visible(&mut self, widget: ObjectId, visible: bool) -> WidgetResult<()> {
        self.widget_mut(widget)?.visible = visible;
        Ok(())
    }

    pub fn set_window_title(&mut self, widget: ObjectId, title: String) -> WidgetResult<()> {
        self.widget_mut(widget)?.window_title = title;
        Ok(())
    }

    pub fn set_size(&mut self, widget: ObjectId, width: i32, height: i32) -> WidgetResult<()> {
        self.widget_mut(widget)?.fixed_size = Some((width.max(0), height.max(0)));
        Ok(())
    }

    pub fn set_label_text(&mut self, label: ObjectId, text: String) -> WidgetResult<()> {
        match &mut self.expect_mut(label, Kind::Label)?.body {
            Body::Label(_, current) => *current = text,
            _ => return Err(WidgetError::StaleHandle(label)),
        }
        Ok(())
    }

    pub fn set_button_text(&mut self, button: ObjectId, text: String) -> WidgetResult<()> {
        self.button_mut(button)?.text = text;
        Ok(())
    }

    pub(crate) fn set_geometry(&mut self, widget: ObjectId, geometry: Geometry) -> WidgetResult<()> {
        self.widget_mut(widget)?.geometry = geometry;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    /// Connect the clicked signal of `button`, returning the replaced handler.
    pub fn connect_clicked(&mut self, button: ObjectId, handler: Handler) -> WidgetResult<Option<Handler>> {
        Ok(self.button_mut(button)?.clicked.connect(handler))
    }

    /// Connect the destroyed signal of any object, returning the replaced handler.
    pub fn connect_destroyed(&mut self, id: ObjectId, handler: Handler) -> WidgetResult<Option<Handler>> {
        Ok(self.node_mut(id)?.destroyed.connect(handler))
    }

    pub fn clicked_handler(&self, button: ObjectId) -> WidgetResult<Option<Handler>> {
        match &self.expect(button, Kind::PushButton)?.body {
            Body::PushButton(_, data) => Ok(data.clicked.handler()),
            _ => Err(WidgetError::StaleHandle(button)),
        }
    }

    // -------------------------------------------------------------------------
    // Event queue
    // -------------------------------------------------------------------------

    pub fn post_click(&mut self, button: ObjectId) -> WidgetResult<()> {
        self.expect(button, Kind::PushButton)?;
        self.events.push_back(Event::Clicked(button));
        Ok(())
    }

    pub fn post_quit(&mut self, app: ObjectId, status: i32) -> WidgetResult<()> {
        self.expect(app, Kind::Application)?;
        self.events.push_back(Event::Quit(status));
        Ok(())
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn running_flag(&mut self, app: ObjectId) -> WidgetResult<&mut bool> {
        match &mut self.expect_mut(app, Kind::Application)?.body {
            Body::Application { running } => Ok(running),
            _ => Err(WidgetError::StaleHandle(app)),
        }
    }

    pub fn begin_exec(&mut self, app: ObjectId) -> WidgetResult<()> {
        let running = self.running_flag(app)?;
        if *running {
            return Err(WidgetError::EventLoopRunning(app));
        }
        *running = true;
        Ok(())
    }

    /// Leave the loop. The application may have been deleted meanwhile.
    pub fn end_exec(&mut self, app: ObjectId) {
        if let Ok(running) = self.running_flag(app) {
            *running = false;
        }
    }

    // -------------------------------------------------------------------------
    // Destruction
    // -------------------------------------------------------------------------

    /// Remove `id` and all its descendants, returning the removed nodes in
    /// pre-order. The caller fires destroyed handlers and drops the nodes
    /// once the toolkit lock is released.
    pub fn delete(&mut self, id: ObjectId) -> WidgetResult<Vec<Node>> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|&c| c != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(&current) else {
                continue;
            };
            stack.extend(node.children.iter().rev().copied());
            self.detach(&node);
            removed.push(node);
        }

        log::debug!("deleted {id} and {} descendant(s)", removed.len() - 1);
        Ok(removed)
    }

    /// Per-kind teardown of links held by surviving objects.
    fn detach(&mut self, node: &Node) {
        let id = node.id;
        match &node.body {
            Body::Object => {}
            Body::Application { .. } => {
                if self.application == Some(id) {
                    self.application = None;
                }
                self.events.clear();
            }
            Body::Widget(widget) | Body::Label(widget, _) => self.detach_widget(id, widget),
            Body::PushButton(widget, _) => {
                self.detach_widget(id, widget);
                self.events.retain(|e| *e != Event::Clicked(id));
            }
            Body::Layout(layout) | Body::VBoxLayout(layout) => {
                if let Some(host) = layout.installed_on {
                    if let Some(data) = self.nodes.get_mut(&host).and_then(|n| n.body.widget_mut()) {
                        data.layout = None;
                    }
                }
                for item in &layout.items {
                    if let Some(data) = self.nodes.get_mut(item).and_then(|n| n.body.widget_mut()) {
                        data.managed_by = None;
                    }
                }
            }
        }
    }

    fn detach_widget(&mut self, id: ObjectId, widget: &WidgetData) {
        if let Some(layout) = widget.managed_by {
            if let Some(data) = self.nodes.get_mut(&layout).and_then(|n| n.body.layout_mut()) {
                data.items.retain(|&w| w != id);
            }
        }
    }
}
