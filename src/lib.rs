//! Widget Object Model for Dynamically Typed Hosts
//!
//! This crate exposes a small, closed hierarchy of GUI objects through a
//! C ABI. Hosts hold objects as opaque integer handles, compose them into
//! windows, and connect their own callables to native signals.
//!
//! # Architecture
//!
//! ```text
//! Host (Python, C, ...) → C ABI (this file) → Toolkit arena → taffy (layout)
//!                                   ↑
//!          host callable ← Callback bridge ← native signal
//! ```
//!
//! # Contract violations
//!
//! Passing the null handle where an object is required, a handle of the
//! wrong kind, or a handle to a deleted object is a caller bug. It is logged
//! and the process aborts, unless the `lenient-contracts` feature is enabled,
//! in which case the call does nothing and returns a neutral value.

#![allow(non_snake_case)]

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod layout;
pub mod toolkit;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

pub use bridge::{Delivery, ForeignCallable, Handler, HostCallable, HostCallback, NoArgumentsCallback};
pub use error::{WidgetError, WidgetResult};
pub use handle::{Kind, ObjectId};
pub use layout::Geometry;
pub use toolkit::Toolkit;

// =============================================================================
// Global State
// =============================================================================

/// Every object created through the C ABI.
static STATE: Lazy<Mutex<Toolkit>> = Lazy::new(|| Mutex::new(Toolkit::new()));

// =============================================================================
// Helper Functions
// =============================================================================

/// Decode a handle an operation cannot do without.
fn required(raw: usize) -> WidgetResult<ObjectId> {
    ObjectId::from_raw(raw).ok_or(WidgetError::NullHandle)
}

/// Unwrap the result of a boundary call.
///
/// Reported errors are logged and yield `None`. Contract violations abort
/// unless `lenient-contracts` is enabled.
fn enforce<T>(location: &str, result: WidgetResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_contract_violation() && !cfg!(feature = "lenient-contracts") => {
            log::error!("{}: contract violation: {}", location, e);
            std::process::abort();
        }
        Err(e) => {
            log::error!("{}: {}", location, e);
            None
        }
    }
}

fn with_toolkit<T>(location: &str, f: impl FnOnce(&mut Toolkit) -> WidgetResult<T>) -> Option<T> {
    let mut toolkit = STATE.lock();
    let result = f(&mut *toolkit);
    drop(toolkit);
    enforce(location, result)
}

/// Validate a pointer for writing. Returns false if null or misaligned.
fn validate_ptr_for_write<T>(ptr: *mut T, location: &str) -> bool {
    if ptr.is_null() {
        log::debug!("{}: null pointer", location);
        return false;
    }
    if (ptr as usize) % std::mem::align_of::<T>() != 0 {
        log::error!("{}: misaligned pointer {:p} (alignment {})",
            location, ptr, std::mem::align_of::<T>());
        return false;
    }
    true
}

fn c_str_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // Safety: non-null; the caller guarantees a valid NUL-terminated string.
    unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}

/// Copy `content` into a caller buffer.
///
/// A null buffer or zero length queries the byte length. Otherwise at most
/// `buf_len - 1` bytes are copied, followed by a terminator, and the number
/// of bytes copied is returned.
fn copy_to_buffer(content: &str, out_buf: *mut c_char, buf_len: usize, location: &str) -> usize {
    if out_buf.is_null() || buf_len == 0 {
        return content.len();
    }
    if !validate_ptr_for_write(out_buf, location) {
        return 0;
    }

    let bytes = content.as_bytes();
    let copy_len = bytes.len().min(buf_len - 1);

    // Safety: out_buf is non-null and aligned; copy_len + 1 <= buf_len.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), out_buf as *mut u8, copy_len);
        *out_buf.add(copy_len) = 0;
    }

    copy_len
}

fn handle_or_null(id: Option<ObjectId>) -> usize {
    id.map(ObjectId::to_raw).unwrap_or(0)
}

// =============================================================================
// FFI Functions - Object
// =============================================================================

/// Create a plain object with identity only.
#[no_mangle]
pub extern "C" fn Object_New() -> usize {
    handle_or_null(with_toolkit("Object_New", |tk| tk.create_object()))
}

/// Class name of any object, as a static string.
#[no_mangle]
pub extern "C" fn Object_GetClassName(object: usize) -> *const c_char {
    with_toolkit("Object_GetClassName", |tk| tk.kind(required(object)?))
        .map(|kind| kind.c_class_name().as_ptr())
        .unwrap_or(std::ptr::null())
}

/// Delete an object and everything it owns. The null handle is ignored.
#[no_mangle]
pub extern "C" fn Object_Delete(object: usize) {
    let Some(id) = ObjectId::from_raw(object) else {
        return;
    };
    enforce("Object_Delete", dispatch::delete(&STATE, id));
}

/// Whether the handle names a live object.
#[no_mangle]
pub extern "C" fn Object_IsAlive(object: usize) -> bool {
    ObjectId::from_raw(object).is_some_and(|id| STATE.lock().contains(id))
}

/// Number of live objects, for leak checks.
#[no_mangle]
pub extern "C" fn Object_LiveCount() -> usize {
    STATE.lock().live_count()
}

/// Parent handle, or 0 for a top-level object.
#[no_mangle]
pub extern "C" fn Object_GetParent(object: usize) -> usize {
    handle_or_null(with_toolkit("Object_GetParent", |tk| tk.parent(required(object)?)).flatten())
}

/// Number of direct children.
#[no_mangle]
pub extern "C" fn Object_GetChildCount(object: usize) -> usize {
    with_toolkit("Object_GetChildCount", |tk| Ok(tk.children(required(object)?)?.len())).unwrap_or(0)
}

/// Child at `index` in creation order, or 0 if out of range.
#[no_mangle]
pub extern "C" fn Object_GetChildAt(object: usize, index: usize) -> usize {
    let child = with_toolkit("Object_GetChildAt", |tk| {
        Ok(tk.children(required(object)?)?.get(index).copied())
    });
    handle_or_null(child.flatten())
}

/// Run `callback` once when the object is destroyed.
#[no_mangle]
pub extern "C" fn Object_SetOnDestroyed(object: usize, callback: HostCallback) {
    let result = required(object).and_then(|id| {
        STATE.lock().kind(id)?;
        let handler = Handler::host(ForeignCallable::retain(callback));
        dispatch::connect_destroyed(&STATE, id, handler)
    });
    enforce("Object_SetOnDestroyed", result);
}

// =============================================================================
// FFI Functions - Application
// =============================================================================

/// Create the application. Returns 0 if one already exists.
#[no_mangle]
pub extern "C" fn Application_New() -> usize {
    handle_or_null(with_toolkit("Application_New", |tk| tk.create_application()))
}

/// Process events until a quit request. Returns the exit status.
#[no_mangle]
pub extern "C" fn Application_Exec(app: usize) -> c_int {
    let result = required(app).and_then(|id| dispatch::run(&STATE, id));
    enforce("Application_Exec", result).unwrap_or(-1)
}

/// Ask the running (or next) event loop to return `status`.
#[no_mangle]
pub extern "C" fn Application_Quit(app: usize, status: c_int) {
    with_toolkit("Application_Quit", |tk| tk.post_quit(required(app)?, status));
}

// =============================================================================
// FFI Functions - Layouts
// =============================================================================

/// Create a plain layout, installed on `parent` if that widget has none.
#[no_mangle]
pub extern "C" fn Layout_New(parent: usize) -> usize {
    handle_or_null(with_toolkit("Layout_New", |tk| tk.create_layout(ObjectId::from_raw(parent))))
}

/// Create a vertical box layout, installed on `parent` if that widget has none.
#[no_mangle]
pub extern "C" fn VBoxLayout_New(parent: usize) -> usize {
    handle_or_null(with_toolkit("VBoxLayout_New", |tk| {
        tk.create_vbox_layout(ObjectId::from_raw(parent))
    }))
}

/// Append a widget to the layout. Call order is display order.
#[no_mangle]
pub extern "C" fn Layout_AddWidget(layout: usize, widget: usize) {
    with_toolkit("Layout_AddWidget", |tk| tk.add_widget(required(layout)?, required(widget)?));
}

/// Number of widgets managed by the layout.
#[no_mangle]
pub extern "C" fn Layout_GetCount(layout: usize) -> usize {
    with_toolkit("Layout_GetCount", |tk| Ok(tk.layout_items(required(layout)?)?.len())).unwrap_or(0)
}

/// Managed widget at `index`, or 0 if out of range.
#[no_mangle]
pub extern "C" fn Layout_GetItemAt(layout: usize, index: usize) -> usize {
    let item = with_toolkit("Layout_GetItemAt", |tk| {
        Ok(tk.layout_items(required(layout)?)?.get(index).copied())
    });
    handle_or_null(item.flatten())
}

// =============================================================================
// FFI Functions - Widgets
// =============================================================================

/// Create a widget. Without a parent it is a hidden top-level window.
#[no_mangle]
pub extern "C" fn Widget_New(parent: usize) -> usize {
    handle_or_null(with_toolkit("Widget_New", |tk| tk.create_widget(ObjectId::from_raw(parent))))
}

/// Show or hide the widget.
#[no_mangle]
pub extern "C" fn Widget_SetVisible(widget: usize, visible: bool) {
    with_toolkit("Widget_SetVisible", |tk| tk.set_visible(required(widget)?, visible));
}

/// Whether the widget is set visible.
#[no_mangle]
pub extern "C" fn Widget_IsVisible(widget: usize) -> bool {
    with_toolkit("Widget_IsVisible", |tk| Ok(tk.widget(required(widget)?)?.visible)).unwrap_or(false)
}

/// Set the window title. A null title clears it.
#[no_mangle]
pub extern "C" fn Widget_SetWindowTitle(widget: usize, title: *const c_char) {
    let title = c_str_to_string(title);
    with_toolkit("Widget_SetWindowTitle", |tk| tk.set_window_title(required(widget)?, title));
}

/// Copy the window title into a caller buffer (see `copy_to_buffer`).
#[no_mangle]
pub extern "C" fn Widget_GetWindowTitle(widget: usize, out_buf: *mut c_char, buf_len: usize) -> usize {
    let title = with_toolkit("Widget_GetWindowTitle", |tk| {
        Ok(tk.widget(required(widget)?)?.window_title.clone())
    });
    copy_to_buffer(&title.unwrap_or_default(), out_buf, buf_len, "Widget_GetWindowTitle")
}

/// Install a layout on the widget and adopt its items.
#[no_mangle]
pub extern "C" fn Widget_SetLayout(widget: usize, layout: usize) {
    with_toolkit("Widget_SetLayout", |tk| tk.set_layout(required(widget)?, required(layout)?));
}

/// Fix the widget's size.
#[no_mangle]
pub extern "C" fn Widget_SetSize(widget: usize, width: c_int, height: c_int) {
    with_toolkit("Widget_SetSize", |tk| tk.set_size(required(widget)?, width, height));
}

/// Lay out the widget's window and report the widget's rectangle,
/// relative to its parent.
#[no_mangle]
pub extern "C" fn Widget_GetGeometry(widget: usize, out_geometry: *mut Geometry) {
    if !validate_ptr_for_write(out_geometry, "Widget_GetGeometry") {
        return;
    }

    let geometry = with_toolkit("Widget_GetGeometry", |tk| {
        let id = required(widget)?;
        layout::update_window(tk, id)?;
        Ok(tk.widget(id)?.geometry)
    })
    .unwrap_or_default();

    unsafe { *out_geometry = geometry; }
}

// =============================================================================
// FFI Functions - Label
// =============================================================================

/// Create an empty label.
#[no_mangle]
pub extern "C" fn Label_New(parent: usize) -> usize {
    handle_or_null(with_toolkit("Label_New", |tk| tk.create_label(ObjectId::from_raw(parent))))
}

/// Replace the label's text. A null pointer clears it.
#[no_mangle]
pub extern "C" fn Label_SetText(label: usize, text: *const c_char) {
    let text = c_str_to_string(text);
    with_toolkit("Label_SetText", |tk| tk.set_label_text(required(label)?, text));
}

/// Copy the label's text into a caller buffer.
#[no_mangle]
pub extern "C" fn Label_GetText(label: usize, out_buf: *mut c_char, buf_len: usize) -> usize {
    let text = with_toolkit("Label_GetText", |tk| Ok(tk.label_text(required(label)?)?.to_owned()));
    copy_to_buffer(&text.unwrap_or_default(), out_buf, buf_len, "Label_GetText")
}

// =============================================================================
// FFI Functions - PushButton
// =============================================================================

/// Create a push button with no text and no handler.
#[no_mangle]
pub extern "C" fn PushButton_New(parent: usize) -> usize {
    handle_or_null(with_toolkit("PushButton_New", |tk| tk.create_push_button(ObjectId::from_raw(parent))))
}

/// Replace the button's text. A null pointer clears it.
#[no_mangle]
pub extern "C" fn PushButton_SetText(button: usize, text: *const c_char) {
    let text = c_str_to_string(text);
    with_toolkit("PushButton_SetText", |tk| tk.set_button_text(required(button)?, text));
}

/// Copy the button's text into a caller buffer.
#[no_mangle]
pub extern "C" fn PushButton_GetText(button: usize, out_buf: *mut c_char, buf_len: usize) -> usize {
    let text = with_toolkit("PushButton_GetText", |tk| Ok(tk.button_text(required(button)?)?.to_owned()));
    copy_to_buffer(&text.unwrap_or_default(), out_buf, buf_len, "PushButton_GetText")
}

/// Connect a host callable to `clicked`, replacing (and releasing) any
/// previous handler. The callable is retained until the button is destroyed
/// or the handler is replaced.
#[no_mangle]
pub extern "C" fn PushButton_SetOnClicked(button: usize, callback: HostCallback) {
    let result = required(button).and_then(|id| {
        // Reject before retaining so a bad handle never takes a reference.
        let current = STATE.lock().clicked_handler(id)?;
        drop(current);
        let handler = Handler::host(ForeignCallable::retain(callback));
        dispatch::connect_clicked(&STATE, id, handler)
    });
    enforce("PushButton_SetOnClicked", result);
}

/// Connect a native function to `clicked`. It receives the button's handle.
#[no_mangle]
pub extern "C" fn PushButton_SetOnClickedNative(button: usize, callback: Option<NoArgumentsCallback>) {
    let Some(callback) = callback else {
        log::warn!("PushButton_SetOnClickedNative: null callback ignored");
        return;
    };
    let result = required(button)
        .and_then(|id| dispatch::connect_clicked(&STATE, id, Handler::Native(callback)));
    enforce("PushButton_SetOnClickedNative", result);
}

/// Click the button now, running its handler before returning.
#[no_mangle]
pub extern "C" fn PushButton_Click(button: usize) {
    let result = required(button).and_then(|id| dispatch::emit_clicked(&STATE, id));
    enforce("PushButton_Click", result);
}

/// Queue a click for the event loop.
#[no_mangle]
pub extern "C" fn PushButton_PostClick(button: usize) {
    with_toolkit("PushButton_PostClick", |tk| tk.post_click(required(button)?));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::{c_void, CString};
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    /// Helper to create a C string for FFI calls
    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    /// Reset global state between tests
    fn reset_state() {
        let previous = std::mem::take(&mut *STATE.lock());
        drop(previous);
    }

    fn class_name(handle: usize) -> String {
        let ptr = Object_GetClassName(handle);
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned()
    }

    fn label_text(label: usize) -> String {
        let mut buf = [0 as c_char; 128];
        let len = Label_GetText(label, buf.as_mut_ptr(), buf.len());
        let bytes: Vec<u8> = buf[..len].iter().map(|&b| b as u8).collect();
        String::from_utf8(bytes).unwrap()
    }

    /// Reference counts of a fake host object.
    #[derive(Default)]
    struct HostObject {
        refs: AtomicUsize,
        calls: AtomicUsize,
        /// Label to write to from inside the handler, if any.
        label: usize,
    }

    impl HostObject {
        fn refs(&self) -> usize {
            self.refs.load(Ordering::SeqCst)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn callback(&self, callable: bool) -> HostCallback {
            HostCallback {
                user_data: self as *const HostObject as *mut c_void,
                invoke: if callable { Some(host_invoke) } else { None },
                retain: Some(host_retain),
                release: Some(host_release),
            }
        }
    }

    fn host(data: *mut c_void) -> &'static HostObject {
        unsafe { &*(data as *const HostObject) }
    }

    extern "C" fn host_invoke(data: *mut c_void) {
        let object = host(data);
        object.calls.fetch_add(1, Ordering::SeqCst);
        if object.label != 0 {
            let text = cstr("Clicked");
            Label_SetText(object.label, text.as_ptr());
        }
    }

    extern "C" fn host_retain(data: *mut c_void) {
        host(data).refs.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn host_release(data: *mut c_void) {
        host(data).refs.fetch_sub(1, Ordering::SeqCst);
    }

    // =========================================================================
    // Handles and dispatch
    // =========================================================================

    #[test]
    #[serial]
    fn test_every_factory_reports_its_class_name() {
        reset_state();
        let app = Application_New();
        let object = Object_New();
        let widget = Widget_New(0);
        let button = PushButton_New(widget);
        let label = Label_New(widget);
        let layout = Layout_New(0);
        let vbox = VBoxLayout_New(0);

        assert_eq!(class_name(object), "Object");
        assert_eq!(class_name(app), "Application");
        assert_eq!(class_name(widget), "Widget");
        assert_eq!(class_name(button), "PushButton");
        assert_eq!(class_name(label), "Label");
        assert_eq!(class_name(layout), "Layout");
        assert_eq!(class_name(vbox), "VBoxLayout");
    }

    #[test]
    #[serial]
    fn test_delete_null_is_noop() {
        reset_state();
        Object_Delete(0);
        assert_eq!(Object_LiveCount(), 0);
    }

    #[test]
    #[serial]
    fn test_delete_frees_every_kind() {
        reset_state();
        let handles = [
            Application_New(),
            Object_New(),
            Widget_New(0),
            Label_New(0),
            PushButton_New(0),
            Layout_New(0),
            VBoxLayout_New(0),
        ];
        assert_eq!(Object_LiveCount(), handles.len());
        for handle in handles {
            Object_Delete(handle);
            assert!(!Object_IsAlive(handle));
        }
        assert_eq!(Object_LiveCount(), 0);
    }

    #[test]
    #[serial]
    fn test_second_application_returns_null() {
        reset_state();
        let app = Application_New();
        assert_ne!(app, 0);
        assert_eq!(Application_New(), 0);

        Object_Delete(app);
        assert_ne!(Application_New(), 0);
    }

    // =========================================================================
    // Construction and composition
    // =========================================================================

    #[test]
    #[serial]
    fn test_window_scenario() {
        reset_state();
        let app = Application_New();
        let window = Widget_New(0);
        let layout = VBoxLayout_New(window);
        Widget_SetLayout(window, layout);

        let label = Label_New(window);
        let hello = cstr("Hello, World!");
        Label_SetText(label, hello.as_ptr());
        Layout_AddWidget(layout, label);

        let button = PushButton_New(window);
        let text = cstr("Not Clickable");
        PushButton_SetText(button, text.as_ptr());
        Layout_AddWidget(layout, button);

        let title = cstr("Test 1");
        Widget_SetWindowTitle(window, title.as_ptr());
        Widget_SetSize(window, 400, 300);
        Widget_SetVisible(window, true);

        Application_Quit(app, 0);
        assert_eq!(Application_Exec(app), 0);

        assert_eq!(Layout_GetCount(layout), 2);
        assert_eq!(Layout_GetItemAt(layout, 0), label);
        assert_eq!(Layout_GetItemAt(layout, 1), button);
        assert_eq!(label_text(label), "Hello, World!");

        Object_Delete(window);
        for handle in [window, layout, label, button] {
            assert!(!Object_IsAlive(handle));
        }

        Object_Delete(app);
        assert_eq!(Object_LiveCount(), 0);
    }

    #[test]
    #[serial]
    fn test_geometry_follows_insertion_order() {
        reset_state();
        let window = Widget_New(0);
        let layout = VBoxLayout_New(window);
        let a = Label_New(window);
        let b = PushButton_New(window);
        Layout_AddWidget(layout, a);
        Layout_AddWidget(layout, b);
        Widget_SetSize(window, 400, 300);

        let mut first = Geometry::default();
        let mut second = Geometry::default();
        Widget_GetGeometry(a, &mut first);
        Widget_GetGeometry(b, &mut second);

        assert!(first.y < second.y);
        assert_eq!(first.x, layout::LAYOUT_MARGIN);
        assert_eq!(second.y, first.y + first.height + layout::LAYOUT_SPACING);
    }

    #[test]
    #[serial]
    fn test_parent_child_queries() {
        reset_state();
        let window = Widget_New(0);
        let label = Label_New(window);
        assert_eq!(Object_GetParent(label), window);
        assert_eq!(Object_GetParent(window), 0);
        assert_eq!(Object_GetChildCount(window), 1);
        assert_eq!(Object_GetChildAt(window, 0), label);
        assert_eq!(Object_GetChildAt(window, 1), 0);
    }

    #[test]
    #[serial]
    fn test_text_round_trip_and_query_mode() {
        reset_state();
        let window = Widget_New(0);
        let button = PushButton_New(window);
        let text = cstr("Нажми меня");
        PushButton_SetText(button, text.as_ptr());

        let len = PushButton_GetText(button, std::ptr::null_mut(), 0);
        assert_eq!(len, "Нажми меня".len());

        let mut small = [0 as c_char; 4];
        assert_eq!(PushButton_GetText(button, small.as_mut_ptr(), small.len()), 3);
        assert_eq!(small[3], 0);

        let title = cstr("Тест 5");
        Widget_SetWindowTitle(window, title.as_ptr());
        assert_eq!(Widget_GetWindowTitle(window, std::ptr::null_mut(), 0), "Тест 5".len());
    }

    #[test]
    #[serial]
    fn test_null_text_reads_as_empty() {
        reset_state();
        let label = Label_New(0);
        Label_SetText(label, std::ptr::null());
        assert_eq!(label_text(label), "");
    }

    #[test]
    #[serial]
    fn test_visibility() {
        reset_state();
        let window = Widget_New(0);
        assert!(!Widget_IsVisible(window));
        Widget_SetVisible(window, true);
        assert!(Widget_IsVisible(window));
    }

    // =========================================================================
    // Callback bridge
    // =========================================================================

    #[test]
    #[serial]
    fn test_click_invokes_host_callable_once() {
        reset_state();
        let window = Widget_New(0);
        let button = PushButton_New(window);
        let object = HostObject::default();

        PushButton_SetOnClicked(button, object.callback(true));
        assert_eq!(object.refs(), 1);

        PushButton_Click(button);
        assert_eq!(object.calls(), 1);
        assert_eq!(object.refs(), 1);

        Object_Delete(window);
        assert_eq!(object.refs(), 0);
    }

    #[test]
    #[serial]
    fn test_destroy_without_click_releases_callable() {
        reset_state();
        let button = PushButton_New(0);
        let object = HostObject::default();
        PushButton_SetOnClicked(button, object.callback(true));

        Object_Delete(button);
        assert_eq!(object.calls(), 0);
        assert_eq!(object.refs(), 0);
    }

    #[test]
    #[serial]
    fn test_non_callable_handler_is_survived() {
        reset_state();
        let button = PushButton_New(0);
        let object = HostObject::default();
        PushButton_SetOnClicked(button, object.callback(false));

        PushButton_Click(button);
        assert_eq!(object.calls(), 0);

        Object_Delete(button);
        assert_eq!(object.refs(), 0);
    }

    #[test]
    #[serial]
    fn test_reregistering_releases_previous_callable() {
        reset_state();
        let button = PushButton_New(0);
        let first = HostObject::default();
        let second = HostObject::default();

        PushButton_SetOnClicked(button, first.callback(true));
        PushButton_SetOnClicked(button, second.callback(true));
        assert_eq!(first.refs(), 0);
        assert_eq!(second.refs(), 1);

        PushButton_Click(button);
        assert_eq!(first.calls(), 0);
        assert_eq!(second.calls(), 1);

        Object_Delete(button);
        assert_eq!(second.refs(), 0);
    }

    #[test]
    #[serial]
    fn test_handler_can_call_back_into_toolkit() {
        reset_state();
        let app = Application_New();
        let window = Widget_New(0);
        let label = Label_New(window);
        let button = PushButton_New(window);
        let object = HostObject { label, ..Default::default() };
        PushButton_SetOnClicked(button, object.callback(true));

        PushButton_PostClick(button);
        Application_Quit(app, 7);
        assert_eq!(Application_Exec(app), 7);
        assert_eq!(object.calls(), 1);
        assert_eq!(label_text(label), "Clicked");

        Object_Delete(window);
        Object_Delete(app);
        assert_eq!(object.refs(), 0);
    }

    static LAST_SENDER: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn on_clicked_native(sender: usize) {
        LAST_SENDER.store(sender, Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn test_native_callback_receives_sender() {
        reset_state();
        let button = PushButton_New(0);
        PushButton_SetOnClickedNative(button, Some(on_clicked_native));
        PushButton_Click(button);
        assert_eq!(LAST_SENDER.load(Ordering::SeqCst), button);
        assert_eq!(class_name(LAST_SENDER.load(Ordering::SeqCst)), "PushButton");
    }

    #[test]
    #[serial]
    fn test_destroyed_callback_runs_and_releases() {
        reset_state();
        let window = Widget_New(0);
        let label = Label_New(window);
        let object = HostObject::default();
        Object_SetOnDestroyed(label, object.callback(true));
        assert_eq!(object.refs(), 1);

        Object_Delete(window);
        assert_eq!(object.calls(), 1);
        assert_eq!(object.refs(), 0);
    }

    #[test]
    #[serial]
    fn test_exec_without_events_returns_zero() {
        reset_state();
        let app = Application_New();
        assert_eq!(Application_Exec(app), 0);
    }

    static OUTER_APP: AtomicUsize = AtomicUsize::new(0);
    static NESTED_STATUS: AtomicI32 = AtomicI32::new(0);

    extern "C" fn exec_from_click(_sender: usize) {
        NESTED_STATUS.store(Application_Exec(OUTER_APP.load(Ordering::SeqCst)), Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn test_exec_while_running_is_rejected() {
        reset_state();
        let app = Application_New();
        OUTER_APP.store(app, Ordering::SeqCst);
        let button = PushButton_New(0);
        PushButton_SetOnClickedNative(button, Some(exec_from_click));

        PushButton_PostClick(button);
        Application_Quit(app, 5);
        assert_eq!(Application_Exec(app), 5);
        assert_eq!(NESTED_STATUS.load(Ordering::SeqCst), -1);

        // The loop is free again once the outer call has returned.
        assert_eq!(Application_Exec(app), 0);
    }

    // =========================================================================
    // Lenient contracts
    // =========================================================================

    #[cfg(feature = "lenient-contracts")]
    #[test]
    #[serial]
    fn test_null_handle_class_name_is_null() {
        reset_state();
        assert!(Object_GetClassName(0).is_null());
    }

    #[cfg(feature = "lenient-contracts")]
    #[test]
    #[serial]
    fn test_text_on_deleted_label_is_ignored() {
        reset_state();
        let label = Label_New(0);
        Object_Delete(label);

        let text = cstr("ignored");
        Label_SetText(label, text.as_ptr());
        assert!(!Object_IsAlive(label));
        assert_eq!(Object_LiveCount(), 0);
        assert_eq!(Label_GetText(label, std::ptr::null_mut(), 0), 0);
    }

    #[cfg(feature = "lenient-contracts")]
    #[test]
    #[serial]
    fn test_handler_for_stale_button_is_never_retained() {
        reset_state();
        let button = PushButton_New(0);
        Object_Delete(button);

        let object = HostObject::default();
        PushButton_SetOnClicked(button, object.callback(true));
        assert_eq!(object.refs(), 0);

        let label = Label_New(0);
        PushButton_SetOnClicked(label, object.callback(true));
        assert_eq!(object.refs(), 0);
    }
}
