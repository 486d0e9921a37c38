//! Operations that may run host code.
//!
//! Handlers are cloned out of the toolkit under the lock and invoked after
//! it is released, so a handler can call straight back into the toolkit.
//! Host references dropped by the toolkit (replaced handlers, removed nodes)
//! are likewise released only after the lock is gone.

use parking_lot::Mutex;

use crate::bridge::{Delivery, Handler, Signal};
use crate::error::WidgetResult;
use crate::handle::ObjectId;
use crate::layout;
use crate::toolkit::{Event, Toolkit};

/// Emit `clicked` on `button`.
pub fn emit_clicked(state: &Mutex<Toolkit>, button: ObjectId) -> WidgetResult<Delivery> {
    let handler = state.lock().clicked_handler(button)?;
    Ok(match handler {
        Some(handler) => handler.deliver(button, Signal::Clicked),
        None => Delivery::Unconnected,
    })
}

/// Connect the clicked handler of `button`, releasing any previous one.
pub fn connect_clicked(state: &Mutex<Toolkit>, button: ObjectId, handler: Handler) -> WidgetResult<()> {
    let replaced = state.lock().connect_clicked(button, handler)?;
    if replaced.is_some() {
        log::debug!("connect_clicked: replaced handler of {button}");
    }
    drop(replaced);
    Ok(())
}

/// Connect the destroyed handler of `id`, releasing any previous one.
pub fn connect_destroyed(state: &Mutex<Toolkit>, id: ObjectId, handler: Handler) -> WidgetResult<()> {
    let replaced = state.lock().connect_destroyed(id, handler)?;
    drop(replaced);
    Ok(())
}

/// Delete `id` with its descendants.
///
/// Destroyed handlers run in removal order once the whole subtree is gone;
/// every retained handler is released after that.
pub fn delete(state: &Mutex<Toolkit>, id: ObjectId) -> WidgetResult<usize> {
    let mut removed = state.lock().delete(id)?;
    let count = removed.len();
    for node in &mut removed {
        if let Some(handler) = node.destroyed.take() {
            handler.deliver(node.id, Signal::Destroyed);
        }
    }
    drop(removed);
    Ok(count)
}

/// Run the event loop of `app` until a quit request or an empty queue.
pub fn run(state: &Mutex<Toolkit>, app: ObjectId) -> WidgetResult<i32> {
    {
        let mut toolkit = state.lock();
        toolkit.begin_exec(app)?;
        if let Err(e) = layout::update_all(&mut toolkit) {
            log::warn!("run: initial layout failed: {e}");
        }
    }

    let status = loop {
        let event = state.lock().next_event();
        match event {
            Some(Event::Clicked(button)) => {
                // The button may be gone by the time its click is processed.
                if let Err(e) = emit_clicked(state, button) {
                    log::debug!("run: dropping click for {button}: {e}");
                }
            }
            Some(Event::Quit(status)) => break status,
            None => {
                log::debug!("run: event queue of {app} drained; leaving loop");
                break 0;
            }
        }
    };

    state.lock().end_exec(app);
    Ok(status)
}
