//! Object identity and kind discriminants.
//!
//! Every object the toolkit owns is addressed by an [`ObjectId`] and has
//! exactly one [`Kind`], fixed when it is created.

use std::ffi::CStr;
use std::fmt;
use std::num::NonZeroUsize;

/// Identity of one object in the toolkit arena.
///
/// Crosses the C boundary as a non-zero `usize`; zero is the null handle.
/// Identifiers are never reused, so a stale handle resolves to nothing
/// instead of to a newer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(NonZeroUsize);

impl ObjectId {
    /// Decode a boundary handle. Returns `None` for the null handle.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn to_raw(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The concrete class of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Object,
    Application,
    Widget,
    PushButton,
    Label,
    Layout,
    VBoxLayout,
}

impl Kind {
    pub const ALL: [Kind; 7] = [
        Kind::Object,
        Kind::Application,
        Kind::Widget,
        Kind::PushButton,
        Kind::Label,
        Kind::Layout,
        Kind::VBoxLayout,
    ];

    pub fn class_name(self) -> &'static str {
        self.c_class_name().to_str().unwrap_or("Object")
    }

    /// Class name as a static C string, valid for the life of the process.
    pub fn c_class_name(self) -> &'static CStr {
        match self {
            Kind::Object => c"Object",
            Kind::Application => c"Application",
            Kind::Widget => c"Widget",
            Kind::PushButton => c"PushButton",
            Kind::Label => c"Label",
            Kind::Layout => c"Layout",
            Kind::VBoxLayout => c"VBoxLayout",
        }
    }

    /// Widget, or a kind that extends it.
    pub fn is_widget(self) -> bool {
        matches!(self, Kind::Widget | Kind::PushButton | Kind::Label)
    }

    /// Layout, or a kind that extends it.
    pub fn is_layout(self) -> bool {
        matches!(self, Kind::Layout | Kind::VBoxLayout)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}
