//! Opaque object handles and the ownership wrapper used to release them.

use std::fmt;

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u64);

            impl $name {
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                pub const fn as_raw(&self) -> u64 {
                    self.0
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($name), "({:#x})"), self.0)
                }
            }
        )*
    };
}

define_handle! {
    /// A buffer object created by a logical device.
    BufferHandle,
    /// A device memory allocation.
    MemoryHandle,
}

/// A handle tagged with whether this side is responsible for releasing it.
///
/// Resources created internally are [`Owned::owned`]; resources supplied from outside are
/// [`Owned::borrowed`] and are never released through this wrapper. Releasing consumes the wrapper,
/// so a handle is released at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owned<H> {
    handle: H,
    owns: bool,
}

impl<H> Owned<H> {
    pub fn owned(handle: H) -> Self {
        Self { handle, owns: true }
    }

    pub fn borrowed(handle: H) -> Self {
        Self { handle, owns: false }
    }

    pub fn get(&self) -> &H {
        &self.handle
    }

    pub fn owns(&self) -> bool {
        self.owns
    }

    /// Run `free` on the handle if it is owned; borrowed handles are dropped untouched.
    ///
    /// Returns whether `free` ran.
    pub fn release(self, free: impl FnOnce(H)) -> bool {
        if self.owns {
            free(self.handle);
        }
        self.owns
    }
}

impl<H: Copy> Owned<H> {
    pub fn handle(&self) -> H {
        self.handle
    }
}
