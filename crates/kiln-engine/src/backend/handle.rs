//! Opaque GPU resource handles.
//!
//! Handles are plain `u64`s so they can travel through the command stream.
//! Backends mint them from generational slot keys: a handle to a destroyed
//! resource never aliases a newer one.

use bytemuck::{Pod, Zeroable};
use slotmap::{Key, KeyData};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Pod, Zeroable)]
        pub struct $name(u64);

        impl $name {
            /// Never refers to a live resource.
            pub const NULL: Self = Self(0);

            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }

            #[inline]
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            #[inline]
            pub(crate) fn from_key<K: Key>(key: K) -> Self {
                Self(key.data().as_ffi())
            }

            #[inline]
            pub(crate) fn to_key<K: Key>(self) -> K {
                K::from(KeyData::from_ffi(self.0))
            }
        }
    };
}

handle_type!(
    /// Vertex (+ optional index) buffer owned by a backend.
    GpuBufferHandle
);
handle_type!(
    /// 2D or cube texture owned by a backend.
    TextureHandle
);
handle_type!(
    /// Linked shader program owned by a backend.
    ShaderHandle
);

slotmap::new_key_type! {
    pub(crate) struct BufferKey;
    pub(crate) struct TextureKey;
    pub(crate) struct ShaderKey;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn handle_round_trips_through_key() {
        let mut map: SlotMap<BufferKey, u32> = SlotMap::with_key();
        let key = map.insert(7);
        let handle = GpuBufferHandle::from_key(key);
        assert!(!handle.is_null());
        assert_eq!(map.get(handle.to_key::<BufferKey>()), Some(&7));
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut map: SlotMap<BufferKey, u32> = SlotMap::with_key();
        let old = GpuBufferHandle::from_key(map.insert(1));
        map.remove(old.to_key::<BufferKey>());
        let _new = map.insert(2);
        assert!(map.get(old.to_key::<BufferKey>()).is_none());
    }

    #[test]
    fn null_handle_resolves_to_nothing() {
        let mut map: SlotMap<ShaderKey, u32> = SlotMap::with_key();
        map.insert(1);
        assert!(map.get(ShaderHandle::NULL.to_key::<ShaderKey>()).is_none());
    }
}
