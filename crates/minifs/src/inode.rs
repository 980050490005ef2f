//! The on-disk inode record and its (de)serialization into a 64-byte slot.

use serde::{Deserialize, Serialize};

use crate::layout::{DIRECT_POINTERS, INODE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum InodeType {
    Free = 0,
    File = 1,
    Directory = 2,
}

impl InodeType {
    fn from_raw(raw: i16) -> Self {
        match raw {
            1 => InodeType::File,
            2 => InodeType::Directory,
            _ => InodeType::Free,
        }
    }
}

/// The in-memory mirror of a 64-byte on-disk inode slot. `addrs` holds
/// direct block pointers only; there is no indirect block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub kind: InodeType,
    pub link_count: i16,
    pub size_bytes: u32,
    pub addrs: [u32; DIRECT_POINTERS],
}

impl Inode {
    pub fn free() -> Self {
        Self {
            kind: InodeType::Free,
            link_count: 0,
            size_bytes: 0,
            addrs: [0; DIRECT_POINTERS],
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind == InodeType::Free
    }

    /// Number of direct pointers currently occupied, i.e. the count of
    /// leading non-zero `addrs` entries before the first hole.
    pub fn blocks_in_use(&self) -> usize {
        self.addrs.iter().take_while(|&&a| a != 0).count()
    }
}

/// On-the-wire representation, encoded with `bincode`'s fixed-width
/// integer config for a byte-exact, host-endian-independent layout.
#[derive(Serialize, Deserialize)]
struct RawInode {
    kind: i16,
    link_count: i16,
    size_bytes: u32,
    addrs: [u32; DIRECT_POINTERS],
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Encodes `inode` into a zero-padded `INODE_SIZE`-byte slot.
pub fn encode_inode(inode: &Inode) -> [u8; INODE_SIZE as usize] {
    let raw = RawInode {
        kind: inode.kind as i16,
        link_count: inode.link_count,
        size_bytes: inode.size_bytes,
        addrs: inode.addrs,
    };
    let mut slot = [0u8; INODE_SIZE as usize];
    bincode::serde::encode_into_slice(&raw, &mut slot, bincode_config())
        .expect("inode record fits in its slot");
    slot
}

/// Decodes an inode out of an `INODE_SIZE`-byte slot.
pub fn decode_inode(slot: &[u8]) -> Inode {
    let (raw, _): (RawInode, usize) =
        bincode::serde::decode_from_slice(slot, bincode_config()).expect("inode slot is well-formed");
    Inode {
        kind: InodeType::from_raw(raw.kind),
        link_count: raw.link_count,
        size_bytes: raw.size_bytes,
        addrs: raw.addrs,
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = InodeType> {
        prop_oneof![
            Just(InodeType::Free),
            Just(InodeType::File),
            Just(InodeType::Directory),
        ]
    }

    proptest! {
        /// Every inode value the allocator can ever produce survives an
        /// encode/decode round trip through its on-disk slot unchanged.
        #[test]
        fn encode_decode_is_lossless(
            kind in any_kind(),
            link_count in 0i16..1000,
            size_bytes in 0u32..=crate::layout::MAX_FILE_SIZE,
            addrs in proptest::collection::vec(0u32..crate::layout::BLOCK_COUNT, DIRECT_POINTERS..=DIRECT_POINTERS),
        ) {
            let inode = Inode {
                kind,
                link_count,
                size_bytes,
                addrs: addrs.try_into().unwrap(),
            };
            let slot = encode_inode(&inode);
            prop_assert_eq!(decode_inode(&slot), inode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut inode = Inode::free();
        inode.kind = InodeType::Directory;
        inode.link_count = 2;
        inode.size_bytes = 64;
        inode.addrs[0] = 19;
        let slot = encode_inode(&inode);
        assert_eq!(decode_inode(&slot), inode);
    }

    #[test]
    fn blocks_in_use_stops_at_first_hole() {
        let mut inode = Inode::free();
        inode.addrs[0] = 10;
        inode.addrs[1] = 11;
        inode.addrs[3] = 13;
        assert_eq!(inode.blocks_in_use(), 2);
    }
}
