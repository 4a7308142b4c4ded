// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! FlatBuffers accessors for the legacy search-response schema.
//!
//! ```text
//! struct Hash { bytes: [ubyte:32]; }
//! table TagWithBlame       { tag: string; user: uint; }
//! table AttributeWithBlame { key: string; value: string; user: uint; }
//! table Image    { id: uint; hash: Hash; tags: [TagWithBlame];
//!                  attributes: [AttributeWithBlame]; }
//! table IdResponse    { ids: [uint]; }
//! table HashResponse  { hashes: [Hash]; }
//! table ImageResponse { images: [Image]; }
//! union ResponseData { IdResponse = 1, HashResponse = 2, ImageResponse = 3 }
//! table SearchResultResponse { data: ResponseData; }
//! root_type SearchResultResponse;
//! ```
//!
//! The `flatbuffers` runtime marks field access `unsafe` because it trusts
//! the buffer. Every accessor here is only reachable through
//! [`verified_root`], which runs the verifier over the whole tree first.

#![allow(unsafe_code)]

use flatbuffers::{
    Follow, ForwardsUOffset, InvalidFlatbuffer, Push, PushAlignment, SimpleToVerifyInSlice,
    Table, VOffsetT, Vector, Verifiable, Verifier, VerifierOptions,
};

use crate::types::ImageHash;
use crate::wire::header::HASH_STRIDE;

// ============================================================================
// VTABLE SLOTS
// ============================================================================

pub const RESPONSE_DATA_TYPE: VOffsetT = 4;
pub const RESPONSE_DATA: VOffsetT = 6;
pub const LIST_ITEMS: VOffsetT = 4;
pub const IMAGE_ID: VOffsetT = 4;
pub const IMAGE_HASH: VOffsetT = 6;
pub const IMAGE_TAGS: VOffsetT = 8;
pub const IMAGE_ATTRIBUTES: VOffsetT = 10;
pub const TAG_NAME: VOffsetT = 4;
pub const TAG_USER: VOffsetT = 6;
pub const ATTR_KEY: VOffsetT = 4;
pub const ATTR_VALUE: VOffsetT = 6;
pub const ATTR_USER: VOffsetT = 8;

/// `ResponseData` union discriminants.
pub mod data_type {
    pub const NONE: u8 = 0;
    pub const IDS: u8 = 1;
    pub const HASHES: u8 = 2;
    pub const IMAGES: u8 = 3;
}

// ============================================================================
// HASH STRUCT
// ============================================================================

/// Inline 32-byte struct, used both as a table field and a vector element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct HashStruct(pub [u8; HASH_STRIDE]);

impl<'a> Follow<'a> for HashStruct {
    type Inner = ImageHash;

    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        let mut bytes = [0u8; HASH_STRIDE];
        bytes.copy_from_slice(&buf[loc..loc + HASH_STRIDE]);
        ImageHash(bytes)
    }
}

impl Push for HashStruct {
    type Output = HashStruct;

    unsafe fn push(&self, dst: &mut [u8], _written_len: usize) {
        dst.copy_from_slice(&self.0);
    }

    fn alignment() -> PushAlignment {
        PushAlignment::new(1)
    }
}

impl Verifiable for HashStruct {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.in_buffer::<Self>(pos)
    }
}

impl SimpleToVerifyInSlice for HashStruct {}

// ============================================================================
// TABLES
// ============================================================================

/// Declares a table wrapper with its `Follow` impl.
macro_rules! table {
    ($name:ident) => {
        #[derive(Clone, Copy)]
        pub struct $name<'a> {
            tab: Table<'a>,
        }

        impl<'a> Follow<'a> for $name<'a> {
            type Inner = $name<'a>;

            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                // SAFETY: `loc` came from a verified offset
                Self {
                    tab: Table::new(buf, loc),
                }
            }
        }
    };
}

table!(SearchResultResponse);
table!(IdResponse);
table!(HashResponse);
table!(ImageResponse);
table!(Image);
table!(TagWithBlame);
table!(AttributeWithBlame);

type TableVector<'a, T> = Vector<'a, ForwardsUOffset<T>>;

impl<'a> SearchResultResponse<'a> {
    pub fn loc(&self) -> usize {
        self.tab.loc()
    }

    pub fn data_type(&self) -> u8 {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<u8>(RESPONSE_DATA_TYPE, Some(data_type::NONE)) }
            .unwrap_or(data_type::NONE)
    }

    fn data(&self) -> Option<Table<'a>> {
        // SAFETY: verified in `verified_root`, union member checked against data_type
        unsafe { self.tab.get::<ForwardsUOffset<Table<'a>>>(RESPONSE_DATA, None) }
    }

    pub fn data_as_ids(&self) -> Option<IdResponse<'a>> {
        (self.data_type() == data_type::IDS)
            .then(|| self.data().map(|tab| IdResponse { tab }))
            .flatten()
    }

    pub fn data_as_hashes(&self) -> Option<HashResponse<'a>> {
        (self.data_type() == data_type::HASHES)
            .then(|| self.data().map(|tab| HashResponse { tab }))
            .flatten()
    }

    pub fn data_as_images(&self) -> Option<ImageResponse<'a>> {
        (self.data_type() == data_type::IMAGES)
            .then(|| self.data().map(|tab| ImageResponse { tab }))
            .flatten()
    }
}

impl<'a> IdResponse<'a> {
    pub fn ids(&self) -> Option<Vector<'a, u32>> {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<Vector<'a, u32>>>(LIST_ITEMS, None) }
    }
}

impl<'a> HashResponse<'a> {
    pub fn hashes(&self) -> Option<Vector<'a, HashStruct>> {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<Vector<'a, HashStruct>>>(LIST_ITEMS, None) }
    }
}

impl<'a> ImageResponse<'a> {
    pub fn images(&self) -> Option<TableVector<'a, Image<'a>>> {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<TableVector<'a, Image<'a>>>>(LIST_ITEMS, None) }
    }
}

impl<'a> Image<'a> {
    pub fn id(&self) -> Option<u32> {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<u32>(IMAGE_ID, None) }
    }

    pub fn hash(&self) -> Option<ImageHash> {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<HashStruct>(IMAGE_HASH, None) }
    }

    pub fn tags(&self) -> Option<TableVector<'a, TagWithBlame<'a>>> {
        // SAFETY: verified in `verified_root`
        unsafe {
            self.tab
                .get::<ForwardsUOffset<TableVector<'a, TagWithBlame<'a>>>>(IMAGE_TAGS, None)
        }
    }

    pub fn attributes(&self) -> Option<TableVector<'a, AttributeWithBlame<'a>>> {
        // SAFETY: verified in `verified_root`
        unsafe {
            self.tab.get::<ForwardsUOffset<TableVector<'a, AttributeWithBlame<'a>>>>(
                IMAGE_ATTRIBUTES,
                None,
            )
        }
    }
}

impl<'a> TagWithBlame<'a> {
    pub fn loc(&self) -> usize {
        self.tab.loc()
    }

    pub fn tag(&self) -> &'a str {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<&'a str>>(TAG_NAME, None) }.unwrap_or_default()
    }

    pub fn user(&self) -> u32 {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<u32>(TAG_USER, Some(0)) }.unwrap_or(0)
    }
}

impl<'a> AttributeWithBlame<'a> {
    pub fn loc(&self) -> usize {
        self.tab.loc()
    }

    pub fn key(&self) -> &'a str {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<&'a str>>(ATTR_KEY, None) }.unwrap_or_default()
    }

    pub fn value(&self) -> &'a str {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<ForwardsUOffset<&'a str>>(ATTR_VALUE, None) }.unwrap_or_default()
    }

    pub fn user(&self) -> u32 {
        // SAFETY: verified in `verified_root`
        unsafe { self.tab.get::<u32>(ATTR_USER, Some(0)) }.unwrap_or(0)
    }
}

// ============================================================================
// VERIFICATION
// ============================================================================

impl Verifiable for SearchResultResponse<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_union::<u8, _>(
                "data_type",
                RESPONSE_DATA_TYPE,
                "data",
                RESPONSE_DATA,
                false,
                |key, v, pos| match key {
                    data_type::IDS => {
                        v.verify_union_variant::<ForwardsUOffset<IdResponse<'_>>>("IdResponse", pos)
                    }
                    data_type::HASHES => v
                        .verify_union_variant::<ForwardsUOffset<HashResponse<'_>>>(
                            "HashResponse",
                            pos,
                        ),
                    data_type::IMAGES => v
                        .verify_union_variant::<ForwardsUOffset<ImageResponse<'_>>>(
                            "ImageResponse",
                            pos,
                        ),
                    // Unknown members are reported by the decoder
                    _ => Ok(()),
                },
            )?
            .finish();
        Ok(())
    }
}

impl Verifiable for IdResponse<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, u32>>>("ids", LIST_ITEMS, false)?
            .finish();
        Ok(())
    }
}

impl Verifiable for HashResponse<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, HashStruct>>>("hashes", LIST_ITEMS, false)?
            .finish();
        Ok(())
    }
}

impl Verifiable for ImageResponse<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<TableVector<'_, Image<'_>>>>(
                "images", LIST_ITEMS, false,
            )?
            .finish();
        Ok(())
    }
}

impl Verifiable for Image<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u32>("id", IMAGE_ID, false)?
            .visit_field::<HashStruct>("hash", IMAGE_HASH, false)?
            .visit_field::<ForwardsUOffset<TableVector<'_, TagWithBlame<'_>>>>(
                "tags", IMAGE_TAGS, false,
            )?
            .visit_field::<ForwardsUOffset<TableVector<'_, AttributeWithBlame<'_>>>>(
                "attributes",
                IMAGE_ATTRIBUTES,
                false,
            )?
            .finish();
        Ok(())
    }
}

impl Verifiable for TagWithBlame<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("tag", TAG_NAME, false)?
            .visit_field::<u32>("user", TAG_USER, false)?
            .finish();
        Ok(())
    }
}

impl Verifiable for AttributeWithBlame<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("key", ATTR_KEY, false)?
            .visit_field::<ForwardsUOffset<&str>>("value", ATTR_VALUE, false)?
            .visit_field::<u32>("user", ATTR_USER, false)?
            .finish();
        Ok(())
    }
}

/// Verify the whole buffer, then hand out the root table.
pub fn verified_root<'a>(
    bytes: &'a [u8],
    opts: &VerifierOptions,
) -> Result<SearchResultResponse<'a>, InvalidFlatbuffer> {
    flatbuffers::root_with_opts::<SearchResultResponse<'a>>(opts, bytes)
}
