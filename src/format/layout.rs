//! Record geometry and link-field access
//!
//! A record is an opaque fixed-size byte block: caller payload plus two
//! consecutive link words (left, right) at a known offset. This module is
//! the only place that touches the link-field bytes directly; everything
//! above it works with whole records and identities.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Result, TreeFileError};

/// Bytes occupied by one link word on disk
pub const LINK_WORD_LEN: usize = 8;

/// Bytes occupied by the left+right link pair
pub const LINK_PAIR_LEN: usize = 2 * LINK_WORD_LEN;

/// Geometry of one fixed-size record: total byte length plus where the
/// two child-link words live inside it
///
/// Every record of one file shares the same geometry; mixing geometries
/// corrupts reconstruction silently, so the layout is validated once at
/// construction and then carried by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    record_size: usize,
    link_offset: usize,
}

impl RecordLayout {
    /// Validate and build a layout
    ///
    /// Rejects geometry that cannot hold both link words inside the
    /// record, which would otherwise read or write out of bounds.
    pub fn new(record_size: usize, link_offset: usize) -> Result<Self> {
        let links_end = link_offset.checked_add(LINK_PAIR_LEN);
        if record_size == 0 || links_end.map_or(true, |end| end > record_size) {
            return Err(TreeFileError::InvalidLayout(format!(
                "record of {record_size} bytes cannot hold two link words at offset {link_offset}"
            )));
        }
        Ok(Self {
            record_size,
            link_offset,
        })
    }

    /// Build a layout whose geometry is known valid at compile time
    pub(crate) const fn assume(record_size: usize, link_offset: usize) -> Self {
        Self {
            record_size,
            link_offset,
        }
    }

    /// Byte length of one record
    #[inline]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Byte offset of the link pair inside a record
    #[inline]
    pub fn link_offset(&self) -> usize {
        self.link_offset
    }

    /// Read the (left, right) link words of a record
    ///
    /// On disk these hold child identities; 0 means "no child".
    pub fn read_links(&self, record: &[u8]) -> (u64, u64) {
        debug_assert_eq!(record.len(), self.record_size);
        let off = self.link_offset;
        let left = LittleEndian::read_u64(&record[off..off + LINK_WORD_LEN]);
        let right = LittleEndian::read_u64(&record[off + LINK_WORD_LEN..off + LINK_PAIR_LEN]);
        (left, right)
    }

    /// Overwrite the (left, right) link words of a record
    pub fn write_links(&self, record: &mut [u8], left: u64, right: u64) {
        debug_assert_eq!(record.len(), self.record_size);
        let off = self.link_offset;
        LittleEndian::write_u64(&mut record[off..off + LINK_WORD_LEN], left);
        LittleEndian::write_u64(&mut record[off + LINK_WORD_LEN..off + LINK_PAIR_LEN], right);
    }

    /// Zero both link words
    ///
    /// Used after link resolution so a rebuilt record never carries a
    /// stale identity in its byte image.
    pub fn clear_links(&self, record: &mut [u8]) {
        self.write_links(record, 0, 0);
    }

    /// The record bytes excluding the link pair, as the slices before and
    /// after it
    ///
    /// Shape/payload comparisons go through this so link storage never
    /// participates in equality.
    pub fn payload<'a>(&self, record: &'a [u8]) -> (&'a [u8], &'a [u8]) {
        debug_assert_eq!(record.len(), self.record_size);
        (
            &record[..self.link_offset],
            &record[self.link_offset + LINK_PAIR_LEN..],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_geometry_without_room_for_links() {
        assert!(RecordLayout::new(0, 0).is_err());
        assert!(RecordLayout::new(15, 0).is_err());
        assert!(RecordLayout::new(40, 25).is_err());
        assert!(RecordLayout::new(40, usize::MAX).is_err());
        assert!(RecordLayout::new(16, 0).is_ok());
        assert!(RecordLayout::new(40, 24).is_ok());
    }

    #[test]
    fn links_round_trip_at_offset() {
        let layout = RecordLayout::new(24, 4).unwrap();
        let mut record = [0xAAu8; 24];

        layout.write_links(&mut record, 7, 0);
        assert_eq!(layout.read_links(&record), (7, 0));

        // payload bytes around the link pair are untouched
        let (head, tail) = layout.payload(&record);
        assert!(head.iter().all(|&b| b == 0xAA));
        assert!(tail.iter().all(|&b| b == 0xAA));

        layout.clear_links(&mut record);
        assert_eq!(layout.read_links(&record), (0, 0));
    }
}
