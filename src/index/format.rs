//! On-disk index layout.
//!
//! An index directory holds two files:
//!
//! ```text
//! <root>/
//! ├── meta.json      IndexMeta: version, doc count, segment checksum, field summary
//! └── postings.seg   binary segment
//! ```
//!
//! ## Segment format
//!
//! ```text
//! [4: magic "QRYS"][u32 LE: version][u32 LE: field count]
//! per field (sorted by name):
//!   [u32 LE: name length][name bytes][u8: flags]
//!   [varint: doc count][varint: length] * doc count
//!   [u64 LE: fst length][fst bytes]
//!   [varint: term count]
//!   per term, in dictionary order:
//!     [varint: posting count]
//!     per posting: [varint: doc delta][varint: tf][varint: position delta] * tf (if positions)
//! ```
//!
//! `meta.json` is written last, so a directory without it was never completed.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{QuarryError, Result};
use crate::index::dictionary::TermDictionary;
use crate::index::posting::{Posting, PostingList};
use crate::index::store::{FieldIndex, FieldStats, PostingsStore};
use crate::util::varint;

pub const FORMAT_VERSION: u32 = 1;
pub const META_FILE: &str = "meta.json";
pub const SEGMENT_FILE: &str = "postings.seg";

const MAGIC: &[u8; 4] = b"QRYS";
const FLAG_POSITIONS: u8 = 0x01;

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub doc_count: u32,
    /// Segment file name relative to the index root.
    pub segment: String,
    /// CRC32 of the whole segment file.
    pub checksum: u32,
    pub fields: Vec<FieldStats>,
}

/// Serialize `store` into `root`, replacing any index already there.
pub fn write_index(store: &PostingsStore, root: &Path) -> Result<IndexMeta> {
    fs::create_dir_all(root)?;

    let segment = encode_segment(store)?;
    let meta = IndexMeta {
        format_version: FORMAT_VERSION,
        doc_count: store.doc_count(),
        segment: SEGMENT_FILE.to_string(),
        checksum: crc32fast::hash(&segment),
        fields: store.stats().fields,
    };

    write_atomic(root, SEGMENT_FILE, &segment)?;
    write_atomic(root, META_FILE, &serde_json::to_vec_pretty(&meta)?)?;

    log::debug!(
        "Wrote index to {} ({} documents, {} fields, {} segment bytes)",
        root.display(),
        meta.doc_count,
        meta.fields.len(),
        segment.len()
    );
    Ok(meta)
}

fn write_atomic(root: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(root)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(root.join(name)).map_err(|e| e.error)?;
    Ok(())
}

/// Load the index at `root`. Every failure is reported as `IndexOpen`.
pub fn read_index(root: &Path) -> Result<(IndexMeta, PostingsStore)> {
    if !root.is_dir() {
        return Err(QuarryError::index_open(root, "index directory does not exist"));
    }

    let meta_path = root.join(META_FILE);
    let meta_bytes = fs::read(&meta_path)
        .map_err(|e| QuarryError::index_open(root, format!("cannot read {META_FILE}: {e}")))?;
    let meta: IndexMeta = serde_json::from_slice(&meta_bytes)
        .map_err(|e| QuarryError::index_open(root, format!("malformed {META_FILE}: {e}")))?;

    if meta.format_version != FORMAT_VERSION {
        return Err(QuarryError::index_open(
            root,
            format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                meta.format_version
            ),
        ));
    }

    let segment_path = root.join(&meta.segment);
    let file = File::open(&segment_path).map_err(|e| {
        QuarryError::index_open(root, format!("cannot open segment {}: {e}", meta.segment))
    })?;
    // SAFETY: the index is opened read-only and writers never modify a
    // published segment in place; new segments replace it by rename.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
        QuarryError::index_open(root, format!("cannot map segment {}: {e}", meta.segment))
    })?;

    let checksum = crc32fast::hash(&mmap);
    if checksum != meta.checksum {
        return Err(QuarryError::index_open(
            root,
            format!(
                "segment checksum mismatch (expected {:08x}, found {checksum:08x})",
                meta.checksum
            ),
        ));
    }

    let store = decode_segment(&mmap, meta.doc_count)
        .map_err(|e| QuarryError::index_open(root, format!("corrupt segment: {e}")))?;
    Ok((meta, store))
}

pub(crate) fn encode_segment(store: &PostingsStore) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;

    let names = store.field_names();
    buf.write_u32::<LittleEndian>(names.len() as u32)?;

    for name in names {
        let Some(field) = store.field(name) else {
            continue;
        };
        buf.write_u32::<LittleEndian>(name.len() as u32)?;
        buf.extend_from_slice(name.as_bytes());
        buf.write_u8(if field.has_positions() { FLAG_POSITIONS } else { 0 })?;

        let lengths = field.doc_lengths();
        varint::write_u64(&mut buf, lengths.len() as u64);
        for &len in lengths {
            varint::write_u32(&mut buf, len);
        }

        let fst_bytes = field.dictionary().as_bytes();
        buf.write_u64::<LittleEndian>(fst_bytes.len() as u64)?;
        buf.extend_from_slice(fst_bytes);

        let lists = field.postings_lists();
        varint::write_u64(&mut buf, lists.len() as u64);
        for list in lists {
            varint::write_u64(&mut buf, list.doc_freq() as u64);
            let mut prev_doc = 0;
            for posting in list {
                varint::write_u32(&mut buf, posting.doc_id - prev_doc);
                prev_doc = posting.doc_id;
                varint::write_u32(&mut buf, posting.term_freq);
                if field.has_positions() {
                    let mut prev_pos = 0;
                    for &pos in &posting.positions {
                        varint::write_u32(&mut buf, pos - prev_pos);
                        prev_pos = pos;
                    }
                }
            }
        }
    }

    Ok(buf)
}

/// Cursor over segment bytes.
struct SegmentCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SegmentCursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| QuarryError::other(format!("unexpected end of segment at {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn varint(&mut self) -> Result<u64> {
        varint::read_u64(self.bytes, &mut self.pos)
    }

    fn varint_u32(&mut self) -> Result<u32> {
        varint::read_u32(self.bytes, &mut self.pos)
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.varint()?;
        // Every counted item takes at least one byte, which bounds allocations
        // on corrupt input.
        if n > (self.bytes.len() - self.pos) as u64 {
            return Err(QuarryError::other(format!("{what} count {n} exceeds segment size")));
        }
        Ok(n as usize)
    }
}

pub(crate) fn decode_segment(bytes: &[u8], doc_count: u32) -> Result<PostingsStore> {
    let mut cur = SegmentCursor { bytes, pos: 0 };

    if cur.take(MAGIC.len())? != MAGIC {
        return Err(QuarryError::other("bad magic"));
    }
    let version = cur.u32_le()?;
    if version != FORMAT_VERSION {
        return Err(QuarryError::other(format!(
            "segment version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let mut store = PostingsStore::new(doc_count);
    let field_count = cur.u32_le()?;
    for _ in 0..field_count {
        let name_len = cur.u32_le()? as usize;
        let name = std::str::from_utf8(cur.take(name_len)?)
            .map_err(|e| QuarryError::other(format!("field name is not UTF-8: {e}")))?
            .to_string();
        let has_positions = cur.u8()? & FLAG_POSITIONS != 0;

        let length_count = cur.count("document length")?;
        let mut doc_lengths = Vec::with_capacity(length_count);
        for _ in 0..length_count {
            doc_lengths.push(cur.varint_u32()?);
        }

        let fst_len = usize::try_from(cur.u64_le()?)
            .map_err(|_| QuarryError::other("fst length overflows usize"))?;
        let dictionary = TermDictionary::from_bytes(cur.take(fst_len)?.to_vec())?;

        let term_count = cur.count("term")?;
        let mut postings = Vec::with_capacity(term_count);
        for _ in 0..term_count {
            postings.push(decode_postings(&mut cur, has_positions)?);
        }

        let field = FieldIndex::new(dictionary, postings, doc_lengths, has_positions)?;
        store.insert_field(name, field)?;
    }

    if cur.pos != bytes.len() {
        return Err(QuarryError::other(format!(
            "{} trailing bytes after last field",
            bytes.len() - cur.pos
        )));
    }
    Ok(store)
}

fn decode_postings(cur: &mut SegmentCursor<'_>, has_positions: bool) -> Result<PostingList> {
    let n = cur.count("posting")?;
    let mut postings = Vec::with_capacity(n);
    let mut doc_id = 0u32;
    for i in 0..n {
        let delta = cur.varint_u32()?;
        if i > 0 && delta == 0 {
            return Err(QuarryError::other("postings not strictly ascending"));
        }
        doc_id = doc_id
            .checked_add(delta)
            .ok_or_else(|| QuarryError::other("document id overflow"))?;
        let term_freq = cur.varint_u32()?;

        let mut posting = Posting::new(doc_id, term_freq);
        if has_positions {
            let mut pos = 0u32;
            for j in 0..term_freq {
                let delta = cur.varint_u32()?;
                if j > 0 && delta == 0 {
                    return Err(QuarryError::other("positions not strictly ascending"));
                }
                pos = pos
                    .checked_add(delta)
                    .ok_or_else(|| QuarryError::other("position overflow"))?;
                posting.positions.push(pos);
            }
        }
        postings.push(posting);
    }
    PostingList::from_sorted(postings).ok_or_else(|| QuarryError::other("postings out of order"))
}
