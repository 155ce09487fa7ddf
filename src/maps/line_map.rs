/* redex line number map: string pool plus parent-linked position entries */

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::maps::error::MapError;
use crate::maps::{read_ascii, read_u4, write_u4, write_x, REDEX_MAP_MAGIC};
use crate::types::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MapEntry
{
    class_id: Option<u32>,
    method_id: Option<u32>,
    file_id: u32,
    line: u32,
    // 1-based index of the caller entry, 0 for none
    parent: u32,
}

/// Decoded `redex-line-number-map[-v2]`.
///
/// Every synthetic line number `n` written into the dex refers to entry
/// `n - 1`; following the parent links from there yields the inlining stack,
/// innermost first.
#[derive(Debug, Default)]
pub struct PositionMap
{
    version: u32,
    string_pool: Vec<String>,
    string_ids: HashMap<String, u32>,
    positions: Vec<MapEntry>,
}

impl PositionMap
{
    /// An empty v2 map, filled with [`PositionMap::push_position`].
    pub fn new() -> Self
    {
        PositionMap { version: 2, ..Default::default() }
    }

    pub fn read_from(path: &Path) -> Result<Self, MapError>
    {
        let bytes = fs::read(path).map_err(|e| err!("Unable to read line map {}: {}", path.display(), e))?;
        Self::from_bytes(&bytes).map_err(|e| err!(e, "line map {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MapError>
    {
        let mut ix = 0;
        let magic = read_u4(bytes, &mut ix)?;
        if magic != REDEX_MAP_MAGIC
        {
            fail!("Magic number mismatch: {:#x}", magic);
        }
        let version = read_u4(bytes, &mut ix)?;
        if version != 1 && version != 2
        {
            fail!("Version mismatch: {}", version);
        }

        let mut pmap = PositionMap { version, ..Default::default() };
        let spool_count = read_u4(bytes, &mut ix)?;
        for i in 0..spool_count
        {
            let ssize = read_u4(bytes, &mut ix)? as usize;
            let s = read_ascii(bytes, &mut ix, ssize).map_err(|e| err!(e, "string {}", i))?;
            // ids are positional, duplicates in the pool must keep their slot
            pmap.string_ids.entry(s.clone()).or_insert(i);
            pmap.string_pool.push(s);
        }
        info!("Unpacked {} strings from line map", spool_count);

        let pos_count = read_u4(bytes, &mut ix)?;
        for i in 0..pos_count
        {
            let entry = pmap.read_entry(bytes, &mut ix).map_err(|e| err!(e, "entry {}", i))?;
            pmap.positions.push(entry);
        }
        info!("Unpacked {} map entries from line map", pos_count);
        Ok(pmap)
    }

    fn read_entry(&self, bytes: &[u8], ix: &mut usize) -> Result<MapEntry, MapError>
    {
        let (class_id, method_id) = if self.version == 1
        {
            (None, None)
        }
        else
        {
            (Some(read_u4(bytes, ix)?), Some(read_u4(bytes, ix)?))
        };
        let entry = MapEntry {
            class_id,
            method_id,
            file_id: read_u4(bytes, ix)?,
            line: read_u4(bytes, ix)?,
            parent: read_u4(bytes, ix)?,
        };
        for id in [entry.class_id, entry.method_id, Some(entry.file_id)].into_iter().flatten()
        {
            if id as usize >= self.string_pool.len()
            {
                fail!("String id {} out of range", id);
            }
        }
        Ok(entry)
    }

    /// Encodes the map. v2 entries always carry a method, so a position
    /// pushed without one cannot be written to a v2 map.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MapError>
    {
        let mut out = vec![];
        write_u4(&mut out, REDEX_MAP_MAGIC);
        write_u4(&mut out, self.version);
        write_u4(&mut out, self.string_pool.len() as u32);
        for s in &self.string_pool
        {
            write_u4(&mut out, s.len() as u32);
            write_x(&mut out, s.as_bytes());
        }
        write_u4(&mut out, self.positions.len() as u32);
        for (i, p) in self.positions.iter().enumerate()
        {
            if self.version != 1
            {
                let (Some(class_id), Some(method_id)) = (p.class_id, p.method_id)
                else
                {
                    fail!(("Position without a method in a v{} map", self.version), ("entry {}", i));
                };
                write_u4(&mut out, class_id);
                write_u4(&mut out, method_id);
            }
            write_u4(&mut out, p.file_id);
            write_u4(&mut out, p.line);
            write_u4(&mut out, p.parent);
        }
        Ok(out)
    }

    fn intern(&mut self, s: &str) -> u32
    {
        if let Some(id) = self.string_ids.get(s)
        {
            return *id;
        }
        let id = self.string_pool.len() as u32;
        self.string_pool.push(s.to_string());
        self.string_ids.insert(s.to_string(), id);
        id
    }

    /// Appends a position and returns its 0-based index.
    ///
    /// `method` is fully qualified (`pkg.Class.method`); it is split at the
    /// last dot into class and method names. `parent` is the 1-based index
    /// of the caller position, or 0.
    pub fn push_position(&mut self, method: Option<&str>, file: &str, line: u32, parent: u32) -> u32
    {
        let (class_id, method_id) = match method.and_then(|m| m.rsplit_once('.'))
        {
            Some((cls, name)) => (Some(self.intern(cls)), Some(self.intern(name))),
            None => (None, None),
        };
        let file_id = self.intern(file);
        self.positions.push(MapEntry { class_id, method_id, file_id, line, parent });
        (self.positions.len() - 1) as u32
    }

    pub fn len(&self) -> usize
    {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.positions.is_empty()
    }

    /// Returns the position stack rooted at `idx`, empty when `idx` is out of range.
    pub fn get_stack(&self, idx: i64) -> Vec<Position>
    {
        let start = idx;
        let mut stack = vec![];
        let mut idx = idx;
        while idx >= 0 && (idx as usize) < self.positions.len()
        {
            let pi = &self.positions[idx as usize];
            let method = match (pi.class_id, pi.method_id)
            {
                (Some(c), Some(m)) => Some(format!(
                    "{}.{}",
                    self.string_pool[c as usize], self.string_pool[m as usize]
                )),
                _ => None,
            };
            stack.push(Position {
                method,
                file: self.string_pool[pi.file_id as usize].clone(),
                line: pi.line,
            });
            idx = pi.parent as i64 - 1;
            if stack.len() > self.positions.len()
            {
                warn!("Parent cycle in line map starting at {}", start);
                break;
            }
        }
        stack
    }
}
