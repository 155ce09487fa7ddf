/* redex-debug-line-map-v2: per-method program counter to line tables */

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::maps::error::MapError;
use crate::maps::{read_u4, read_u8, write_u4, write_u8, REDEX_MAP_MAGIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetLine
{
    pub offset: u32,
    pub line: u32,
}

#[derive(Debug, Default)]
pub struct DebugLineMap
{
    method_id_map: HashMap<u64, Vec<OffsetLine>>,
}

impl DebugLineMap
{
    pub fn new(method_id_map: HashMap<u64, Vec<OffsetLine>>) -> Self
    {
        DebugLineMap { method_id_map }
    }

    pub fn read_from(path: &Path) -> Result<Self, MapError>
    {
        let bytes = fs::read(path).map_err(|e| err!("Unable to read debug line map {}: {}", path.display(), e))?;
        Self::from_bytes(&bytes).map_err(|e| err!(e, "debug line map {}", path.display()))
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
        if version != 1
        {
            fail!("Version mismatch: {}", version);
        }
        let method_count = read_u4(bytes, &mut ix)?;

        // (method id, offset, size)
        let mut method_datas = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count
        {
            let method_id = read_u8(bytes, &mut ix)?;
            let offset = read_u4(bytes, &mut ix)?;
            let size = read_u4(bytes, &mut ix)?;
            method_datas.push((method_id, offset, size));
        }

        let mut method_id_map = HashMap::new();
        for (i, (expected_id, _, size)) in method_datas.iter().enumerate()
        {
            let method_id = read_u8(bytes, &mut ix)?;
            if method_id != *expected_id
            {
                fail!(("Method id mismatch: {} != {}", method_id, expected_id), ("method {}", i));
            }
            if method_id_map.contains_key(&method_id)
            {
                fail!("Found duplicate method id entry: {}", method_id);
            }
            let line_mapping_count = size.saturating_sub(8) / 8;
            if line_mapping_count > 0
            {
                let mut line_mappings = Vec::with_capacity(line_mapping_count as usize);
                for _ in 0..line_mapping_count
                {
                    let offset = read_u4(bytes, &mut ix).map_err(|e| err!(e, "method {}", method_id))?;
                    let line = read_u4(bytes, &mut ix).map_err(|e| err!(e, "method {}", method_id))?;
                    line_mappings.push(OffsetLine { offset, line });
                }
                method_id_map.insert(method_id, line_mappings);
            }
        }
        info!("Unpacked {} methods from debug line map", method_id_map.len());
        Ok(DebugLineMap { method_id_map })
    }

    /// Serializes the map in the on-disk layout, methods ordered by id.
    pub fn to_bytes(&self) -> Vec<u8>
    {
        let mut ids: Vec<_> = self.method_id_map.keys().copied().collect();
        ids.sort_unstable();

        let mut out = vec![];
        write_u4(&mut out, REDEX_MAP_MAGIC);
        write_u4(&mut out, 1);
        write_u4(&mut out, ids.len() as u32);
        let mut offset = 12 + 16 * ids.len() as u32;
        for id in &ids
        {
            let size = 8 + 8 * self.method_id_map[id].len() as u32;
            write_u8(&mut out, *id);
            write_u4(&mut out, offset);
            write_u4(&mut out, size);
            offset += size;
        }
        for id in &ids
        {
            write_u8(&mut out, *id);
            for ol in &self.method_id_map[id]
            {
                write_u4(&mut out, ol.offset);
                write_u4(&mut out, ol.line);
            }
        }
        out
    }

    pub fn len(&self) -> usize
    {
        self.method_id_map.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.method_id_map.is_empty()
    }

    /// Line in effect at program counter `pc` of `method_id`.
    ///
    /// A `pc` before the first entry still resolves to that entry's line, a
    /// rough answer beats none when reading a trace.
    pub fn find_line_number(&self, method_id: u64, pc: u32) -> Option<u32>
    {
        let mappings = self.method_id_map.get(&method_id)?;
        let mut result = None;
        for ol in mappings
        {
            if ol.offset <= pc
            {
                result = Some(ol.line);
            }
            else
            {
                if result.is_none()
                {
                    result = Some(ol.line);
                }
                break;
            }
        }
        result
    }

    pub fn get_mappings(&self, method_id: u64) -> Option<&[OffsetLine]>
    {
        self.method_id_map.get(&method_id).map(Vec::as_slice)
    }
}
