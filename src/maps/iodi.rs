/* iodi-metadata: qualified method name to debug line map method id */

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::maps::debug_line_map::{DebugLineMap, OffsetLine};
use crate::maps::error::MapError;
use crate::maps::{read_ascii, read_u2, read_u4, read_u8, write_u2, write_u4, write_u8, write_x};

pub const IODI_METADATA_MAGIC: u32 = 0xFACEB001;

// Must agree with the layer encoding the optimizer writes into line numbers
pub const IODI_LAYER_BITS: u32 = 4;
pub const IODI_LAYER_SHIFT: u32 = 32 - IODI_LAYER_BITS;
pub const IODI_DATA_MASK: u32 = (1 << IODI_LAYER_SHIFT) - 1;
pub const IODI_LAYER_MASK: u32 = ((1 << IODI_LAYER_BITS) - 1) << IODI_LAYER_SHIFT;

/// Methods whose debug info was shared through IODI, keyed by
/// `pkg.Class.method` with an `@layer` suffix for layers above zero.
#[derive(Debug, Default, Serialize)]
pub struct IodiMetadata
{
    entries: BTreeMap<String, u64>,
}

impl IodiMetadata
{
    pub fn new(entries: BTreeMap<String, u64>) -> Self
    {
        IodiMetadata { entries }
    }

    pub fn read_from(path: &Path) -> Result<Self, MapError>
    {
        let bytes = fs::read(path).map_err(|e| err!("Unable to read iodi metadata {}: {}", path.display(), e))?;
        Self::from_bytes(&bytes).map_err(|e| err!(e, "iodi metadata {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MapError>
    {
        let mut ix = 0;
        let magic = read_u4(bytes, &mut ix)?;
        if magic != IODI_METADATA_MAGIC
        {
            fail!("Unexpected magic: {:#x}", magic);
        }
        let version = read_u4(bytes, &mut ix)?;
        if version != 1
        {
            fail!("Unexpected version: {}", version);
        }
        let count = read_u4(bytes, &mut ix)?;
        let zero = read_u4(bytes, &mut ix)?;
        if zero != 0
        {
            fail!("Unexpected zero: {}", zero);
        }

        let mut entries = BTreeMap::new();
        for i in 0..count
        {
            let klen = read_u2(bytes, &mut ix).map_err(|e| err!(e, "entry {}", i))? as usize;
            let method_id = read_u8(bytes, &mut ix).map_err(|e| err!(e, "entry {}", i))?;
            let key = read_ascii(bytes, &mut ix, klen).map_err(|e| err!(e, "entry {}", i))?;
            entries.insert(key, method_id);
        }
        info!("Unpacked {} methods from iodi metadata", entries.len());
        Ok(IodiMetadata { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MapError>
    {
        let mut out = vec![];
        write_u4(&mut out, IODI_METADATA_MAGIC);
        write_u4(&mut out, 1);
        write_u4(&mut out, self.entries.len() as u32);
        write_u4(&mut out, 0);
        for (key, method_id) in &self.entries
        {
            if key.len() > u16::MAX as usize || !key.is_ascii()
            {
                fail!("Cannot encode iodi key {}", key);
            }
            write_u2(&mut out, key.len() as u16);
            write_u8(&mut out, *method_id);
            write_x(&mut out, key.as_bytes());
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<(), MapError>
    {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Resolves a line number as it appears in a dump or trace.
    ///
    /// Returns the mapped line (if any) and the debug line map method id of
    /// the IODI entry (if the method is known). A layered line number that
    /// cannot be resolved through the debug line map still yields its
    /// de-layered value.
    pub fn map_iodi(
        &self,
        debug_line_map: &DebugLineMap,
        class_name: &str,
        method_name: &str,
        input_lineno: u32,
    ) -> (Option<u32>, Option<u64>)
    {
        let mut qualified_name = format!("{}.{}", class_name, method_name);
        let layer = (input_lineno & IODI_LAYER_MASK) >> IODI_LAYER_SHIFT;
        debug!("IODI layer {}", layer);
        let mut adjusted_lineno = input_lineno;
        if layer > 0
        {
            qualified_name.push_str(&format!("@{}", layer));
            adjusted_lineno = input_lineno & IODI_DATA_MASK;
        }
        debug!("IODI adjusted line no {}", adjusted_lineno);
        let res_lineno = if input_lineno == adjusted_lineno { None } else { Some(adjusted_lineno) };

        match self.entries.get(&qualified_name)
        {
            Some(method_id) =>
            {
                debug!("Found {} in entries", qualified_name);
                let mapped = debug_line_map.find_line_number(*method_id, adjusted_lineno);
                (mapped.or(res_lineno), Some(*method_id))
            }
            None => (res_lineno, None),
        }
    }

    /// Full pc to line table of a method that was emitted without its own debug info.
    pub fn map_iodi_no_debug_to_mappings<'a>(
        &self,
        debug_line_map: &'a DebugLineMap,
        class_name: &str,
        method_name: &str,
    ) -> Option<&'a [OffsetLine]>
    {
        let method_id = self.entries.get(&format!("{}.{}", class_name, method_name))?;
        debug_line_map.get_mappings(*method_id)
    }
}
