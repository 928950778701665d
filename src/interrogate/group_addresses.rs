//! The group address table, wherever the device keeps it.
//!
//! Tables are tried in order: the fixed location of mask 0x5705, the address table object
//! (its elements, or the memory its table reference points to) and finally the legacy table
//! at 0x0116. The first table holding any group address wins.

use super::{Error, Session, Skip};
use crate::codec::{self, Malformed};
use crate::objects::{ObjectType, pid};
use crate::parameters::CommonParameter;
use tracing::debug;

const MASK_5705_TABLE: u16 = 0x4000;
const LEGACY_TABLE: u16 = 0x0116;

type Table = Option<(String, Vec<u8>)>;

pub(super) fn read(session: &mut Session<'_, '_>) -> Result<(), Error> {
    if session.group_addresses_done {
        return Ok(());
    }
    session.group_addresses_done = true;
    let mut table = None;
    if session.descriptor.mask_version() == 0x5705 {
        table = session.attempt("mask 0x5705 table", |s| flat_table(s, MASK_5705_TABLE))?;
    }
    if table.is_none() {
        table = session.attempt("address table object", object_table)?;
    }
    if table.is_none() {
        table = session.attempt("legacy table", legacy_table)?;
    }
    if let Some((value, raw)) = table {
        session.emit(CommonParameter::GroupAddresses, value, raw);
    }
    Ok(())
}

impl Session<'_, '_> {
    /// Runs one way of reading the table, treating its failure as "no table here".
    fn attempt(
        &mut self,
        source: &'static str,
        read: impl FnOnce(&mut Self) -> Result<Table, Skip>,
    ) -> Result<Table, Error> {
        match read(self) {
            Ok(table) => Ok(table),
            Err(Skip::Abort(e)) => Err(e.into()),
            Err(e) => {
                debug!(message = "no group address table", source, error = ?e);
                Ok(None)
            }
        }
    }
}

/// 1-byte entry count, then the entries. The first entry is the individual address of the device
/// and bit 15 of the others marks addresses the device responds to.
fn flat_table(session: &mut Session<'_, '_>, address: u16) -> Result<Table, Skip> {
    let length = session.memory(address, 1)?;
    let entries = u16::from(*length.first().ok_or(Malformed { expected: 1, actual: 0 })?);
    if entries <= 1 {
        return Ok(None);
    }
    let data = session.memory(address.wrapping_add(1), entries * 2)?;
    let value = codec::group_addresses_with_responder(data.get(2..).unwrap_or_default())?;
    Ok(non_empty(value, [length, data].concat()))
}

fn object_table(session: &mut Session<'_, '_>) -> Result<Table, Skip> {
    let Some(index) = session.objects.first(ObjectType::AddressTable) else {
        return Ok(None);
    };
    match session.property_elements(index, pid::TABLE) {
        Ok(data) => {
            let value = codec::group_addresses(&data)?;
            return Ok(non_empty(value, data));
        }
        Err(Skip::Abort(e)) => return Err(Skip::Abort(e)),
        Err(e) => debug!(message = "address table has no elements", error = ?e),
    }
    let reference = session.property(index, pid::TABLE_REFERENCE)?;
    let Some(reference) = reference.first_chunk::<4>() else {
        return Err(Malformed { expected: 4, actual: reference.len() }.into());
    };
    let pointer = u16::from_be_bytes([reference[2], reference[3]]);
    debug!(message = "following the table reference", pointer);
    table_at(session, pointer)
}

fn legacy_table(session: &mut Session<'_, '_>) -> Result<Table, Skip> {
    table_at(session, LEGACY_TABLE)
}

/// A table in memory, in the format the device generation uses.
fn table_at(session: &mut Session<'_, '_>, address: u16) -> Result<Table, Skip> {
    if session.system_b {
        system_b_table(session, address)
    } else {
        flat_table(session, address)
    }
}

/// System B devices use a 16-bit entry count and keep no individual address in the table.
fn system_b_table(session: &mut Session<'_, '_>, address: u16) -> Result<Table, Skip> {
    let length = session.memory(address, 2)?;
    let Some(entries) = length.first_chunk::<2>().map(|l| u16::from_be_bytes(*l)) else {
        return Err(Malformed { expected: 2, actual: length.len() }.into());
    };
    if entries == 0 {
        return Ok(None);
    }
    let Some(size) = entries.checked_mul(2) else {
        debug!(message = "group address table does not fit in memory", entries);
        return Ok(None);
    };
    let data = session.memory(address.wrapping_add(2), size)?;
    let value = codec::group_addresses(&data)?;
    Ok(non_empty(value, [length, data].concat()))
}

fn non_empty(value: String, raw: Vec<u8>) -> Table {
    (!value.is_empty()).then_some((value, raw))
}
