//! Security object, mostly read through function property state requests.

use super::{Error, Session, Skip};
use crate::codec;
use crate::objects::{ObjectType, pid};
use crate::parameters::SecurityParameter;

const SERVICE_COUNTERS: u8 = 0;
const SERVICE_LOG_ENTRY: u8 = 1;
/// The device keeps this many of its most recent failures.
const FAILURE_LOG_ENTRIES: u8 = 5;

pub(super) fn read(session: &mut Session<'_, '_>) -> Result<(), Error> {
    let object_type = ObjectType::Security;
    for (instance, index) in (1..).zip(session.objects.indices(object_type).to_vec()) {
        session.cursor.enter_object(object_type);
        read_object(session, index, instance)?;
    }
    Ok(())
}

fn read_object(session: &mut Session<'_, '_>, index: u8, instance: u8) -> Result<(), Error> {
    use SecurityParameter::*;
    let mode = function_property(session, instance, pid::security::SECURITY_MODE, 0, &[])
        .and_then(|raw| Ok((codec::security_mode(&raw)?, raw)));
    session.settle(SecurityMode, mode)?;
    session.decode_property(
        SecurityFailure,
        index,
        pid::security::SECURITY_REPORT,
        codec::security_failure,
    )?;
    let counters = function_property(
        session,
        instance,
        pid::security::SECURITY_FAILURES_LOG,
        SERVICE_COUNTERS,
        &[],
    )
    .and_then(|raw| Ok((codec::security_failure_counters(&raw)?, raw)));
    session.settle(SecurityFailureCounters, counters)?;

    for entry in 0..FAILURE_LOG_ENTRIES {
        let read = function_property(
            session,
            instance,
            pid::security::SECURITY_FAILURES_LOG,
            SERVICE_LOG_ENTRY,
            &[entry],
        )
        .and_then(|raw| Ok((codec::security_failure_log_entry(&raw)?, raw)));
        if session.settle(LastSecurityFailure, read)?.is_none() {
            break;
        }
    }
    Ok(())
}

/// A function property state read of the security object; empty responses count as absent.
fn function_property(
    session: &mut Session<'_, '_>,
    instance: u8,
    pid: u8,
    service: u8,
    input: &[u8],
) -> Result<Vec<u8>, Skip> {
    let object_type = ObjectType::Security.code();
    let output =
        session.client.read_function_property_state(object_type, instance, pid, service, input)?;
    if output.is_empty() { Err(Skip::Absent) } else { Ok(output) }
}
